//! Reader and writer for the legacy binary container.
//!
//! The container is pointer-chased: a word at file offset 0x1C locates the
//! data start, and every table address inside is relative to that start.
//! Decoding normalizes record addresses (bones, material names) into table
//! indices; encoding lays the tables back out sequentially and fixes the
//! addresses up.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use binrw::{binrw, BinReaderExt, BinWriterExt};

use crate::codec::SgeFormatVersion;
use crate::error::{Result, SgeError};
use crate::math::{SgeColor, SgeVector2, SgeVector3};
use crate::model::{
    SgeBone, SgeFace, SgeHeader, SgeMaterial, SgeModel, SgeModelType, SgeSubmesh, SgeVertex,
    MAX_PALETTE_BONES, MAX_VERTEX_WEIGHTS, MODEL_SCALE,
};
use crate::validation::validate_model;

const CONTAINER_POINTER_OFFSET: u64 = 0x1C;
const DATA_START: u32 = 0x20;

const HEADER_SIZE: u32 = 0x80;
const GROUP_ENTRY_SIZE: u32 = 0x44;
const TEXTURE_NAME_SIZE: u32 = 0x18;
const BONE_RECORD_SIZE: u32 = 0x28;
const SUBMESH_RECORD_SIZE: u32 = 0x64;
const VERTEX_BLOCK_SIZE: u32 = 0x10;
const VERTEX_SIZE: u32 = 0x38;

#[binrw]
#[brw(little)]
struct BinHeader {
    version: i16,
    model_type: i16,
    unknown04: i32,
    unknown08: i32,
    submesh_group_count: i32,
    bone_count: i32,
    texture_count: i32,
    unknown18: [i32; 6],
    submesh_group_table_address: i32,
    unknown34: [i32; 4],
    bone_table_address: i32,
    texture_table_address: i32,
    unknown4c: [i32; 13],
}

impl Default for BinHeader {
    fn default() -> Self {
        BinHeader {
            version: 0,
            model_type: 0,
            unknown04: 0,
            unknown08: 0,
            submesh_group_count: 0,
            bone_count: 0,
            texture_count: 0,
            unknown18: [0; 6],
            submesh_group_table_address: 0,
            unknown34: [0; 4],
            bone_table_address: 0,
            texture_table_address: 0,
            unknown4c: [0; 13],
        }
    }
}

#[binrw]
#[brw(little)]
struct BinGroupEntry {
    unknown00: [i32; 2],
    submesh_list_address: i32,
    submesh_count: i32,
    unknown10: i32,
    vertex_block_address: i32,
    unknown18: [i32; 11],
}

impl Default for BinGroupEntry {
    fn default() -> Self {
        BinGroupEntry {
            unknown00: [0; 2],
            submesh_list_address: 0,
            submesh_count: 0,
            unknown10: 0,
            vertex_block_address: 0,
            unknown18: [0; 11],
        }
    }
}

impl BinGroupEntry {
    /// Group tables routinely carry junk entries; only well-formed ones
    /// describe geometry.
    fn is_valid(&self) -> bool {
        self.submesh_list_address > 0
            && self.submesh_list_address % 4 == 0
            && self.submesh_count > 0
            && self.vertex_block_address > 0
    }
}

/// Per-group block locating the flattened vertex and face-index arrays.
#[binrw]
#[brw(little)]
#[derive(Default)]
struct BinVertexBlock {
    vertex_count: i32,
    vertex_data_address: i32,
    face_index_count: i32,
    face_data_address: i32,
}

#[binrw]
#[brw(little)]
struct BinBone {
    tail_offset: SgeVector3,
    head_position: SgeVector3,
    parent_address: i32,
    child_address: i32,
    next_sibling_address: i32,
    body_part: i32,
}

#[binrw]
#[brw(little)]
struct BinSubmesh {
    unknown00: [i32; 2],
    material_name_address: i32,
    unknown0c: [i32; 2],
    bone_address: i32,
    unknown18: [i32; 2],
    start_vertex: i32,
    start_face: i32,
    end_vertex: i32,
    unknown2c: i32,
    face_count: i32,
    bone_palette: [i16; MAX_PALETTE_BONES],
    gx_lighting_offset: i32,
    blend_offset: i32,
    outline_offset: i32,
    unknown60: i32,
}

impl Default for BinSubmesh {
    fn default() -> Self {
        BinSubmesh {
            unknown00: [0; 2],
            material_name_address: 0,
            unknown0c: [0; 2],
            bone_address: 0,
            unknown18: [0; 2],
            start_vertex: 0,
            start_face: 0,
            end_vertex: 0,
            unknown2c: 0,
            face_count: 0,
            bone_palette: [-1; MAX_PALETTE_BONES],
            gx_lighting_offset: 0,
            blend_offset: 0,
            outline_offset: 0,
            unknown60: 0,
        }
    }
}

#[binrw]
#[brw(little)]
struct BinVertex {
    position: SgeVector3,
    weight_xyz: [f32; 3],
    bone_ids: [u8; 4],
    normal: SgeVector3,
    color: [u8; 4],
    uv: SgeVector2,
    unknown2: i32,
}

fn scaled(v: SgeVector3, factor: f32) -> SgeVector3 {
    SgeVector3::new(v.0.x * factor, v.0.y * factor, v.0.z * factor)
}

fn seek_to(cursor: &mut Cursor<&[u8]>, pos: u64) -> Result<()> {
    if pos >= cursor.get_ref().len() as u64 {
        return Err(SgeError::MalformedDocument(format!(
            "address {:#x} lies outside the {} byte container",
            pos,
            cursor.get_ref().len()
        )));
    }
    cursor.seek(SeekFrom::Start(pos))?;
    Ok(())
}

/// Normalize a raw record address into a 1-based table index. 0 stays 0.
fn record_index(raw: i32, table_address: i32, record_size: u32) -> Result<i32> {
    if raw == 0 {
        return Ok(0);
    }
    let delta = raw - table_address;
    if delta < 0 || delta % record_size as i32 != 0 {
        return Err(SgeError::MalformedDocument(format!(
            "record address {:#x} does not fall on a table entry",
            raw
        )));
    }
    Ok(delta / record_size as i32 + 1)
}

/// Decode the legacy binary container.
pub fn decode_binary(data: &[u8]) -> Result<SgeModel> {
    let mut cursor = Cursor::new(data);

    seek_to(&mut cursor, CONTAINER_POINTER_OFFSET)?;
    let start: u32 = cursor.read_le()?;
    let base = start as u64;

    seek_to(&mut cursor, base)?;
    let header: BinHeader = cursor.read_le()?;
    SgeFormatVersion::from_header_version(header.version)?;
    let model_type = SgeModelType::try_from(header.model_type as i32)
        .map_err(SgeError::MalformedDocument)?;

    // Texture table: fixed-width NUL-terminated names, one material each.
    let mut materials = vec![];
    for i in 0..header.texture_count.max(0) as usize {
        let pos = base + header.texture_table_address as u64 + i as u64 * TEXTURE_NAME_SIZE as u64;
        seek_to(&mut cursor, pos)?;
        let mut raw = [0u8; TEXTURE_NAME_SIZE as usize];
        cursor.read_exact(&mut raw)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let name = String::from_utf8_lossy(&raw[..end]).into_owned();
        materials.push(SgeMaterial::new(i, name));
    }

    let mut bones = vec![];
    for i in 0..header.bone_count.max(0) as usize {
        let pos = base + header.bone_table_address as u64 + i as u64 * BONE_RECORD_SIZE as u64;
        seek_to(&mut cursor, pos)?;
        let record: BinBone = cursor.read_le()?;
        let mut bone = SgeBone::new(i as i32 + 1, scaled(record.head_position, MODEL_SCALE));
        bone.tail_offset = scaled(record.tail_offset, MODEL_SCALE);
        bone.parent_address =
            record_index(record.parent_address, header.bone_table_address, BONE_RECORD_SIZE)?;
        bone.child_address =
            record_index(record.child_address, header.bone_table_address, BONE_RECORD_SIZE)?;
        bone.next_sibling_address = record_index(
            record.next_sibling_address,
            header.bone_table_address,
            BONE_RECORD_SIZE,
        )?;
        bone.body_part = match record.body_part {
            0 => None,
            tag => Some(tag as i16),
        };
        bones.push(bone);
    }

    let mut submesh_groups = vec![];
    for g in 0..header.submesh_group_count.max(0) as usize {
        let pos = base
            + header.submesh_group_table_address as u64
            + g as u64 * GROUP_ENTRY_SIZE as u64;
        seek_to(&mut cursor, pos)?;
        let entry: BinGroupEntry = cursor.read_le()?;
        if !entry.is_valid() {
            continue;
        }

        seek_to(&mut cursor, base + entry.vertex_block_address as u64)?;
        let block: BinVertexBlock = cursor.read_le()?;

        let mut records = vec![];
        for s in 0..entry.submesh_count as usize {
            let pos = base
                + entry.submesh_list_address as u64
                + s as u64 * SUBMESH_RECORD_SIZE as u64;
            seek_to(&mut cursor, pos)?;
            records.push(cursor.read_le::<BinSubmesh>()?);
        }

        let mut group_vertices = vec![];
        for v in 0..block.vertex_count.max(0) as usize {
            let pos = base + block.vertex_data_address as u64 + v as u64 * VERTEX_SIZE as u64;
            seek_to(&mut cursor, pos)?;
            let raw: BinVertex = cursor.read_le()?;
            let mut weight = [0f32; MAX_VERTEX_WEIGHTS];
            weight[..3].copy_from_slice(&raw.weight_xyz);
            weight[3] = 1.0 - raw.weight_xyz.iter().sum::<f32>();
            group_vertices.push(SgeVertex {
                position: scaled(raw.position, MODEL_SCALE),
                normal: raw.normal,
                uv_coords: raw.uv,
                color: SgeColor::from_rgba_bytes(raw.color),
                bone_indices: raw.bone_ids,
                weight,
                unknown2: raw.unknown2,
            });
        }

        let face_count_total = block.face_index_count.max(0) as usize / 3;
        let mut group_faces = vec![];
        if face_count_total > 0 {
            seek_to(&mut cursor, base + block.face_data_address as u64)?;
        }
        for _ in 0..face_count_total {
            let a: i32 = cursor.read_le()?;
            let b: i32 = cursor.read_le()?;
            let c: i32 = cursor.read_le()?;
            group_faces.push([a, b, c]);
        }

        // Faces are a flat per-group list carved up sequentially by each
        // submesh's face count.
        let mut face_cursor = 0usize;
        let mut submeshes = vec![];
        for record in records {
            let start_vertex = record.start_vertex.max(0) as usize;
            let end_vertex = record.end_vertex.max(0) as usize;
            if end_vertex >= group_vertices.len() || end_vertex < start_vertex {
                return Err(SgeError::MalformedDocument(format!(
                    "submesh vertex range {}..={} exceeds the group's {} vertices",
                    start_vertex,
                    end_vertex,
                    group_vertices.len()
                )));
            }

            let face_count = record.face_count.max(0) as usize;
            if face_cursor + face_count > group_faces.len() {
                return Err(SgeError::MalformedDocument(format!(
                    "submesh face range {}..{} exceeds the group's {} faces",
                    face_cursor,
                    face_cursor + face_count,
                    group_faces.len()
                )));
            }
            let mut faces = vec![];
            for raw in &group_faces[face_cursor..face_cursor + face_count] {
                let mut polygon = [0u32; 3];
                for (i, &v) in raw.iter().enumerate() {
                    let local = v as i64 - start_vertex as i64;
                    if local < 0 || v as usize > end_vertex {
                        return Err(SgeError::UnresolvedReference {
                            what: "face vertex".to_string(),
                            index: v as i64,
                            bound: end_vertex + 1,
                        });
                    }
                    polygon[i] = local as u32;
                }
                faces.push(SgeFace::new(polygon));
            }
            face_cursor += face_count;

            let material = match record.material_name_address {
                0 => None,
                addr => {
                    let index = record_index(addr, header.texture_table_address, TEXTURE_NAME_SIZE)?
                        as usize
                        - 1;
                    if index >= materials.len() {
                        return Err(SgeError::UnresolvedReference {
                            what: "material".to_string(),
                            index: index as i64,
                            bound: materials.len(),
                        });
                    }
                    Some(index)
                }
            };

            submeshes.push(SgeSubmesh {
                vertices: group_vertices[start_vertex..=end_vertex].to_vec(),
                faces,
                bone_palette: record.bone_palette,
                material,
                gx_lighting_address: nonzero(record.gx_lighting_offset),
                blend_address: nonzero(record.blend_offset),
                outline_address: nonzero(record.outline_offset),
                start_vertex,
                end_vertex,
                start_face: record.start_face.max(0) as usize,
                face_count,
            });
        }
        submesh_groups.push(submeshes);
    }

    let model = SgeModel {
        name: String::new(),
        header: SgeHeader {
            version: header.version,
            model_type,
        },
        materials,
        bones,
        submesh_groups,
        ..SgeModel::default()
    };

    validate_model(&model)?;
    Ok(model)
}

fn nonzero(value: i32) -> Option<i32> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}

/// Encode a model as the legacy binary container.
///
/// Table layout order: header, submesh-group table, texture table, bone
/// table, then per group the submesh records, vertex block, vertex data and
/// face data.
pub fn encode_binary(model: &SgeModel) -> Result<Vec<u8>> {
    validate_model(model)?;
    SgeFormatVersion::from_header_version(model.header.version)?;

    let group_count = model.submesh_groups.len() as u32;
    let group_table_address = HEADER_SIZE;
    let texture_table_address = group_table_address + group_count * GROUP_ENTRY_SIZE;
    let bone_table_address =
        texture_table_address + model.materials.len() as u32 * TEXTURE_NAME_SIZE;
    let mut next_address = bone_table_address + model.bones.len() as u32 * BONE_RECORD_SIZE;

    // Per-group layout, addresses first so records can point forward.
    struct GroupLayout {
        submesh_list_address: u32,
        vertex_block_address: u32,
        vertex_data_address: u32,
        face_data_address: u32,
        vertex_count: u32,
        face_index_count: u32,
    }
    let mut layouts = vec![];
    for group in &model.submesh_groups {
        let vertex_count: usize = group.iter().map(|s| s.vertices.len()).sum();
        let face_index_count: usize = group.iter().map(|s| s.faces.len() * 3).sum();
        let submesh_list_address = next_address;
        let vertex_block_address =
            submesh_list_address + group.len() as u32 * SUBMESH_RECORD_SIZE;
        let vertex_data_address = vertex_block_address + VERTEX_BLOCK_SIZE;
        let face_data_address = vertex_data_address + vertex_count as u32 * VERTEX_SIZE;
        next_address = face_data_address + face_index_count as u32 * 4;
        layouts.push(GroupLayout {
            submesh_list_address,
            vertex_block_address,
            vertex_data_address,
            face_data_address,
            vertex_count: vertex_count as u32,
            face_index_count: face_index_count as u32,
        });
    }

    let mut out = Cursor::new(Vec::new());
    // Container prefix: the word at 0x1C points at the data start.
    out.write_all(&[0u8; CONTAINER_POINTER_OFFSET as usize])?;
    out.write_le(&DATA_START)?;

    let header = BinHeader {
        version: model.header.version,
        model_type: i32::from(model.header.model_type) as i16,
        submesh_group_count: group_count as i32,
        bone_count: model.bones.len() as i32,
        texture_count: model.materials.len() as i32,
        submesh_group_table_address: group_table_address as i32,
        bone_table_address: bone_table_address as i32,
        texture_table_address: texture_table_address as i32,
        ..BinHeader::default()
    };
    out.write_le(&header)?;

    for (group, layout) in model.submesh_groups.iter().zip(&layouts) {
        out.write_le(&BinGroupEntry {
            submesh_list_address: layout.submesh_list_address as i32,
            submesh_count: group.len() as i32,
            vertex_block_address: layout.vertex_block_address as i32,
            ..BinGroupEntry::default()
        })?;
    }

    for material in &model.materials {
        let name = material.name.as_bytes();
        if name.len() >= TEXTURE_NAME_SIZE as usize {
            return Err(SgeError::InvariantViolation(format!(
                "material name \"{}\" exceeds {} bytes",
                material.name,
                TEXTURE_NAME_SIZE - 1
            )));
        }
        let mut raw = [0u8; TEXTURE_NAME_SIZE as usize];
        raw[..name.len()].copy_from_slice(name);
        out.write_all(&raw)?;
    }

    let bone_record_address = |address: i32| -> Result<i32> {
        if address == 0 {
            return Ok(0);
        }
        let index = model
            .bones
            .iter()
            .position(|b| b.address == address)
            .ok_or_else(|| SgeError::UnresolvedReference {
                what: "bone address".to_string(),
                index: address as i64,
                bound: model.bones.len(),
            })?;
        Ok((bone_table_address + index as u32 * BONE_RECORD_SIZE) as i32)
    };
    for bone in &model.bones {
        out.write_le(&BinBone {
            tail_offset: scaled(bone.tail_offset, 1.0 / MODEL_SCALE),
            head_position: scaled(bone.head_position, 1.0 / MODEL_SCALE),
            parent_address: bone_record_address(bone.parent_address)?,
            child_address: bone_record_address(bone.child_address)?,
            next_sibling_address: bone_record_address(bone.next_sibling_address)?,
            body_part: bone.body_part.map(|t| t as i32).unwrap_or(0),
        })?;
    }

    for (group, layout) in model.submesh_groups.iter().zip(&layouts) {
        for submesh in group {
            let material_name_address = match submesh.material {
                None => 0,
                Some(index) => (texture_table_address + index as u32 * TEXTURE_NAME_SIZE) as i32,
            };
            out.write_le(&BinSubmesh {
                material_name_address,
                start_vertex: submesh.start_vertex as i32,
                start_face: submesh.start_face as i32,
                end_vertex: submesh.end_vertex as i32,
                face_count: submesh.face_count as i32,
                bone_palette: submesh.bone_palette,
                gx_lighting_offset: submesh.gx_lighting_address.unwrap_or(0),
                blend_offset: submesh.blend_address.unwrap_or(0),
                outline_offset: submesh.outline_address.unwrap_or(0),
                ..BinSubmesh::default()
            })?;
        }

        out.write_le(&BinVertexBlock {
            vertex_count: layout.vertex_count as i32,
            vertex_data_address: layout.vertex_data_address as i32,
            face_index_count: layout.face_index_count as i32,
            face_data_address: layout.face_data_address as i32,
        })?;

        for submesh in group {
            for vertex in &submesh.vertices {
                out.write_le(&BinVertex {
                    position: scaled(vertex.position, 1.0 / MODEL_SCALE),
                    weight_xyz: [vertex.weight[0], vertex.weight[1], vertex.weight[2]],
                    bone_ids: vertex.bone_indices,
                    normal: vertex.normal,
                    color: vertex.color.to_rgba_bytes(),
                    uv: vertex.uv_coords,
                    unknown2: vertex.unknown2,
                })?;
            }
        }

        for submesh in group {
            for face in &submesh.faces {
                for &v in &face.polygon {
                    out.write_le(&(v as i32 + submesh.start_vertex as i32))?;
                }
            }
        }
    }

    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::resolve_links;

    fn fixture_model() -> SgeModel {
        let mut bones = vec![
            SgeBone::new(1, SgeVector3::zero()),
            SgeBone::new(2, SgeVector3::new(0.0, 25.4, 0.0)),
        ];
        bones[1].parent_address = 1;
        bones[1].body_part = Some(crate::model::bone::BODY_PART_NECK);
        resolve_links(&mut bones).unwrap();

        let mut palette = [-1i16; MAX_PALETTE_BONES];
        palette[0] = 0;
        palette[1] = 1;
        let vertex = |x: f32, slot: u8| SgeVertex {
            position: SgeVector3::new(x, 0.0, 0.0),
            normal: SgeVector3::new(0.0, 1.0, 0.0),
            uv_coords: SgeVector2::new(0.25, 0.75),
            color: SgeColor::white(),
            bone_indices: [slot, 0, 0, 0],
            weight: [1.0, 0.0, 0.0, 0.0],
            unknown2: 65535,
        };
        let submesh = SgeSubmesh {
            vertices: vec![vertex(0.0, 0), vertex(25.4, 1), vertex(50.8, 0)],
            faces: vec![SgeFace::new([2, 1, 0])],
            bone_palette: palette,
            material: Some(0),
            gx_lighting_address: Some(1),
            blend_address: None,
            outline_address: None,
            start_vertex: 0,
            end_vertex: 2,
            start_face: 0,
            face_count: 1,
        };

        SgeModel {
            name: String::new(),
            header: SgeHeader {
                version: 8,
                model_type: SgeModelType::Character,
            },
            materials: vec![SgeMaterial::new(0, "c_haruhi_tex")],
            bones,
            submesh_groups: vec![vec![submesh]],
            ..SgeModel::default()
        }
    }

    fn assert_vec3_close(a: SgeVector3, b: SgeVector3) {
        for (x, y) in a.to_slice().iter().zip(b.to_slice().iter()) {
            assert!((x - y).abs() < 1e-4, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn test_binary_round_trip() {
        let model = fixture_model();
        let data = encode_binary(&model).unwrap();
        let decoded = decode_binary(&data).unwrap();

        assert_eq!(decoded.header, model.header);
        assert_eq!(decoded.materials, model.materials);

        assert_eq!(decoded.bones.len(), 2);
        assert_eq!(decoded.bones[1].parent_address, 1);
        assert_eq!(decoded.bones[0].child_address, 2);
        assert_eq!(decoded.bones[1].body_part, model.bones[1].body_part);
        assert_vec3_close(decoded.bones[1].head_position, model.bones[1].head_position);

        assert_eq!(decoded.submesh_groups.len(), 1);
        let (got, want) = (&decoded.submesh_groups[0][0], &model.submesh_groups[0][0]);
        assert_eq!(got.faces, want.faces);
        assert_eq!(got.bone_palette, want.bone_palette);
        assert_eq!(got.material, want.material);
        assert_eq!(got.gx_lighting_address, want.gx_lighting_address);
        assert_eq!(got.start_vertex, want.start_vertex);
        assert_eq!(got.end_vertex, want.end_vertex);
        assert_eq!(got.face_count, want.face_count);
        for (g, w) in got.vertices.iter().zip(want.vertices.iter()) {
            assert_vec3_close(g.position, w.position);
            assert_eq!(g.normal, w.normal);
            assert_eq!(g.uv_coords, w.uv_coords);
            assert_eq!(g.bone_indices, w.bone_indices);
            assert_eq!(g.weight, w.weight);
            assert_eq!(g.unknown2, w.unknown2);
        }
    }

    #[test]
    fn test_unrecognized_binary_version_rejected() {
        let model = fixture_model();
        let mut data = encode_binary(&model).unwrap();
        // Version word sits at the data start.
        data[DATA_START as usize] = 99;
        data[DATA_START as usize + 1] = 0;
        let err = decode_binary(&data).unwrap_err();
        assert!(matches!(err, SgeError::UnsupportedFormatVersion(99)));
    }

    #[test]
    fn test_truncated_container_is_malformed() {
        let err = decode_binary(&[0u8; 8]).unwrap_err();
        assert!(matches!(err, SgeError::MalformedDocument(_)));
    }

    #[test]
    fn test_overlong_material_name_rejected() {
        let mut model = fixture_model();
        model.materials[0].name = "x".repeat(32);
        let err = encode_binary(&model).unwrap_err();
        assert!(matches!(err, SgeError::InvariantViolation(_)));
    }

    #[test]
    fn test_invalid_group_entries_are_skipped() {
        let model = fixture_model();
        let mut data = encode_binary(&model).unwrap();
        // Zero the group's submesh count; the entry fails the validity
        // filter and the group disappears instead of erroring.
        let entry = DATA_START as usize + HEADER_SIZE as usize;
        for b in &mut data[entry + 0x0C..entry + 0x10] {
            *b = 0;
        }
        let decoded = decode_binary(&data).unwrap();
        assert!(decoded.submesh_groups.is_empty());
    }
}
