use serde::{Deserialize, Serialize};

use crate::error::{Result, SgeError};
use crate::math::{SgeColor, SgeVector2, SgeVector3};
use crate::model::SgeModelType;

/// The skinning shader addresses bones through a 4-bit palette slot, so a
/// submesh can reference at most 16 distinct bones.
pub const MAX_PALETTE_BONES: usize = 16;

/// Maximum bone influences per vertex.
pub const MAX_VERTEX_WEIGHTS: usize = 4;

fn default_unknown2() -> i32 {
    // Trailing vertex word of unknown meaning; the exporter always writes this.
    65535
}

/// A skinned vertex. `bone_indices` are submesh-local palette slots, not
/// global addresses. Weights are not required to sum to 1; that is the
/// consumer's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SgeVertex {
    pub position: SgeVector3,
    pub normal: SgeVector3,
    #[serde(rename = "UVCoords")]
    pub uv_coords: SgeVector2,
    #[serde(default)]
    pub color: SgeColor,
    pub bone_indices: [u8; MAX_VERTEX_WEIGHTS],
    pub weight: [f32; MAX_VERTEX_WEIGHTS],
    #[serde(default = "default_unknown2")]
    pub unknown2: i32,
}

/// A triangle of submesh-local vertex indices, stored in SGE winding order
/// (reversed relative to a right-handed host convention).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SgeFace {
    pub polygon: [u32; 3],
}

impl SgeFace {
    pub fn new(polygon: [u32; 3]) -> Self {
        SgeFace { polygon }
    }

    /// Build a face from host winding, reversing to the stored order.
    pub fn from_host_winding(polygon: [u32; 3]) -> Self {
        SgeFace {
            polygon: [polygon[2], polygon[1], polygon[0]],
        }
    }

    /// The face in host winding order.
    pub fn host_winding(&self) -> [u32; 3] {
        [self.polygon[2], self.polygon[1], self.polygon[0]]
    }
}

/// One submesh: a contiguous slice of a submesh-group's vertices with faces
/// indexed locally from 0, a bone palette, and material/side-table
/// references. Start/end bookkeeping uses group-global indices so the group
/// can be re-flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct SgeSubmesh {
    pub vertices: Vec<SgeVertex>,
    pub faces: Vec<SgeFace>,
    /// 16 entries of (bone address - 1); unused slots hold -1.
    pub bone_palette: [i16; MAX_PALETTE_BONES],
    /// Index into the model's material table.
    pub material: Option<usize>,
    pub gx_lighting_address: Option<i32>,
    pub blend_address: Option<i32>,
    pub outline_address: Option<i32>,
    pub start_vertex: usize,
    pub end_vertex: usize,
    pub start_face: usize,
    pub face_count: usize,
}

impl SgeSubmesh {
    /// Bone addresses in the palette, in slot order.
    pub fn palette_addresses(&self) -> Vec<i32> {
        self.bone_palette
            .iter()
            .filter(|&&entry| entry >= 0)
            .map(|&entry| entry as i32 + 1)
            .collect()
    }

    /// Resolve a vertex's palette slot to a global bone address. Padding
    /// slots resolve to `None`.
    pub fn bone_address_for_slot(&self, slot: u8) -> Result<Option<i32>> {
        let entry = self
            .bone_palette
            .get(slot as usize)
            .ok_or_else(|| SgeError::UnresolvedReference {
                what: "bone palette slot".to_string(),
                index: slot as i64,
                bound: MAX_PALETTE_BONES,
            })?;
        if *entry < 0 {
            Ok(None)
        } else {
            Ok(Some(*entry as i32 + 1))
        }
    }
}

/// Un-split source vertex: bone references are global addresses paired with
/// weights, as they come out of a host scene graph.
#[derive(Debug, Clone)]
pub struct SourceVertex {
    pub position: SgeVector3,
    pub normal: SgeVector3,
    pub uv_coords: SgeVector2,
    pub color: SgeColor,
    pub bone_weights: Vec<(i32, f32)>,
}

/// Un-split source mesh fed to the splitter. Faces index into `vertices` and
/// are already in SGE winding order (see [`SgeFace::from_host_winding`]).
#[derive(Debug, Clone)]
pub struct SourceMesh {
    pub vertices: Vec<SourceVertex>,
    pub faces: Vec<[u32; 3]>,
    pub material: Option<usize>,
    pub gx_lighting_address: Option<i32>,
    pub blend_address: Option<i32>,
    pub outline_address: Option<i32>,
}

impl SourceMesh {
    /// Distinct bone addresses referenced by a face's vertices, in first
    /// appearance order.
    fn face_bones(&self, face: &[u32; 3]) -> Result<Vec<i32>> {
        let mut bones = vec![];
        for &v in face {
            let vertex =
                self.vertices
                    .get(v as usize)
                    .ok_or_else(|| SgeError::UnresolvedReference {
                        what: "face vertex".to_string(),
                        index: v as i64,
                        bound: self.vertices.len(),
                    })?;
            for &(address, _) in &vertex.bone_weights {
                if !bones.contains(&address) {
                    bones.push(address);
                }
            }
        }
        Ok(bones)
    }
}

/// StartFace advances in face-index units (3 per triangle) for every model
/// type except maps, which count whole faces.
pub fn face_index_stride(model_type: SgeModelType) -> usize {
    if model_type == SgeModelType::Map {
        1
    } else {
        3
    }
}

/// Partition a source mesh into submeshes that each satisfy the 16-bone
/// palette bound.
///
/// Greedy single pass over faces in original order: a running bone set is
/// grown face by face, and when a face would push the set past 16 distinct
/// bones the current submesh is closed and a new one starts with exactly
/// that face's bones. Downstream index tables depend on the resulting
/// vertex order, so the partition stays order-preserving and makes no
/// attempt to minimize the submesh count.
pub fn split_mesh(
    mesh: &SourceMesh,
    start_vertex: usize,
    start_face: usize,
    face_stride: usize,
) -> Result<Vec<SgeSubmesh>> {
    let mut submeshes = vec![];
    let mut bone_set: Vec<i32> = vec![];
    let mut faces: Vec<[u32; 3]> = vec![];
    let mut range_start = 0usize;
    let mut face_counter = start_face;

    for face in &mesh.faces {
        let face_bones = mesh.face_bones(face)?;
        if face_bones.len() > MAX_PALETTE_BONES {
            return Err(SgeError::InvariantViolation(format!(
                "a single face references {} distinct bones (limit {})",
                face_bones.len(),
                MAX_PALETTE_BONES
            )));
        }

        let new_bones: Vec<i32> = face_bones
            .iter()
            .filter(|a| !bone_set.contains(a))
            .copied()
            .collect();
        if bone_set.len() + new_bones.len() > MAX_PALETTE_BONES && !faces.is_empty() {
            // Close the current submesh before accepting this face.
            let submesh = close_submesh(
                mesh,
                &faces,
                range_start,
                None,
                start_vertex,
                face_counter,
            )?;
            range_start = submesh.end_vertex - start_vertex + 1;
            face_counter += submesh.face_count * face_stride;
            submeshes.push(submesh);
            faces = vec![];
            bone_set = face_bones;
        } else {
            bone_set.extend(new_bones);
        }
        faces.push(*face);
    }

    // Final submesh absorbs all remaining vertices, referenced or not.
    let last_end = mesh.vertices.len().saturating_sub(1);
    let submesh = close_submesh(
        mesh,
        &faces,
        range_start,
        Some(last_end),
        start_vertex,
        face_counter,
    )?;
    submeshes.push(submesh);

    Ok(submeshes)
}

/// Emit one submesh covering source vertices `range_start..=range_end`,
/// re-indexing faces to be submesh-local starting at 0.
fn close_submesh(
    mesh: &SourceMesh,
    faces: &[[u32; 3]],
    range_start: usize,
    forced_range_end: Option<usize>,
    group_start_vertex: usize,
    start_face: usize,
) -> Result<SgeSubmesh> {
    let referenced_max = faces
        .iter()
        .flat_map(|f| f.iter().copied())
        .max()
        .map(|m| m as usize);
    let range_end = match forced_range_end {
        Some(end) => end.max(referenced_max.unwrap_or(end)),
        None => referenced_max.unwrap_or(range_start),
    };

    if !mesh.vertices.is_empty() && range_end >= mesh.vertices.len() {
        return Err(SgeError::UnresolvedReference {
            what: "face vertex".to_string(),
            index: range_end as i64,
            bound: mesh.vertices.len(),
        });
    }

    // Palette in order of first appearance over the vertex range. Vertices
    // in the range that no face references still occupy palette slots.
    let mut palette: Vec<i32> = vec![];
    if !mesh.vertices.is_empty() {
        for vertex in &mesh.vertices[range_start..=range_end] {
            for &(address, _) in &vertex.bone_weights {
                if !palette.contains(&address) {
                    palette.push(address);
                }
            }
        }
    }
    if palette.len() > MAX_PALETTE_BONES {
        return Err(SgeError::InvariantViolation(format!(
            "submesh vertex range references {} distinct bones (limit {})",
            palette.len(),
            MAX_PALETTE_BONES
        )));
    }

    let mut bone_palette = [-1i16; MAX_PALETTE_BONES];
    for (slot, address) in palette.iter().enumerate() {
        bone_palette[slot] = (*address - 1) as i16;
    }

    let mut vertices = vec![];
    if !mesh.vertices.is_empty() {
        for source in &mesh.vertices[range_start..=range_end] {
            if source.bone_weights.len() > MAX_VERTEX_WEIGHTS {
                return Err(SgeError::InvariantViolation(format!(
                    "vertex carries {} bone weights (limit {})",
                    source.bone_weights.len(),
                    MAX_VERTEX_WEIGHTS
                )));
            }
            let mut bone_indices = [0u8; MAX_VERTEX_WEIGHTS];
            let mut weight = [0f32; MAX_VERTEX_WEIGHTS];
            for (i, &(address, w)) in source.bone_weights.iter().enumerate() {
                // The palette was built from this same range, so the lookup
                // cannot fail.
                let slot = palette.iter().position(|&a| a == address).unwrap();
                bone_indices[i] = slot as u8;
                weight[i] = w;
            }
            vertices.push(SgeVertex {
                position: source.position,
                normal: source.normal,
                uv_coords: source.uv_coords,
                color: source.color,
                bone_indices,
                weight,
                unknown2: default_unknown2(),
            });
        }
    }

    let mut local_faces = vec![];
    for face in faces {
        let mut polygon = [0u32; 3];
        for (i, &v) in face.iter().enumerate() {
            let v = v as usize;
            if v < range_start || v > range_end {
                return Err(SgeError::InvariantViolation(format!(
                    "face vertex {} falls outside its submesh range {}..={}",
                    v, range_start, range_end
                )));
            }
            polygon[i] = (v - range_start) as u32;
        }
        local_faces.push(SgeFace::new(polygon));
    }

    let face_count = local_faces.len();
    Ok(SgeSubmesh {
        vertices,
        faces: local_faces,
        bone_palette,
        material: mesh.material,
        gx_lighting_address: mesh.gx_lighting_address,
        blend_address: mesh.blend_address,
        outline_address: mesh.outline_address,
        start_vertex: group_start_vertex + range_start,
        end_vertex: group_start_vertex + range_end,
        start_face,
        face_count,
    })
}

/// Split a sequence of source meshes into one submesh-group, stitching the
/// group-global start-vertex/start-face counters across emitted submeshes.
pub fn build_submesh_group(
    meshes: &[SourceMesh],
    model_type: SgeModelType,
) -> Result<Vec<SgeSubmesh>> {
    let stride = face_index_stride(model_type);
    let mut group = vec![];
    let mut vertex_counter = 0usize;
    let mut face_counter = 0usize;
    for mesh in meshes {
        let submeshes = split_mesh(mesh, vertex_counter, face_counter, stride)?;
        for submesh in submeshes {
            vertex_counter = submesh.end_vertex + 1;
            face_counter = submesh.start_face + submesh.face_count * stride;
            group.push(submesh);
        }
    }
    Ok(group)
}
