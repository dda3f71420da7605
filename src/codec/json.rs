//! The JSON interchange document.
//!
//! Two historical schema variants share one document type: version 6 nests
//! the bone tree under `RootBone` and carries no blend/outline tables,
//! version 8 stores the flat `SgeBones` table and the full side tables.
//! Decoding accepts either and always produces the canonical flat model.

use serde::{Deserialize, Serialize};

use crate::codec::SgeFormatVersion;
use crate::error::{Result, SgeError};
use crate::math::{SgeQuaternion, SgeVector3};
use crate::model::{
    flatten_nested, BoneAnimationGroup, KeyframeDefinition, NestedBone, OutlineData, SgeAnimation,
    SgeBone, SgeFace, SgeGXLightingData, SgeHeader, SgeMaterial, SgeModel, SgeSubmesh, SgeVertex,
    SubmeshBlendData, MAX_PALETTE_BONES,
};
use crate::validation::validate_model;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JsonModel {
    #[serde(default)]
    name: String,
    sge_header: SgeHeader,
    #[serde(default)]
    sge_materials: Vec<SgeMaterial>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sge_bones: Option<Vec<SgeBone>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    root_bone: Option<NestedBone>,
    #[serde(default)]
    sge_submeshes: Vec<Vec<JsonSubmesh>>,
    #[serde(default)]
    sge_animations: Vec<SgeAnimation>,
    #[serde(default)]
    translate_data_entries: Vec<SgeVector3>,
    #[serde(default)]
    rotation_data_entries: Vec<SgeQuaternion>,
    #[serde(default)]
    scale_data_entries: Vec<SgeVector3>,
    #[serde(default)]
    keyframe_definitions: Vec<KeyframeDefinition>,
    #[serde(default, rename = "SgeGXLightingDataTable")]
    gx_lighting_data_table: Vec<SgeGXLightingData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    submesh_blend_data_table: Option<Vec<SubmeshBlendData>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    outline_data_table: Option<Vec<OutlineData>>,
    #[serde(default)]
    bone_animation_groups: Vec<BoneAnimationGroup>,
}

/// Submeshes embed their material object in the document; in memory the
/// submesh only keeps the material's table index.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JsonSubmesh {
    submesh_vertices: Vec<SgeVertex>,
    submesh_faces: Vec<SgeFace>,
    bone_palette: Vec<i16>,
    #[serde(default)]
    material: Option<SgeMaterial>,
    #[serde(default, rename = "GXLightingAddress")]
    gx_lighting_address: Option<i32>,
    #[serde(default)]
    blend_address: Option<i32>,
    #[serde(default)]
    outline_address: Option<i32>,
    start_vertex: usize,
    end_vertex: usize,
    start_face: usize,
    face_count: usize,
}

fn submesh_from_json(json: JsonSubmesh, materials: &[SgeMaterial]) -> Result<SgeSubmesh> {
    if json.bone_palette.len() != MAX_PALETTE_BONES {
        return Err(SgeError::InvariantViolation(format!(
            "bone palette has {} entries, expected exactly {}",
            json.bone_palette.len(),
            MAX_PALETTE_BONES
        )));
    }
    let mut bone_palette = [-1i16; MAX_PALETTE_BONES];
    bone_palette.copy_from_slice(&json.bone_palette);

    let material = match json.material {
        None => None,
        Some(m) => {
            if m.index >= materials.len() {
                return Err(SgeError::UnresolvedReference {
                    what: "material".to_string(),
                    index: m.index as i64,
                    bound: materials.len(),
                });
            }
            Some(m.index)
        }
    };

    Ok(SgeSubmesh {
        vertices: json.submesh_vertices,
        faces: json.submesh_faces,
        bone_palette,
        material,
        gx_lighting_address: json.gx_lighting_address,
        blend_address: json.blend_address,
        outline_address: json.outline_address,
        start_vertex: json.start_vertex,
        end_vertex: json.end_vertex,
        start_face: json.start_face,
        face_count: json.face_count,
    })
}

fn submesh_to_json(submesh: &SgeSubmesh, model: &SgeModel) -> Result<JsonSubmesh> {
    Ok(JsonSubmesh {
        submesh_vertices: submesh.vertices.clone(),
        submesh_faces: submesh.faces.clone(),
        bone_palette: submesh.bone_palette.to_vec(),
        material: model.material_of(submesh)?.cloned(),
        gx_lighting_address: submesh.gx_lighting_address,
        blend_address: submesh.blend_address,
        outline_address: submesh.outline_address,
        start_vertex: submesh.start_vertex,
        end_vertex: submesh.end_vertex,
        start_face: submesh.start_face,
        face_count: submesh.face_count,
    })
}

/// Decode an interchange document, validating eagerly.
pub fn decode_json(text: &str) -> Result<SgeModel> {
    let document: JsonModel = serde_json::from_str(text)?;
    let version = SgeFormatVersion::from_header_version(document.sge_header.version)?;

    let mut bones = match version {
        SgeFormatVersion::Nested => {
            let root = document.root_bone.ok_or_else(|| {
                SgeError::MalformedDocument(
                    "version 6 document is missing its RootBone".to_string(),
                )
            })?;
            flatten_nested(&root)?
        }
        SgeFormatVersion::Flat => document.sge_bones.ok_or_else(|| {
            SgeError::MalformedDocument("version 8 document is missing SgeBones".to_string())
        })?,
    };
    crate::model::resolve_links(&mut bones)?;

    let mut submesh_groups = vec![];
    for group in document.sge_submeshes {
        let mut submeshes = vec![];
        for submesh in group {
            submeshes.push(submesh_from_json(submesh, &document.sge_materials)?);
        }
        submesh_groups.push(submeshes);
    }

    let model = SgeModel {
        name: document.name,
        header: document.sge_header,
        materials: document.sge_materials,
        bones,
        submesh_groups,
        animations: document.sge_animations,
        translate_data: document.translate_data_entries,
        rotate_data: document.rotation_data_entries,
        scale_data: document.scale_data_entries,
        keyframe_definitions: document.keyframe_definitions,
        gx_lighting_table: document.gx_lighting_data_table,
        blend_table: document.submesh_blend_data_table.unwrap_or_default(),
        outline_table: document.outline_data_table.unwrap_or_default(),
        bone_animation_groups: document.bone_animation_groups,
    };

    validate_model(&model)?;
    Ok(model)
}

/// Encode a model as an interchange document in the requested schema
/// version. Validates before writing anything.
pub fn encode_json(model: &SgeModel, version: SgeFormatVersion) -> Result<String> {
    validate_model(model)?;

    let (sge_bones, root_bone) = match version {
        SgeFormatVersion::Nested => (None, Some(model.nested_bones()?)),
        SgeFormatVersion::Flat => (Some(model.bones.clone()), None),
    };
    let (blend_table, outline_table) = match version {
        SgeFormatVersion::Nested => (None, None),
        SgeFormatVersion::Flat => (
            Some(model.blend_table.clone()),
            Some(model.outline_table.clone()),
        ),
    };

    let mut submesh_groups = vec![];
    for group in &model.submesh_groups {
        let mut submeshes = vec![];
        for submesh in group {
            submeshes.push(submesh_to_json(submesh, model)?);
        }
        submesh_groups.push(submeshes);
    }

    let document = JsonModel {
        name: model.name.clone(),
        sge_header: SgeHeader {
            version: version.header_version(),
            model_type: model.header.model_type,
        },
        sge_materials: model.materials.clone(),
        sge_bones,
        root_bone,
        sge_submeshes: submesh_groups,
        sge_animations: model.animations.clone(),
        translate_data_entries: model.translate_data.clone(),
        rotation_data_entries: model.rotate_data.clone(),
        scale_data_entries: model.scale_data.clone(),
        keyframe_definitions: model.keyframe_definitions.clone(),
        gx_lighting_data_table: model.gx_lighting_table.clone(),
        submesh_blend_data_table: blend_table,
        outline_data_table: outline_table,
        bone_animation_groups: model.bone_animation_groups.clone(),
    };

    Ok(serde_json::to_string_pretty(&document)?)
}
