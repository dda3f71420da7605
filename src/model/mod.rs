pub mod animation;
pub mod bone;
pub mod material;
pub mod mesh;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SgeError};
use crate::math::{SgeQuaternion, SgeVector3};

pub use animation::{
    assemble_tracks, BoneKeyframe, BonePose, BoneTrack, KeyframeDefinition, SgeAnimation,
    SgeAnimationBoneTable,
};
pub use bone::{
    body_part_for_groups, children_of, flatten_nested, resolve_links, to_nested,
    BoneAnimationGroup, NestedBone, SgeBone,
};
pub use material::{
    resolve_by_offset, OutlineData, SgeGXLightingData, SgeMaterial, SubmeshBlendData,
};
pub use mesh::{
    build_submesh_group, face_index_stride, split_mesh, SgeFace, SgeSubmesh, SgeVertex,
    SourceMesh, SourceVertex, MAX_PALETTE_BONES, MAX_VERTEX_WEIGHTS,
};

/// Scale factor between stored binary positions and model space.
pub const MODEL_SCALE: f32 = 25.4;

/// Model type tag from the header. Encoded as its raw integer everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum SgeModelType {
    Object,
    Character,
    Map,
    Unknown,
}

impl TryFrom<i32> for SgeModelType {
    type Error = String;

    fn try_from(value: i32) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(SgeModelType::Object),
            3 => Ok(SgeModelType::Character),
            4 => Ok(SgeModelType::Map),
            5 => Ok(SgeModelType::Unknown),
            other => Err(format!("unrecognized model type {other}")),
        }
    }
}

impl From<SgeModelType> for i32 {
    fn from(value: SgeModelType) -> i32 {
        match value {
            SgeModelType::Object => 0,
            SgeModelType::Character => 3,
            SgeModelType::Map => 4,
            SgeModelType::Unknown => 5,
        }
    }
}

impl Default for SgeModelType {
    fn default() -> Self {
        SgeModelType::Object
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SgeHeader {
    pub version: i16,
    pub model_type: SgeModelType,
}

impl Default for SgeHeader {
    fn default() -> Self {
        SgeHeader {
            version: crate::codec::SGE_VERSION_FLAT,
            model_type: SgeModelType::Object,
        }
    }
}

/// The canonical in-memory model. Bones are always held flat here; the
/// nested encoding only exists at the JSON boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SgeModel {
    pub name: String,
    pub header: SgeHeader,
    pub materials: Vec<SgeMaterial>,
    pub bones: Vec<SgeBone>,
    pub submesh_groups: Vec<Vec<SgeSubmesh>>,
    pub animations: Vec<SgeAnimation>,
    pub translate_data: Vec<SgeVector3>,
    pub rotate_data: Vec<SgeQuaternion>,
    pub scale_data: Vec<SgeVector3>,
    pub keyframe_definitions: Vec<KeyframeDefinition>,
    pub gx_lighting_table: Vec<SgeGXLightingData>,
    pub blend_table: Vec<SubmeshBlendData>,
    pub outline_table: Vec<OutlineData>,
    pub bone_animation_groups: Vec<BoneAnimationGroup>,
}

impl SgeModel {
    /// Rebuild first-child/next-sibling links from parent addresses.
    pub fn resolve_bone_links(&mut self) -> Result<()> {
        resolve_links(&mut self.bones)
    }

    /// The bone tree in the nested encoding. Requires exactly one root.
    pub fn nested_bones(&self) -> Result<NestedBone> {
        to_nested(&self.bones)
    }

    /// Look up a submesh's material, checking the index bound.
    pub fn material_of(&self, submesh: &SgeSubmesh) -> Result<Option<&SgeMaterial>> {
        match submesh.material {
            None => Ok(None),
            Some(index) => self.materials.get(index).map(Some).ok_or_else(|| {
                SgeError::UnresolvedReference {
                    what: "material".to_string(),
                    index: index as i64,
                    bound: self.materials.len(),
                }
            }),
        }
    }

    pub fn lighting_of(&self, submesh: &SgeSubmesh) -> Option<&SgeGXLightingData> {
        resolve_by_offset(&self.gx_lighting_table, submesh.gx_lighting_address)
    }

    pub fn blend_of(&self, submesh: &SgeSubmesh) -> Option<&SubmeshBlendData> {
        resolve_by_offset(&self.blend_table, submesh.blend_address)
    }

    pub fn outline_of(&self, submesh: &SgeSubmesh) -> Option<&OutlineData> {
        resolve_by_offset(&self.outline_table, submesh.outline_address)
    }

    /// Rebuild every bone's `VertexGroup` map from submesh palettes and
    /// vertex weights. Keys are `"group,submesh,vertex"` triples.
    pub fn rebuild_vertex_groups(&mut self) -> Result<()> {
        for bone in &mut self.bones {
            bone.vertex_group.clear();
        }

        let mut attachments: Vec<(i32, String, f32)> = vec![];
        for (g, group) in self.submesh_groups.iter().enumerate() {
            for (s, submesh) in group.iter().enumerate() {
                for (v, vertex) in submesh.vertices.iter().enumerate() {
                    for slot in 0..MAX_VERTEX_WEIGHTS {
                        let weight = vertex.weight[slot];
                        if weight <= 0.0 {
                            continue;
                        }
                        if let Some(address) =
                            submesh.bone_address_for_slot(vertex.bone_indices[slot])?
                        {
                            attachments.push((address, format!("{g},{s},{v}"), weight));
                        }
                    }
                }
            }
        }

        for (address, key, weight) in attachments {
            let bone = self
                .bones
                .iter_mut()
                .find(|b| b.address == address)
                .ok_or_else(|| SgeError::UnresolvedReference {
                    what: "bone address".to_string(),
                    index: address as i64,
                    bound: 0,
                })?;
            bone.vertex_group.insert(key, weight);
        }
        Ok(())
    }
}
