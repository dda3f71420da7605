use sge_tools_lib::math::{SgeColor, SgeQuaternion, SgeVector2, SgeVector3};
use sge_tools_lib::model::{
    resolve_links, BoneKeyframe, KeyframeDefinition, SgeAnimation, SgeAnimationBoneTable, SgeBone,
    SgeFace, SgeGXLightingData, SgeHeader, SgeMaterial, SgeModel, SgeModelType, SgeSubmesh,
    SgeVertex, MAX_PALETTE_BONES,
};

pub fn vertex(position: SgeVector3, slot: u8, weight: f32) -> SgeVertex {
    let mut weights = [0f32; 4];
    weights[0] = weight;
    weights[1] = 1.0 - weight;
    SgeVertex {
        position,
        normal: SgeVector3::new(0.0, 1.0, 0.0),
        uv_coords: SgeVector2::new(0.5, 0.5),
        color: SgeColor::white(),
        bone_indices: [slot, 0, 0, 0],
        weight: weights,
        unknown2: 65535,
    }
}

/// A small but complete character model: three bones, one skinned
/// submesh, one animation over shared pools.
pub fn character_model() -> SgeModel {
    let mut bones = vec![
        SgeBone::new(1, SgeVector3::zero()),
        SgeBone::new(2, SgeVector3::new(0.0, 1.0, 0.0)),
        SgeBone::new(3, SgeVector3::new(0.0, 2.0, 0.0)),
    ];
    bones[1].parent_address = 1;
    bones[2].parent_address = 2;
    bones[2].body_part = Some(sge_tools_lib::model::bone::BODY_PART_NECK);
    resolve_links(&mut bones).unwrap();

    let mut palette = [-1i16; MAX_PALETTE_BONES];
    palette[0] = 0;
    palette[1] = 1;
    palette[2] = 2;
    let submesh = SgeSubmesh {
        vertices: vec![
            vertex(SgeVector3::zero(), 0, 1.0),
            vertex(SgeVector3::new(1.0, 0.0, 0.0), 1, 0.75),
            vertex(SgeVector3::new(0.0, 0.0, 1.0), 2, 1.0),
        ],
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

    let animation = SgeAnimation {
        used_keyframes: vec![0, 1],
        bone_tables: vec![
            SgeAnimationBoneTable::default(),
            SgeAnimationBoneTable {
                keyframes: vec![
                    BoneKeyframe {
                        translate_index: 0,
                        rotate_index: 0,
                        scale_index: 0,
                    },
                    BoneKeyframe {
                        translate_index: 1,
                        rotate_index: 0,
                        scale_index: 0,
                    },
                ],
            },
            SgeAnimationBoneTable {
                keyframes: vec![
                    BoneKeyframe {
                        translate_index: 0,
                        rotate_index: 0,
                        scale_index: 0,
                    },
                    BoneKeyframe {
                        translate_index: 0,
                        rotate_index: 0,
                        scale_index: 1,
                    },
                ],
            },
        ],
    };

    SgeModel {
        name: "c_test".to_string(),
        header: SgeHeader {
            version: 8,
            model_type: SgeModelType::Character,
        },
        materials: vec![SgeMaterial::new(0, "c_test_tex")],
        bones,
        submesh_groups: vec![vec![submesh]],
        animations: vec![animation],
        translate_data: vec![SgeVector3::zero(), SgeVector3::new(0.0, 0.5, 0.0)],
        rotate_data: vec![SgeQuaternion::identity()],
        scale_data: vec![SgeVector3::one(), SgeVector3::new(1.5, 1.5, 1.5)],
        keyframe_definitions: vec![
            KeyframeDefinition {
                end_frame: 10,
                num_frames: 10,
            },
            KeyframeDefinition {
                end_frame: 30,
                num_frames: 10,
            },
        ],
        gx_lighting_table: vec![SgeGXLightingData::default_entry()],
        blend_table: vec![],
        outline_table: vec![],
        bone_animation_groups: vec![],
    }
}
