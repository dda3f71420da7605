use cgmath::Matrix4;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SgeError};
use crate::math::{SgeQuaternion, SgeVector3};
use crate::model::SgeModel;

/// A span of frames shared by every animation in the model. Definitions are
/// referenced by index from each animation's `UsedKeyframes` list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyframeDefinition {
    pub end_frame: i32,
    pub num_frames: i32,
}

impl KeyframeDefinition {
    /// The absolute frame this keyframe lands on.
    pub fn start_frame(&self) -> i32 {
        self.end_frame - self.num_frames
    }
}

/// One bone's pose at one used keyframe: three indices into the shared
/// translate/rotate/scale pools.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoneKeyframe {
    pub translate_index: usize,
    pub rotate_index: usize,
    pub scale_index: usize,
}

/// Per-bone keyframe table, aligned positionally with the animation's
/// `UsedKeyframes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SgeAnimationBoneTable {
    pub keyframes: Vec<BoneKeyframe>,
}

/// One animation clip. `used_keyframes` holds sparse indices into the
/// model's `KeyframeDefinitions`; `bone_tables` has one entry per bone in
/// bone-table order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SgeAnimation {
    pub used_keyframes: Vec<usize>,
    pub bone_tables: Vec<SgeAnimationBoneTable>,
}

/// A resolved pose sample: pool indices looked up and pinned to an absolute
/// frame number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonePose {
    pub frame: i32,
    pub translate: SgeVector3,
    pub rotate: SgeQuaternion,
    pub scale: SgeVector3,
}

impl BonePose {
    /// Local TRS transform, translation applied last.
    pub fn local_transform(&self) -> Matrix4<f32> {
        let t = Matrix4::from_translation(self.translate.0);
        let r = self.rotate.to_matrix();
        let s = Matrix4::from_nonuniform_scale(self.scale.0.x, self.scale.0.y, self.scale.0.z);
        t * r * s
    }

    /// Posed matrix for a bone with the given rest matrix.
    pub fn pose_matrix(&self, rest: Matrix4<f32>) -> Matrix4<f32> {
        rest * self.local_transform()
    }
}

/// All pose samples for one bone across one animation.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneTrack {
    /// 1-based bone address the track drives.
    pub bone_address: i32,
    pub poses: Vec<BonePose>,
}

/// Resolve one animation into per-bone pose tracks.
///
/// Bone index 0 is a sentinel in the original data and carries no usable
/// table, so tracks start at bone 1. Every remaining bone must have a table
/// at least as long as the animation's used-keyframe list.
pub fn assemble_tracks(model: &SgeModel, animation_index: usize) -> Result<Vec<BoneTrack>> {
    let animation =
        model
            .animations
            .get(animation_index)
            .ok_or_else(|| SgeError::UnresolvedReference {
                what: "animation".to_string(),
                index: animation_index as i64,
                bound: model.animations.len(),
            })?;

    let mut tracks = vec![];
    for (bone_index, bone) in model.bones.iter().enumerate().skip(1) {
        let table = animation.bone_tables.get(bone_index).ok_or_else(|| {
            SgeError::InvariantViolation(format!(
                "animation {} has no bone table for bone {}",
                animation_index, bone_index
            ))
        })?;
        if table.keyframes.len() < animation.used_keyframes.len() {
            return Err(SgeError::InvariantViolation(format!(
                "bone {} keyframe table has {} entries for {} used keyframes",
                bone_index,
                table.keyframes.len(),
                animation.used_keyframes.len()
            )));
        }

        let mut poses = vec![];
        for (slot, &definition_index) in animation.used_keyframes.iter().enumerate() {
            let definition = model
                .keyframe_definitions
                .get(definition_index)
                .ok_or_else(|| SgeError::UnresolvedReference {
                    what: "keyframe definition".to_string(),
                    index: definition_index as i64,
                    bound: model.keyframe_definitions.len(),
                })?;
            let keyframe = table.keyframes[slot];
            poses.push(BonePose {
                frame: definition.start_frame(),
                translate: pool_entry(
                    &model.translate_data,
                    keyframe.translate_index,
                    "translate pool entry",
                )?,
                rotate: pool_entry(
                    &model.rotate_data,
                    keyframe.rotate_index,
                    "rotate pool entry",
                )?,
                scale: pool_entry(&model.scale_data, keyframe.scale_index, "scale pool entry")?,
            });
        }
        tracks.push(BoneTrack {
            bone_address: bone.address,
            poses,
        });
    }
    Ok(tracks)
}

fn pool_entry<T: Copy>(pool: &[T], index: usize, what: &str) -> Result<T> {
    pool.get(index)
        .copied()
        .ok_or_else(|| SgeError::UnresolvedReference {
            what: what.to_string(),
            index: index as i64,
            bound: pool.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bone::SgeBone;
    use crate::model::SgeModel;
    use cgmath::SquareMatrix;

    fn model_with_animation(animation: SgeAnimation) -> SgeModel {
        let mut model = SgeModel::default();
        model.bones = vec![
            SgeBone::new(1, SgeVector3::zero()),
            SgeBone::new(2, SgeVector3::new(0.0, 1.0, 0.0)),
        ];
        model.translate_data = vec![SgeVector3::zero(), SgeVector3::new(1.0, 0.0, 0.0)];
        model.rotate_data = vec![SgeQuaternion::identity()];
        model.scale_data = vec![SgeVector3::one(), SgeVector3::new(2.0, 2.0, 2.0)];
        model.keyframe_definitions = vec![
            KeyframeDefinition {
                end_frame: 10,
                num_frames: 10,
            },
            KeyframeDefinition {
                end_frame: 40,
                num_frames: 15,
            },
        ];
        model.animations = vec![animation];
        model
    }

    fn table(keyframes: Vec<(usize, usize, usize)>) -> SgeAnimationBoneTable {
        SgeAnimationBoneTable {
            keyframes: keyframes
                .into_iter()
                .map(|(t, r, s)| BoneKeyframe {
                    translate_index: t,
                    rotate_index: r,
                    scale_index: s,
                })
                .collect(),
        }
    }

    #[test]
    fn test_assemble_tracks_skips_bone_zero() {
        let animation = SgeAnimation {
            used_keyframes: vec![0, 1],
            bone_tables: vec![table(vec![]), table(vec![(0, 0, 0), (1, 0, 1)])],
        };
        let model = model_with_animation(animation);

        let tracks = assemble_tracks(&model, 0).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].bone_address, 2);

        let poses = &tracks[0].poses;
        assert_eq!(poses.len(), 2);
        // Frame = EndFrame - NumFrames of the referenced definition.
        assert_eq!(poses[0].frame, 0);
        assert_eq!(poses[1].frame, 25);
        assert_eq!(poses[1].translate, SgeVector3::new(1.0, 0.0, 0.0));
        assert_eq!(poses[1].scale, SgeVector3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn test_short_bone_table_is_invariant_violation() {
        let animation = SgeAnimation {
            used_keyframes: vec![0, 1],
            bone_tables: vec![table(vec![]), table(vec![(0, 0, 0)])],
        };
        let model = model_with_animation(animation);
        let err = assemble_tracks(&model, 0).unwrap_err();
        assert!(matches!(err, SgeError::InvariantViolation(_)));
    }

    #[test]
    fn test_pool_index_out_of_range_is_unresolved() {
        let animation = SgeAnimation {
            used_keyframes: vec![0],
            bone_tables: vec![table(vec![]), table(vec![(7, 0, 0)])],
        };
        let model = model_with_animation(animation);
        let err = assemble_tracks(&model, 0).unwrap_err();
        match err {
            SgeError::UnresolvedReference { index, bound, .. } => {
                assert_eq!(index, 7);
                assert_eq!(bound, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_keyframe_definition_index_out_of_range_is_unresolved() {
        let animation = SgeAnimation {
            used_keyframes: vec![9],
            bone_tables: vec![table(vec![]), table(vec![(0, 0, 0)])],
        };
        let model = model_with_animation(animation);
        let err = assemble_tracks(&model, 0).unwrap_err();
        assert!(matches!(err, SgeError::UnresolvedReference { .. }));
    }

    #[test]
    fn test_pose_matrix_multiplies_rest_by_trs() {
        let pose = BonePose {
            frame: 0,
            translate: SgeVector3::new(1.0, 2.0, 3.0),
            rotate: SgeQuaternion::identity(),
            scale: SgeVector3::one(),
        };
        let local = pose.local_transform();
        assert_eq!(local.w.x, 1.0);
        assert_eq!(local.w.y, 2.0);
        assert_eq!(local.w.z, 3.0);

        let rest = Matrix4::from_translation(cgmath::Vector3::new(0.0, 5.0, 0.0));
        let posed = pose.pose_matrix(rest);
        assert_eq!(posed.w.y, 7.0);
        assert!(pose
            .pose_matrix(Matrix4::identity())
            .eq(&pose.local_transform()));
    }
}
