//! Structural invariant checks shared by the decoders and encoders.
//!
//! Every rule here is checked eagerly: a model that passes `validate_model`
//! can be walked without further bounds checking.

use std::collections::HashSet;

use crate::error::{Result, SgeError};
use crate::model::{SgeModel, SgeSubmesh, MAX_PALETTE_BONES};

pub fn validate_model(model: &SgeModel) -> Result<()> {
    validate_bones(model)?;
    for (g, group) in model.submesh_groups.iter().enumerate() {
        for (s, submesh) in group.iter().enumerate() {
            validate_submesh(model, submesh)
                .map_err(|e| annotate(e, &format!("submesh {s} of group {g}")))?;
        }
    }
    validate_animations(model)?;
    for group in &model.bone_animation_groups {
        for &index in &group.bone_indices {
            if index >= model.bones.len() {
                return Err(SgeError::UnresolvedReference {
                    what: "bone animation group member".to_string(),
                    index: index as i64,
                    bound: model.bones.len(),
                });
            }
        }
    }
    Ok(())
}

fn annotate(error: SgeError, context: &str) -> SgeError {
    match error {
        SgeError::InvariantViolation(msg) => {
            SgeError::InvariantViolation(format!("{context}: {msg}"))
        }
        other => other,
    }
}

fn validate_bones(model: &SgeModel) -> Result<()> {
    let mut seen = HashSet::new();
    for bone in &model.bones {
        if bone.address == 0 {
            return Err(SgeError::InvariantViolation(
                "bone address 0 is reserved for \"none\"".to_string(),
            ));
        }
        if !seen.insert(bone.address) {
            return Err(SgeError::InvariantViolation(format!(
                "duplicate bone address {}",
                bone.address
            )));
        }
    }
    for bone in &model.bones {
        for link in [
            bone.parent_address,
            bone.child_address,
            bone.next_sibling_address,
        ] {
            if link != 0 && !seen.contains(&link) {
                return Err(SgeError::UnresolvedReference {
                    what: "bone link".to_string(),
                    index: link as i64,
                    bound: model.bones.len(),
                });
            }
        }
    }
    Ok(())
}

fn validate_submesh(model: &SgeModel, submesh: &SgeSubmesh) -> Result<()> {
    model.material_of(submesh)?;

    for &entry in submesh.bone_palette.iter() {
        if entry < 0 {
            continue;
        }
        let address = entry as i32 + 1;
        if !model.bones.iter().any(|b| b.address == address) {
            return Err(SgeError::UnresolvedReference {
                what: "bone palette entry".to_string(),
                index: address as i64,
                bound: model.bones.len(),
            });
        }
    }

    for vertex in &submesh.vertices {
        for &slot in &vertex.bone_indices {
            if slot as usize >= MAX_PALETTE_BONES {
                return Err(SgeError::UnresolvedReference {
                    what: "bone palette slot".to_string(),
                    index: slot as i64,
                    bound: MAX_PALETTE_BONES,
                });
            }
        }
    }

    for face in &submesh.faces {
        for &v in &face.polygon {
            if v as usize >= submesh.vertices.len() {
                return Err(SgeError::UnresolvedReference {
                    what: "face vertex".to_string(),
                    index: v as i64,
                    bound: submesh.vertices.len(),
                });
            }
        }
    }

    // Start/end bookkeeping must describe exactly the vertices present.
    if !submesh.vertices.is_empty() {
        let span = submesh
            .end_vertex
            .checked_sub(submesh.start_vertex)
            .map(|d| d + 1);
        if span != Some(submesh.vertices.len()) {
            return Err(SgeError::InvariantViolation(format!(
                "vertex range {}..={} does not cover {} vertices",
                submesh.start_vertex,
                submesh.end_vertex,
                submesh.vertices.len()
            )));
        }
    }
    if submesh.face_count != submesh.faces.len() {
        return Err(SgeError::InvariantViolation(format!(
            "face count {} does not match {} faces",
            submesh.face_count,
            submesh.faces.len()
        )));
    }
    Ok(())
}

fn validate_animations(model: &SgeModel) -> Result<()> {
    for (a, animation) in model.animations.iter().enumerate() {
        for &index in &animation.used_keyframes {
            if index >= model.keyframe_definitions.len() {
                return Err(SgeError::UnresolvedReference {
                    what: "keyframe definition".to_string(),
                    index: index as i64,
                    bound: model.keyframe_definitions.len(),
                });
            }
        }
        if animation.bone_tables.is_empty() {
            continue;
        }
        if animation.bone_tables.len() < model.bones.len() {
            return Err(SgeError::InvariantViolation(format!(
                "animation {} has {} bone tables for {} bones",
                a,
                animation.bone_tables.len(),
                model.bones.len()
            )));
        }
        // Table 0 belongs to the sentinel bone and is never read.
        for (b, table) in animation.bone_tables.iter().enumerate().skip(1) {
            if table.keyframes.len() < animation.used_keyframes.len() {
                return Err(SgeError::InvariantViolation(format!(
                    "animation {} bone table {} has {} keyframes for {} used keyframes",
                    a,
                    b,
                    table.keyframes.len(),
                    animation.used_keyframes.len()
                )));
            }
            for keyframe in &table.keyframes {
                check_pool(keyframe.translate_index, model.translate_data.len(), "translate pool entry")?;
                check_pool(keyframe.rotate_index, model.rotate_data.len(), "rotate pool entry")?;
                check_pool(keyframe.scale_index, model.scale_data.len(), "scale pool entry")?;
            }
        }
    }
    Ok(())
}

fn check_pool(index: usize, bound: usize, what: &str) -> Result<()> {
    if index >= bound {
        return Err(SgeError::UnresolvedReference {
            what: what.to_string(),
            index: index as i64,
            bound,
        });
    }
    Ok(())
}
