use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SgeError};
use crate::math::SgeVector3;

// Body part tag bits as written by the original exporter.
pub const BODY_PART_NECK: i16 = 0x0002;
pub const BODY_PART_FACE: i16 = 0x0004;
pub const BODY_PART_CHEST: i16 = 0x0008;
pub const BODY_PART_STOMACH: i16 = 0x0010;
pub const BODY_PART_RIGHT_HAND: i16 = 0x0020;
pub const BODY_PART_LEFT_HAND: i16 = 0x0040;
pub const BODY_PART_UNKNOWN_0080: i16 = 0x0080;
pub const BODY_PART_UNKNOWN_0100: i16 = 0x0100;
pub const BODY_PART_RIGHT_FOOT: i16 = 0x0200;
pub const BODY_PART_LEFT_FOOT: i16 = 0x0400;
pub const BODY_PART_EYEBROWS: i16 = 0x0800;
pub const BODY_PART_RIGHT_LEG: i16 = 0x1000;
pub const BODY_PART_LEFT_LEG: i16 = 0x2000;
pub const BODY_PART_RIGHT_CHEEK: i16 = 0x4000;
// 0x8000 wraps negative in a signed 16-bit tag.
pub const BODY_PART_LEFT_CHEEK: i16 = i16::MIN;

/// Named bone collections recognized by the exporter, in evaluation order.
pub const BODY_PART_GROUPS: [(&str, i16); 15] = [
    ("NeckBone", BODY_PART_NECK),
    ("FaceBone", BODY_PART_FACE),
    ("ChestBones", BODY_PART_CHEST),
    ("StomachBone", BODY_PART_STOMACH),
    ("RightHandBone", BODY_PART_RIGHT_HAND),
    ("LeftHandBone", BODY_PART_LEFT_HAND),
    ("Unknown0080Group", BODY_PART_UNKNOWN_0080),
    ("Unknown0100Group", BODY_PART_UNKNOWN_0100),
    ("RightFootBone", BODY_PART_RIGHT_FOOT),
    ("LeftFootBone", BODY_PART_LEFT_FOOT),
    ("EyebrowBones", BODY_PART_EYEBROWS),
    ("RightLegBone", BODY_PART_RIGHT_LEG),
    ("LeftLegBone", BODY_PART_LEFT_LEG),
    ("RightCheekBone", BODY_PART_RIGHT_CHEEK),
    ("LeftCheekBone", BODY_PART_LEFT_CHEEK),
];

/// Map a set of named group memberships to a body part tag.
///
/// A bone in several matching groups keeps only the last matching tag; the
/// original tooling overwrites on every match and this reproduces that
/// last-write-wins behavior.
pub fn body_part_for_groups(groups: &[&str]) -> Option<i16> {
    let mut tag = None;
    for (name, mask) in BODY_PART_GROUPS.iter() {
        if groups.contains(name) {
            tag = Some(*mask);
        }
    }
    tag
}

/// A bone in the flat address-linked table.
///
/// `child_address`/`next_sibling_address` encode a first-child/next-sibling
/// tree; `parent_address` of 0 marks a root. Addresses are 1-based and 0
/// always means "none".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SgeBone {
    pub address: i32,
    pub head_position: SgeVector3,
    pub tail_offset: SgeVector3,
    #[serde(default)]
    pub parent_address: i32,
    #[serde(default)]
    pub child_address: i32,
    #[serde(default)]
    pub next_sibling_address: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_part: Option<i16>,
    /// Weighted vertex attachments keyed `"group,submesh,vertex"`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vertex_group: BTreeMap<String, f32>,
}

impl SgeBone {
    pub fn new(address: i32, head_position: SgeVector3) -> Self {
        SgeBone {
            address,
            head_position,
            tail_offset: SgeVector3::new(0.0, 1.0, 0.0),
            parent_address: 0,
            child_address: 0,
            next_sibling_address: 0,
            body_part: None,
            vertex_group: BTreeMap::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_address == 0
    }

    /// Rest pose as a translation to the bone head.
    pub fn rest_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.head_position.0)
    }
}

/// The nested recursive bone encoding used by the older schema variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NestedBone {
    pub head_position: SgeVector3,
    pub tail_offset: SgeVector3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_part: Option<i16>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vertex_group: BTreeMap<String, f32>,
    #[serde(default)]
    pub child_bones: Vec<NestedBone>,
}

fn position_of(bones: &[SgeBone], address: i32) -> Result<usize> {
    bones
        .iter()
        .position(|b| b.address == address)
        .ok_or_else(|| SgeError::UnresolvedReference {
            what: "bone address".to_string(),
            index: address as i64,
            bound: bones.len(),
        })
}

/// Rebuild the first-child/next-sibling links from parent addresses.
///
/// Bones are processed in list order and appended to the end of their
/// parent's sibling chain, so first-encountered-in-list becomes first child.
/// The scan is O(n²) but bone counts stay well under 200.
pub fn resolve_links(bones: &mut [SgeBone]) -> Result<()> {
    for bone in bones.iter_mut() {
        bone.child_address = 0;
        bone.next_sibling_address = 0;
    }
    for i in 0..bones.len() {
        let parent_address = bones[i].parent_address;
        if parent_address == 0 {
            continue;
        }
        let address = bones[i].address;
        let parent_idx = position_of(bones, parent_address)?;
        if bones[parent_idx].child_address == 0 {
            bones[parent_idx].child_address = address;
            continue;
        }
        // Walk the existing sibling chain to its end and append.
        let mut cursor = position_of(bones, bones[parent_idx].child_address)?;
        let mut steps = 0;
        while bones[cursor].next_sibling_address != 0 {
            cursor = position_of(bones, bones[cursor].next_sibling_address)?;
            steps += 1;
            if steps > bones.len() {
                return Err(SgeError::InvariantViolation(
                    "cycle detected in bone sibling chain".to_string(),
                ));
            }
        }
        bones[cursor].next_sibling_address = address;
    }
    Ok(())
}

/// Child addresses of a bone in sibling-chain order.
pub fn children_of(bones: &[SgeBone], address: i32) -> Result<Vec<i32>> {
    let idx = position_of(bones, address)?;
    let mut children = vec![];
    let mut cursor = bones[idx].child_address;
    while cursor != 0 {
        children.push(cursor);
        let child_idx = position_of(bones, cursor)?;
        cursor = bones[child_idx].next_sibling_address;
        if children.len() > bones.len() {
            return Err(SgeError::InvariantViolation(
                "cycle detected in bone sibling chain".to_string(),
            ));
        }
    }
    Ok(children)
}

/// Flatten the nested encoding into the canonical address-linked table,
/// assigning addresses in depth-first traversal order starting at 1.
pub fn flatten_nested(root: &NestedBone) -> Result<Vec<SgeBone>> {
    let mut bones = vec![];
    flatten_into(root, 0, &mut bones);
    resolve_links(&mut bones)?;
    Ok(bones)
}

fn flatten_into(node: &NestedBone, parent_address: i32, out: &mut Vec<SgeBone>) {
    let address = out.len() as i32 + 1;
    out.push(SgeBone {
        address,
        head_position: node.head_position,
        tail_offset: node.tail_offset,
        parent_address,
        child_address: 0,
        next_sibling_address: 0,
        body_part: node.body_part,
        vertex_group: node.vertex_group.clone(),
    });
    for child in &node.child_bones {
        flatten_into(child, address, out);
    }
}

/// Build the nested encoding from the flat table. The table must contain
/// exactly one root.
pub fn to_nested(bones: &[SgeBone]) -> Result<NestedBone> {
    let roots: Vec<&SgeBone> = bones.iter().filter(|b| b.is_root()).collect();
    match roots.len() {
        1 => nest_from(bones, roots[0], 0),
        0 => Err(SgeError::InvariantViolation(
            "bone table has no root bone".to_string(),
        )),
        n => Err(SgeError::InvariantViolation(format!(
            "bone table has {} root bones, expected exactly one",
            n
        ))),
    }
}

fn nest_from(bones: &[SgeBone], bone: &SgeBone, depth: usize) -> Result<NestedBone> {
    if depth > bones.len() {
        return Err(SgeError::InvariantViolation(
            "cycle detected in bone tree".to_string(),
        ));
    }
    let mut child_bones = vec![];
    for child_address in children_of(bones, bone.address)? {
        let child_idx = position_of(bones, child_address)?;
        child_bones.push(nest_from(bones, &bones[child_idx], depth + 1)?);
    }
    Ok(NestedBone {
        head_position: bone.head_position,
        tail_offset: bone.tail_offset,
        body_part: bone.body_part,
        vertex_group: bone.vertex_group.clone(),
        child_bones,
    })
}

/// A named animation group: indices (0-based) into the bone list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoneAnimationGroup {
    #[serde(default)]
    pub bone_indices: Vec<usize>,
}
