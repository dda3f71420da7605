use serde::{Deserialize, Serialize};

use crate::math::SgeColor;

/// A material slot: a name and an optional texture path. An absent path
/// means the submesh renders untextured (vertex color only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SgeMaterial {
    pub index: usize,
    pub name: String,
    #[serde(default)]
    pub texture_path: Option<String>,
}

impl SgeMaterial {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        SgeMaterial {
            index,
            name: name.into(),
            texture_path: None,
        }
    }
}

/// Entries in the out-of-line side tables are shared between submeshes by
/// their stored `Offset`; a submesh carries the offset, not the entry.
pub trait OffsetEntry {
    fn offset(&self) -> i32;
}

/// Resolve a nullable offset against a side table.
///
/// Linear scan, first match in table order wins (offsets are not required to
/// be unique). No match is not an error: most submeshes carry no custom
/// entry.
pub fn resolve_by_offset<T: OffsetEntry>(table: &[T], address: Option<i32>) -> Option<&T> {
    let address = address?;
    table.iter().find(|entry| entry.offset() == address)
}

/// GX lighting parameters shared by submeshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SgeGXLightingData {
    pub offset: i32,
    pub ambient_r: f32,
    pub ambient_g: f32,
    pub ambient_b: f32,
    pub ambient_a: f32,
    pub material_r: f32,
    pub material_g: f32,
    pub material_b: f32,
    pub material_a: f32,
    pub combined_r: f32,
    pub combined_g: f32,
    pub combined_b: f32,
    pub combined_a: f32,
    #[serde(default)]
    pub unknown30: f32,
    #[serde(default)]
    pub unknown34: f32,
    #[serde(default)]
    pub unknown38: f32,
    #[serde(default, rename = "Unknown3C")]
    pub unknown3c: f32,
    #[serde(default)]
    pub unknown40: f32,
    pub default_lighting_enabled: bool,
}

impl SgeGXLightingData {
    /// The single lighting entry the exporter writes for models authored
    /// without custom lighting, keyed at offset 1.
    pub fn default_entry() -> Self {
        SgeGXLightingData {
            offset: 1,
            ambient_r: 1.0,
            ambient_g: 1.0,
            ambient_b: 1.0,
            ambient_a: 1.0,
            material_r: 1.0,
            material_g: 1.0,
            material_b: 1.0,
            material_a: 0.0,
            combined_r: 0.0,
            combined_g: 0.0,
            combined_b: 0.0,
            combined_a: 0.0,
            unknown30: 0.0,
            unknown34: 0.0,
            unknown38: 0.0,
            unknown3c: 0.0,
            unknown40: 0.1,
            default_lighting_enabled: true,
        }
    }
}

impl OffsetEntry for SgeGXLightingData {
    fn offset(&self) -> i32 {
        self.offset
    }
}

/// Alpha blend parameters for a submesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubmeshBlendData {
    pub offset: i32,
    #[serde(default)]
    pub alpha_compare: i32,
    #[serde(default)]
    pub blend_mode: i32,
    #[serde(default, rename = "Unknown0C")]
    pub unknown0c: i32,
    #[serde(default)]
    pub unknown10: i32,
    #[serde(default)]
    pub unknown14: i32,
}

impl OffsetEntry for SubmeshBlendData {
    fn offset(&self) -> i32 {
        self.offset
    }
}

/// Outline stroke parameters for a submesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutlineData {
    pub offset: i32,
    #[serde(default)]
    pub weight: f32,
    #[serde(default)]
    pub color: SgeColor,
}

impl OffsetEntry for OutlineData {
    fn offset(&self) -> i32 {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_offset_first_match() {
        let table = vec![
            SubmeshBlendData {
                offset: 4,
                blend_mode: 1,
                ..Default::default()
            },
            SubmeshBlendData {
                offset: 8,
                blend_mode: 2,
                ..Default::default()
            },
            // Duplicate offset: the earlier entry must win.
            SubmeshBlendData {
                offset: 8,
                blend_mode: 3,
                ..Default::default()
            },
        ];

        assert_eq!(resolve_by_offset(&table, Some(8)).unwrap().blend_mode, 2);
        assert_eq!(resolve_by_offset(&table, Some(4)).unwrap().blend_mode, 1);
    }

    #[test]
    fn test_resolve_by_offset_no_match_is_none() {
        let table = vec![SubmeshBlendData::default()];
        assert!(resolve_by_offset(&table, Some(99)).is_none());
        assert!(resolve_by_offset(&table, None).is_none());
    }

    #[test]
    fn test_untextured_material_decodes() {
        let m: SgeMaterial =
            serde_json::from_str(r#"{"Index": 0, "Name": "skin", "TexturePath": null}"#).unwrap();
        assert!(m.texture_path.is_none());
    }

    #[test]
    fn test_default_lighting_entry_json_names() {
        let text = serde_json::to_string(&SgeGXLightingData::default_entry()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["Offset"], 1);
        assert_eq!(parsed["AmbientR"], 1.0);
        assert_eq!(parsed["DefaultLightingEnabled"], true);
        assert!(parsed.get("Unknown3C").is_some());
    }
}
