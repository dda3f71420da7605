pub mod binary;
pub mod json;

use std::path::Path;

use anyhow::Context;

use crate::error::{Result, SgeError};
use crate::model::SgeModel;

/// Schema version with the nested `RootBone` tree and no blend/outline
/// tables.
pub const SGE_VERSION_NESTED: i16 = 6;
/// Schema version with the flat `SgeBones` table and full side tables.
pub const SGE_VERSION_FLAT: i16 = 8;

/// The two recognized interchange schema versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SgeFormatVersion {
    Nested,
    Flat,
}

impl SgeFormatVersion {
    pub fn header_version(&self) -> i16 {
        match self {
            SgeFormatVersion::Nested => SGE_VERSION_NESTED,
            SgeFormatVersion::Flat => SGE_VERSION_FLAT,
        }
    }

    pub fn from_header_version(version: i16) -> Result<Self> {
        match version {
            SGE_VERSION_NESTED => Ok(SgeFormatVersion::Nested),
            SGE_VERSION_FLAT => Ok(SgeFormatVersion::Flat),
            other => Err(SgeError::UnsupportedFormatVersion(other)),
        }
    }
}

pub use binary::{decode_binary, encode_binary};
pub use json::{decode_json, encode_json};

/// Load a model from disk, dispatching on the file extension: `.json` is
/// the interchange document, anything else is read as the legacy binary
/// container.
pub fn load_model(path: impl AsRef<Path>) -> anyhow::Result<SgeModel> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let model = if is_json {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        decode_json(&text).with_context(|| format!("failed to decode {}", path.display()))?
    } else {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        decode_binary(&data).with_context(|| format!("failed to decode {}", path.display()))?
    };
    Ok(model)
}

/// Write a model to disk as an interchange document.
pub fn save_model_json(
    model: &SgeModel,
    path: impl AsRef<Path>,
    version: SgeFormatVersion,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    let text = encode_json(model, version)
        .with_context(|| format!("failed to encode {}", path.display()))?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Write a model to disk as the legacy binary container.
pub fn save_model_binary(model: &SgeModel, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    let data =
        encode_binary(model).with_context(|| format!("failed to encode {}", path.display()))?;
    std::fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
