use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, SgeError>;

/// Everything that can go wrong while decoding, encoding or validating a
/// model.
#[derive(Debug)]
pub enum SgeError {
    Io(io::Error),
    /// The document or container cannot be parsed at all.
    MalformedDocument(String),
    /// A parsed index or address points outside its table.
    UnresolvedReference {
        what: String,
        index: i64,
        bound: usize,
    },
    /// The header carries a version this codec does not speak.
    UnsupportedFormatVersion(i16),
    /// The data parsed but breaks a structural rule of the format.
    InvariantViolation(String),
}

impl fmt::Display for SgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SgeError::Io(e) => write!(f, "io error: {e}"),
            SgeError::MalformedDocument(msg) => write!(f, "malformed document: {msg}"),
            SgeError::UnresolvedReference { what, index, bound } => {
                write!(f, "unresolved {what}: {index} (table holds {bound})")
            }
            SgeError::UnsupportedFormatVersion(version) => {
                write!(f, "unsupported format version {version}")
            }
            SgeError::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
        }
    }
}

impl std::error::Error for SgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SgeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SgeError {
    fn from(e: io::Error) -> Self {
        SgeError::Io(e)
    }
}

impl From<serde_json::Error> for SgeError {
    fn from(e: serde_json::Error) -> Self {
        SgeError::MalformedDocument(e.to_string())
    }
}

impl From<binrw::Error> for SgeError {
    fn from(e: binrw::Error) -> Self {
        match e {
            binrw::Error::Io(io) => SgeError::Io(io),
            other => SgeError::MalformedDocument(other.to_string()),
        }
    }
}
