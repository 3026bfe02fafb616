//! Error taxonomy shared by decoders, the registry and the scene assembler.
//!
//! Every error carries the name of the source it came from (file name,
//! library/id) and, for record-level problems, a line or byte offset.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::registry::Namespace;

/// Where inside a source a malformed record was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    /// 1-based line number in a text source
    Line(usize),
    /// Absolute byte offset in a binary source
    Offset(u64),
    /// No finer position is known
    Unknown,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Line(line) => write!(f, " at line {line}"),
            Location::Offset(offset) => write!(f, " at byte offset {offset}"),
            Location::Unknown => Ok(()),
        }
    }
}

/// Per-vertex or per-face data channel an index points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Position,
    Normal,
    TexCoord,
    Color,
    FaceNormal,
    UvFace,
    NormalFace,
    ColorFace,
    /// A cross-reference between two binary lumps
    Lump(&'static str),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Position => f.write_str("positions"),
            Channel::Normal => f.write_str("vertex normals"),
            Channel::TexCoord => f.write_str("texture coordinates"),
            Channel::Color => f.write_str("vertex colors"),
            Channel::FaceNormal => f.write_str("face normals"),
            Channel::UvFace => f.write_str("uv faces"),
            Channel::NormalFace => f.write_str("normal faces"),
            Channel::ColorFace => f.write_str("color faces"),
            Channel::Lump(name) => write!(f, "{name} lump"),
        }
    }
}

/// Errors raised while decoding assets, maintaining the registry or
/// assembling a scene.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("file not found: {}", path.display())]
    FileNotFound {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported format in {source_name}: {reason}")]
    UnsupportedFormat { source_name: String, reason: String },

    #[error("malformed record in {source_name}{location}: {message}")]
    MalformedRecord {
        source_name: String,
        location: Location,
        message: String,
    },

    #[error("index {index} out of range for {channel} of '{model}' in {source_name} ({len} entries)")]
    IndexOutOfRange {
        source_name: String,
        model: String,
        channel: Channel,
        index: usize,
        len: usize,
    },

    #[error("duplicate {namespace} id '{library}.{id}'")]
    DuplicateResourceId {
        namespace: Namespace,
        library: String,
        id: String,
    },

    #[error("unresolved {namespace} reference '{library}.{id}'")]
    UnresolvedReference {
        namespace: Namespace,
        library: String,
        id: String,
    },
}

impl AssetError {
    pub fn malformed(source_name: impl Into<String>, location: Location, message: impl Into<String>) -> Self {
        AssetError::MalformedRecord {
            source_name: source_name.into(),
            location,
            message: message.into(),
        }
    }

    pub fn unsupported(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        AssetError::UnsupportedFormat {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn file_not_found(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AssetError::FileNotFound {
            path: path.into(),
            source,
        }
    }
}

/// Result type for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;
