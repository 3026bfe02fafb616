//! Model file decoders.
//!
//! Each decoder turns one source into zero or more [`RawModel`]s with 0-based
//! indices. [`ModelFormat`] picks the decoder from a format name or a file
//! extension.

pub mod ase;
pub mod bsp;
pub mod obj;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{AssetError, AssetResult};
use crate::mesh::Mesh;
use crate::raw::RawModel;

/// Supported model file formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelFormat {
    /// ASCII Scene Export
    Ase,
    /// Wavefront OBJ
    Obj,
    /// Quake 3 BSP level
    Bsp,
}

impl ModelFormat {
    pub const ALL: [ModelFormat; 3] = [ModelFormat::Ase, ModelFormat::Obj, ModelFormat::Bsp];

    pub fn extension(self) -> &'static str {
        match self {
            ModelFormat::Ase => "ase",
            ModelFormat::Obj => "obj",
            ModelFormat::Bsp => "bsp",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> AssetResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        ext.parse().map_err(|_| {
            AssetError::unsupported(
                path.display().to_string(),
                format!("cannot infer a model format from extension '{ext}'"),
            )
        })
    }

    /// Decode an in-memory source. `source_name` is used in errors and as the
    /// default object name for formats that need one.
    pub fn decode_bytes(self, bytes: &[u8], source_name: &str) -> AssetResult<Vec<RawModel>> {
        match self {
            ModelFormat::Ase => ase::decode(&String::from_utf8_lossy(bytes), source_name),
            ModelFormat::Obj => {
                let stem = Path::new(source_name)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(source_name);
                obj::decode(&String::from_utf8_lossy(bytes), source_name, stem)
            }
            ModelFormat::Bsp => bsp::decode(bytes, source_name),
        }
    }

    /// Read and decode a model file.
    pub fn decode_file(self, path: &Path) -> AssetResult<Vec<RawModel>> {
        let bytes = read_source(path)?;
        self.decode_bytes(&bytes, &source_name(path))
    }

    /// Read, decode and convert every model in a file.
    pub fn load_meshes(self, path: &Path) -> AssetResult<Vec<Mesh>> {
        self.decode_file(path)?.iter().map(Mesh::from_raw).collect()
    }
}

impl FromStr for ModelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ase" => Ok(ModelFormat::Ase),
            "obj" => Ok(ModelFormat::Obj),
            "bsp" | "q3bsp" => Ok(ModelFormat::Bsp),
            other => Err(format!("unknown model format '{other}'")),
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// File name used to label errors and decoded models.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read a whole source file; any I/O failure is reported as `FileNotFound`.
pub fn read_source(path: &Path) -> AssetResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| AssetError::file_not_found(path, e))
}

/// Read a whole text source file.
pub fn read_text(path: &Path) -> AssetResult<String> {
    std::fs::read_to_string(path).map_err(|e| AssetError::file_not_found(path, e))
}
