//! Loader settings.
//!
//! ```json
//! {
//!     "base_dir": "assets",
//!     "textures": true,
//!     "shaders": false,
//!     "preload_textures": true
//! }
//! ```
//!
//! Every field is optional.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AssetError, AssetResult, Location};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory relative asset paths are resolved against. When unset, paths
    /// are relative to the markup file that names them.
    pub base_dir: Option<PathBuf>,

    /// Attach bitmap textures to materials
    pub textures: bool,

    /// Attach shader sources to materials
    pub shaders: bool,

    /// Decode texture images during scene assembly
    pub preload_textures: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            textures: true,
            shaders: true,
            preload_textures: false,
        }
    }
}

impl LoaderConfig {
    pub fn from_json_str(json: &str, source_name: &str) -> AssetResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            AssetError::malformed(source_name, Location::Line(e.line()), e.to_string())
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> AssetResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| AssetError::file_not_found(path, e))?;
        let config = Self::from_json_str(&json, &path.display().to_string())?;
        log::debug!("Loaded loader config from {}", path.display());
        Ok(config)
    }

    /// Resolve `path` against `base_dir`, or against `fallback` (normally the
    /// directory of the referencing markup file) when no base is configured.
    pub fn resolve(&self, path: &str, fallback: &Path) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match &self.base_dir {
            Some(base) => base.join(path),
            None => fallback.join(path),
        }
    }
}
