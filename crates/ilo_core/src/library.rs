//! Loading geometry and material libraries into the registry.
//!
//! A library is one source file: a model file for geometry, a material
//! markup file for materials. Callers pick which ids they want with an
//! [`IdFilter`]. Decoding is staged: nothing reaches the registry until the
//! whole library decoded and every requested id was found.

use std::collections::BTreeSet;
use std::path::Path;

use crate::config::LoaderConfig;
use crate::error::{AssetError, AssetResult};
use crate::formats::{read_text, source_name, ModelFormat};
use crate::markup::parse_material_library;
use crate::material::Material;
use crate::mesh::Mesh;
use crate::registry::{Namespace, Registry, ResourceKey};
use crate::texture::TextureCache;

/// Which ids to take from a library.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum IdFilter {
    /// Everything the library contains
    #[default]
    All,
    /// Only these ids; each one must exist
    Only(BTreeSet<String>),
}

impl IdFilter {
    /// `["*"]` means everything.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        if ids.contains("*") {
            IdFilter::All
        } else {
            IdFilter::Only(ids)
        }
    }

    pub fn accepts(&self, id: &str) -> bool {
        match self {
            IdFilter::All => true,
            IdFilter::Only(ids) => ids.contains(id),
        }
    }

    /// First requested id that is not in `found`.
    fn first_missing<'a>(&'a self, found: &BTreeSet<&str>) -> Option<&'a str> {
        match self {
            IdFilter::All => None,
            IdFilter::Only(ids) => ids.iter().map(String::as_str).find(|id| !found.contains(id)),
        }
    }
}

/// Decode the selected models of a geometry library, without touching the
/// registry.
///
/// With no explicit `format` it is inferred from the file extension.
pub fn decode_geometry_library(
    library: &str,
    path: &Path,
    format: Option<ModelFormat>,
    filter: &IdFilter,
) -> AssetResult<Vec<(ResourceKey, Mesh)>> {
    let format = match format {
        Some(format) => format,
        None => ModelFormat::from_path(path)?,
    };

    let models = format.decode_file(path)?;
    let mut staged = Vec::new();
    for raw in models.iter().filter(|m| filter.accepts(&m.name)) {
        staged.push((ResourceKey::new(library, raw.name.as_str()), Mesh::from_raw(raw)?));
    }

    let found: BTreeSet<&str> = staged.iter().map(|(key, _)| key.id.as_str()).collect();
    if let Some(missing) = filter.first_missing(&found) {
        return Err(AssetError::UnresolvedReference {
            namespace: Namespace::Geometry,
            library: library.to_string(),
            id: missing.to_string(),
        });
    }

    log::info!(
        "Decoded {} of {} models from {} ({}) as geometry library '{}'",
        staged.len(),
        models.len(),
        path.display(),
        format,
        library
    );
    Ok(staged)
}

/// Build the selected materials of a material library, without touching the
/// registry.
pub fn decode_material_library(
    library: &str,
    path: &Path,
    filter: &IdFilter,
    config: &LoaderConfig,
    mut textures: Option<&mut TextureCache>,
) -> AssetResult<Vec<(ResourceKey, Material)>> {
    let text = read_text(path)?;
    let decls = parse_material_library(&text, &source_name(path))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));

    let mut staged = Vec::new();
    for decl in decls.iter().filter(|d| filter.accepts(&d.id)) {
        let material = decl.build(config, base_dir, textures.as_deref_mut())?;
        staged.push((ResourceKey::new(library, decl.id.as_str()), material));
    }

    let found: BTreeSet<&str> = staged.iter().map(|(key, _)| key.id.as_str()).collect();
    if let Some(missing) = filter.first_missing(&found) {
        return Err(AssetError::UnresolvedReference {
            namespace: Namespace::Material,
            library: library.to_string(),
            id: missing.to_string(),
        });
    }

    log::info!(
        "Built {} of {} materials from {} as material library '{}'",
        staged.len(),
        decls.len(),
        path.display(),
        library
    );
    Ok(staged)
}

/// Decode a geometry library and register its models. Returns the new keys.
pub fn load_geometry_library(
    registry: &mut Registry,
    library: &str,
    path: &Path,
    format: Option<ModelFormat>,
    filter: &IdFilter,
) -> AssetResult<Vec<ResourceKey>> {
    let staged = decode_geometry_library(library, path, format, filter)?;
    let keys = staged.iter().map(|(key, _)| key.clone()).collect();
    registry.geometry_mut().add_batch(staged)?;
    Ok(keys)
}

/// Build a material library and register its materials. Returns the new keys.
pub fn load_material_library(
    registry: &mut Registry,
    library: &str,
    path: &Path,
    filter: &IdFilter,
    config: &LoaderConfig,
    textures: Option<&mut TextureCache>,
) -> AssetResult<Vec<ResourceKey>> {
    let staged = decode_material_library(library, path, filter, config, textures)?;
    let keys = staged.iter().map(|(key, _)| key.clone()).collect();
    registry.materials_mut().add_batch(staged)?;
    Ok(keys)
}
