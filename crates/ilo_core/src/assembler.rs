//! Scene assembly: markup in, registry populated, node tree out.
//!
//! Loading runs in three passes.
//!
//! 1. Collection: every object's geometry and material reference is recorded
//!    against the library it names. Only referenced ids are ever requested.
//! 2. Resolve: each library with requested ids that are not yet registered is
//!    decoded. Results are staged and committed to the registry together once
//!    every library decoded, so a failed load registers nothing.
//! 3. Assembly: the `main` object becomes the root, every other object a
//!    direct child of it in declaration order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::config::LoaderConfig;
use crate::error::{AssetError, AssetResult, Location};
use crate::formats::{read_text, source_name};
use crate::library::{decode_geometry_library, decode_material_library, IdFilter};
use crate::markup::scene::ROOT_OBJECT_ID;
use crate::markup::{parse_scene, ObjectDecl, SceneDescription};
use crate::registry::{Namespace, Registry, ResourceKey};
use crate::scene::{Scene, SceneNode};
use crate::texture::TextureCache;

/// Ids requested per library, keyed by library id.
type Requests = BTreeMap<String, BTreeSet<String>>;

/// Loads scene markup files against one registry.
pub struct SceneAssembler<'a> {
    registry: &'a mut Registry,
    config: &'a LoaderConfig,
    textures: TextureCache,
}

impl<'a> SceneAssembler<'a> {
    pub fn new(registry: &'a mut Registry, config: &'a LoaderConfig) -> Self {
        Self {
            registry,
            config,
            textures: TextureCache::new(),
        }
    }

    /// Images decoded so far (only filled when `preload_textures` is set).
    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn registry(&self) -> &Registry {
        &*self.registry
    }

    /// Load a scene file. Relative library paths resolve against the
    /// configured base directory, or the scene file's directory.
    pub fn load(&mut self, path: impl AsRef<Path>) -> AssetResult<Scene> {
        let path = path.as_ref();
        let markup = read_text(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        self.load_from_str(&markup, &source_name(path), base_dir)
    }

    /// Load scene markup that is already in memory.
    pub fn load_from_str(&mut self, markup: &str, source_name: &str, base_dir: &Path) -> AssetResult<Scene> {
        let description = parse_scene(markup, source_name)?;

        let (geometry, materials) = collect_requests(&description)?;
        self.resolve(&description, &geometry, &materials, base_dir)?;
        let scene = self.assemble(description, source_name)?;

        log::info!(
            "Loaded scene {} with {} nodes ({} meshes, {} materials registered)",
            source_name,
            scene.node_count(),
            self.registry.geometry().len(),
            self.registry.materials().len()
        );
        Ok(scene)
    }

    fn resolve(
        &mut self,
        description: &SceneDescription,
        geometry: &Requests,
        materials: &Requests,
        base_dir: &Path,
    ) -> AssetResult<()> {
        let mut staged_meshes = Vec::new();
        for lib in &description.geometry_libs {
            let needed = missing_ids(geometry, &lib.id, |id| self.registry.geometry().has(&lib.id, id));
            if needed.is_empty() {
                continue;
            }
            let path = self.config.resolve(&lib.src, base_dir);
            staged_meshes.extend(decode_geometry_library(&lib.id, &path, lib.format, &IdFilter::Only(needed))?);
        }

        let mut staged_materials = Vec::new();
        for lib in &description.material_libs {
            let needed = missing_ids(materials, &lib.id, |id| self.registry.materials().has(&lib.id, id));
            if needed.is_empty() {
                continue;
            }
            let path = self.config.resolve(&lib.src, base_dir);
            staged_materials.extend(decode_material_library(
                &lib.id,
                &path,
                &IdFilter::Only(needed),
                self.config,
                Some(&mut self.textures),
            )?);
        }

        self.registry.geometry().check_batch(&staged_meshes)?;
        self.registry.materials().check_batch(&staged_materials)?;
        self.registry.geometry_mut().add_batch(staged_meshes)?;
        self.registry.materials_mut().add_batch(staged_materials)?;
        Ok(())
    }

    fn assemble(&self, description: SceneDescription, source_name: &str) -> AssetResult<Scene> {
        let mut root = None;
        let mut children = Vec::new();
        for decl in &description.objects {
            let node = self.build_node(decl)?;
            if decl.id == ROOT_OBJECT_ID {
                root = Some(node);
            } else {
                children.push(node);
            }
        }

        let mut root = root.ok_or_else(|| {
            AssetError::malformed(
                source_name,
                Location::Unknown,
                format!("scene has no '{ROOT_OBJECT_ID}' object"),
            )
        })?;
        for child in children {
            root.add_child(child)
                .map_err(|e| AssetError::malformed(source_name, Location::Unknown, e.to_string()))?;
        }

        Ok(Scene::new(description.info, root))
    }

    fn build_node(&self, decl: &ObjectDecl) -> AssetResult<SceneNode> {
        let mut node = SceneNode::new(decl.id.as_str()).with_transform(decl.transform);
        node.visible = decl.visible;
        node.hittest = decl.hittest;
        node.shadow = decl.shadow;

        if let Some(key) = &decl.geometry {
            self.registry.geometry().get_key(key)?;
            node = node.with_geometry(key.clone());
        }
        if let Some(key) = &decl.material {
            self.registry.materials().get_key(key)?;
            node = node.with_material(key.clone());
        }
        Ok(node)
    }
}

/// Collection pass. Fails on a reference to a library the scene never
/// declares.
fn collect_requests(description: &SceneDescription) -> AssetResult<(Requests, Requests)> {
    let mut geometry = Requests::new();
    let mut materials = Requests::new();

    for object in &description.objects {
        if let Some(key) = &object.geometry {
            if description.geometry_lib(&key.library).is_none() {
                return Err(unresolved(Namespace::Geometry, key));
            }
            geometry.entry(key.library.clone()).or_default().insert(key.id.clone());
        }
        if let Some(key) = &object.material {
            if description.material_lib(&key.library).is_none() {
                return Err(unresolved(Namespace::Material, key));
            }
            materials.entry(key.library.clone()).or_default().insert(key.id.clone());
        }
    }

    log::debug!(
        "Collected {} geometry and {} material requests",
        geometry.values().map(BTreeSet::len).sum::<usize>(),
        materials.values().map(BTreeSet::len).sum::<usize>()
    );
    Ok((geometry, materials))
}

/// Requested ids of `library` that are not registered yet.
fn missing_ids(requests: &Requests, library: &str, registered: impl Fn(&str) -> bool) -> BTreeSet<String> {
    requests
        .get(library)
        .map(|ids| ids.iter().filter(|id| !registered(id)).cloned().collect())
        .unwrap_or_default()
}

fn unresolved(namespace: Namespace, key: &ResourceKey) -> AssetError {
    AssetError::UnresolvedReference {
        namespace,
        library: key.library.clone(),
        id: key.id.clone(),
    }
}
