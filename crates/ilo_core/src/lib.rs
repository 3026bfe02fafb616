//! ILO Core - Model decoding, resource registry and scene assembly.
//!
//! This crate provides:
//!
//! - **Decoders**: ASE, OBJ and Quake 3 BSP files into [`RawModel`]s
//! - **Meshes**: flat per-face-vertex buffers with bounding volumes
//! - **Registry**: geometry and material caches keyed by `library.id`
//! - **Scene assembly**: XML scene markup into a [`SceneNode`] tree
//!
//! # Example
//!
//! ```ignore
//! use ilo_core::{LoaderConfig, Registry, SceneAssembler};
//!
//! let mut registry = Registry::new();
//! let config = LoaderConfig::default();
//! let scene = SceneAssembler::new(&mut registry, &config).load("scenes/room.xml")?;
//! println!("Loaded {} nodes, {} meshes",
//!     scene.node_count(),
//!     registry.geometry().len());
//! ```

pub mod assembler;
pub mod config;
pub mod cursor;
pub mod error;
pub mod formats;
pub mod library;
pub mod markup;
pub mod material;
pub mod mesh;
pub mod raw;
pub mod registry;
pub mod scene;
pub mod texture;

// Re-export commonly used types
pub use assembler::SceneAssembler;
pub use config::LoaderConfig;
pub use error::{AssetError, AssetResult, Channel, Location};
pub use formats::ModelFormat;
pub use library::{load_geometry_library, load_material_library, IdFilter};
pub use material::{Material, ShaderSource, TextureFilter, TextureRef};
pub use mesh::{Mesh, MeshVertex};
pub use raw::RawModel;
pub use registry::{GpuHandle, Namespace, Registry, Resource, ResourceKey, ResourceStore};
pub use scene::{NodeError, NodeTransform, Scene, SceneInfo, SceneNode};
pub use texture::{Texture, TextureCache};
