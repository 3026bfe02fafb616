//! Decoder-native intermediate geometry.
//!
//! A `RawModel` is what every format decoder produces. All index data is
//! already 0-based when it leaves a decoder; channel layout still varies per
//! format and is resolved by [`Mesh::from_raw`](crate::mesh::Mesh::from_raw).

use ilo_math::{Vec2, Vec3, Vec4};

/// One decoded object, before normalization into a [`Mesh`](crate::mesh::Mesh).
#[derive(Clone, Debug, Default)]
pub struct RawModel {
    /// Object name, used as the resource id inside its library
    pub name: String,

    /// Name of the file (or other source) the model came from
    pub source: String,

    /// Vertex positions
    pub positions: Vec<Vec3>,

    /// Normals. Addressed through `normal_faces` when that is non-empty,
    /// otherwise parallel to `positions`. A zero vector marks a corner
    /// without a normal.
    pub normals: Vec<Vec3>,

    /// Texture coordinates. Addressed through `uv_faces` when that is
    /// non-empty, otherwise parallel to `positions`.
    pub uvs: Vec<Vec2>,

    /// RGBA vertex colours. Addressed through `color_faces` when that is
    /// non-empty, otherwise parallel to `positions`.
    pub colors: Vec<Vec4>,

    /// Triangles as position indices
    pub faces: Vec<[u32; 3]>,

    /// Triangles as indices into `uvs`, parallel to `faces`
    pub uv_faces: Vec<[u32; 3]>,

    /// Triangles as indices into `normals`, parallel to `faces`
    pub normal_faces: Vec<[u32; 3]>,

    /// Triangles as indices into `colors`, parallel to `faces`
    pub color_faces: Vec<[u32; 3]>,

    /// One normal per face, parallel to `faces` when present
    pub face_normals: Vec<Vec3>,
}

impl RawModel {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }

    /// True when the model carries no triangles at all.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}
