//! Render-ready geometry and the `RawModel` → `Mesh` converter.
//!
//! A `Mesh` stores flat per-face-vertex streams: every triangle contributes
//! three entries to each buffer, so shared vertices are expanded and the
//! buffers can be uploaded and drawn without an index buffer.

use ilo_math::{Aabb, BoundingSphere, Vec2, Vec3, Vec4};

use crate::error::{AssetError, AssetResult, Channel};
use crate::raw::RawModel;
use crate::registry::{GpuHandle, Namespace, Resource};

/// Interleaved vertex layout for renderers that prefer a single buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Immutable triangle geometry with per-face-vertex buffers and bounding volumes.
#[derive(Debug)]
pub struct Mesh {
    name: String,

    /// Number of distinct vertices referenced by the faces
    vertex_count: usize,

    /// Number of triangles
    face_count: usize,

    /// xyz per face-vertex
    positions: Vec<f32>,

    /// xyz per face-vertex
    normals: Vec<f32>,

    /// uv per face-vertex; (0, 0) when the source had no texture coordinates
    uvs: Vec<f32>,

    /// rgba per face-vertex, empty when the source had no colours
    colors: Vec<f32>,

    bounds: Aabb,
    sphere: BoundingSphere,

    /// Renderer-side buffers, attached after upload
    handle: Option<Box<dyn GpuHandle>>,
}

impl Mesh {
    /// Normalize a decoded model into a Mesh.
    ///
    /// Every face index is checked against the channel it addresses; the first
    /// bad index fails with `IndexOutOfRange`.
    pub fn from_raw(raw: &RawModel) -> AssetResult<Self> {
        let face_count = raw.faces.len();
        let out_of_range = |channel: Channel, index: usize, len: usize| AssetError::IndexOutOfRange {
            source_name: raw.source.clone(),
            model: raw.name.clone(),
            channel,
            index,
            len,
        };

        // Parallel per-face channels must cover every face.
        for (channel, len) in [
            (Channel::UvFace, raw.uv_faces.len()),
            (Channel::NormalFace, raw.normal_faces.len()),
            (Channel::ColorFace, raw.color_faces.len()),
            (Channel::FaceNormal, raw.face_normals.len()),
        ] {
            if len != 0 && len < face_count {
                return Err(out_of_range(channel, len, len));
            }
        }

        let corner_count = face_count * 3;
        let mut positions = Vec::with_capacity(corner_count * 3);
        let mut normals = Vec::with_capacity(corner_count * 3);
        let mut uvs = Vec::with_capacity(corner_count * 2);
        let mut colors = Vec::with_capacity(if raw.has_colors() { corner_count * 4 } else { 0 });
        let mut referenced = vec![false; raw.positions.len()];

        for (face_index, face) in raw.faces.iter().enumerate() {
            let mut corners = [Vec3::ZERO; 3];
            for (k, &index) in face.iter().enumerate() {
                let index = index as usize;
                corners[k] = *raw
                    .positions
                    .get(index)
                    .ok_or_else(|| out_of_range(Channel::Position, index, raw.positions.len()))?;
                referenced[index] = true;
            }

            let face_normal = match raw.face_normals.get(face_index) {
                Some(n) if *n != Vec3::ZERO => n.normalize_or_zero(),
                _ => (corners[1] - corners[0])
                    .cross(corners[2] - corners[0])
                    .normalize_or_zero(),
            };

            for k in 0..3 {
                let vertex = face[k] as usize;

                positions.extend_from_slice(&corners[k].to_array());

                let normal = match lookup(&raw.normals, &raw.normal_faces, face_index, k, vertex) {
                    Lookup::Found(n) if n != Vec3::ZERO => n,
                    Lookup::Found(_) | Lookup::Missing => face_normal,
                    Lookup::OutOfRange(index) => {
                        return Err(out_of_range(Channel::Normal, index, raw.normals.len()))
                    }
                };
                normals.extend_from_slice(&normal.to_array());

                let uv = match lookup(&raw.uvs, &raw.uv_faces, face_index, k, vertex) {
                    Lookup::Found(uv) => uv,
                    Lookup::Missing => Vec2::ZERO,
                    Lookup::OutOfRange(index) => {
                        return Err(out_of_range(Channel::TexCoord, index, raw.uvs.len()))
                    }
                };
                uvs.extend_from_slice(&uv.to_array());

                if raw.has_colors() {
                    let color = match lookup(&raw.colors, &raw.color_faces, face_index, k, vertex) {
                        Lookup::Found(c) => c,
                        Lookup::Missing => Vec4::ONE,
                        Lookup::OutOfRange(index) => {
                            return Err(out_of_range(Channel::Color, index, raw.colors.len()))
                        }
                    };
                    colors.extend_from_slice(&color.to_array());
                }
            }
        }

        let used = || {
            raw.positions
                .iter()
                .zip(referenced.iter())
                .filter(|(_, used)| **used)
                .map(|(p, _)| *p)
        };
        let vertex_count = referenced.iter().filter(|used| **used).count();
        let bounds = Aabb::from_points(used());
        let sphere = BoundingSphere::from_points(used());

        log::debug!(
            "Converted '{}' from {}: {} vertices, {} faces",
            raw.name,
            raw.source,
            vertex_count,
            face_count
        );

        Ok(Self {
            name: raw.name.clone(),
            vertex_count,
            face_count,
            positions,
            normals,
            uvs,
            colors,
            bounds,
            sphere,
            handle: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of distinct vertices the faces reference.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Number of triangles.
    pub fn face_count(&self) -> usize {
        self.face_count
    }

    /// Number of entries in each per-face-vertex stream (3 per face).
    pub fn corner_count(&self) -> usize {
        self.face_count * 3
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn uvs(&self) -> &[f32] {
        &self.uvs
    }

    /// RGBA per face-vertex; empty when the model had no vertex colours.
    pub fn colors(&self) -> &[f32] {
        &self.colors
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }

    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    pub fn uv_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.uvs)
    }

    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }

    /// Position, normal and uv streams interleaved into one vertex array.
    pub fn interleaved(&self) -> Vec<MeshVertex> {
        (0..self.corner_count())
            .map(|i| MeshVertex {
                position: [
                    self.positions[i * 3],
                    self.positions[i * 3 + 1],
                    self.positions[i * 3 + 2],
                ],
                normal: [
                    self.normals[i * 3],
                    self.normals[i * 3 + 1],
                    self.normals[i * 3 + 2],
                ],
                uv: [self.uvs[i * 2], self.uvs[i * 2 + 1]],
            })
            .collect()
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn bounding_sphere(&self) -> &BoundingSphere {
        &self.sphere
    }

    /// Attach renderer buffers. A previously attached handle is released first.
    pub fn attach_handle(&mut self, handle: Box<dyn GpuHandle>) {
        self.release();
        self.handle = Some(handle);
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Release the attached renderer buffers, if any.
    pub fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }
    }
}

impl Resource for Mesh {
    const NAMESPACE: Namespace = Namespace::Geometry;

    fn teardown(&mut self) {
        self.release();
    }
}

enum Lookup<T> {
    Found(T),
    Missing,
    OutOfRange(usize),
}

/// Resolve a per-corner value: through the per-face index table when there is
/// one, otherwise through the position index.
fn lookup<T: Copy>(pool: &[T], faces: &[[u32; 3]], face: usize, corner: usize, vertex: usize) -> Lookup<T> {
    if pool.is_empty() {
        return Lookup::Missing;
    }
    let index = match faces.get(face) {
        Some(f) => f[corner] as usize,
        None => vertex,
    };
    match pool.get(index) {
        Some(value) => Lookup::Found(*value),
        None => Lookup::OutOfRange(index),
    }
}
