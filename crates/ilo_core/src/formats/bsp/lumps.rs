//! Quake 3 BSP lump records.
//!
//! All records are little-endian and fixed size except the entity text and
//! the visibility data.

use ilo_math::{Vec2, Vec3};

use crate::cursor::ByteCursor;
use crate::error::AssetResult;

/// Directory slots, in file order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LumpKind {
    Entities,
    Textures,
    Planes,
    Nodes,
    Leafs,
    Leaffaces,
    Leafbrushes,
    Models,
    Brushes,
    Brushsides,
    Vertexes,
    Meshverts,
    Effects,
    Faces,
    Lightmaps,
    Lightvols,
    Visdata,
}

impl LumpKind {
    pub const COUNT: usize = 17;

    pub const ALL: [LumpKind; 17] = [
        LumpKind::Entities,
        LumpKind::Textures,
        LumpKind::Planes,
        LumpKind::Nodes,
        LumpKind::Leafs,
        LumpKind::Leaffaces,
        LumpKind::Leafbrushes,
        LumpKind::Models,
        LumpKind::Brushes,
        LumpKind::Brushsides,
        LumpKind::Vertexes,
        LumpKind::Meshverts,
        LumpKind::Effects,
        LumpKind::Faces,
        LumpKind::Lightmaps,
        LumpKind::Lightvols,
        LumpKind::Visdata,
    ];

    /// Byte size of one record, `None` for the variable-length lumps.
    pub fn record_size(self) -> Option<usize> {
        match self {
            LumpKind::Entities | LumpKind::Visdata => None,
            LumpKind::Textures => Some(72),
            LumpKind::Planes => Some(16),
            LumpKind::Nodes => Some(36),
            LumpKind::Leafs => Some(48),
            LumpKind::Leaffaces => Some(4),
            LumpKind::Leafbrushes => Some(4),
            LumpKind::Models => Some(40),
            LumpKind::Brushes => Some(12),
            LumpKind::Brushsides => Some(8),
            LumpKind::Vertexes => Some(44),
            LumpKind::Meshverts => Some(4),
            LumpKind::Effects => Some(72),
            LumpKind::Faces => Some(104),
            LumpKind::Lightmaps => Some(LIGHTMAP_BYTES),
            LumpKind::Lightvols => Some(8),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LumpKind::Entities => "entities",
            LumpKind::Textures => "textures",
            LumpKind::Planes => "planes",
            LumpKind::Nodes => "nodes",
            LumpKind::Leafs => "leafs",
            LumpKind::Leaffaces => "leaffaces",
            LumpKind::Leafbrushes => "leafbrushes",
            LumpKind::Models => "models",
            LumpKind::Brushes => "brushes",
            LumpKind::Brushsides => "brushsides",
            LumpKind::Vertexes => "vertexes",
            LumpKind::Meshverts => "meshverts",
            LumpKind::Effects => "effects",
            LumpKind::Faces => "faces",
            LumpKind::Lightmaps => "lightmaps",
            LumpKind::Lightvols => "lightvols",
            LumpKind::Visdata => "visdata",
        }
    }
}

/// 128 x 128 RGB
pub const LIGHTMAP_BYTES: usize = 128 * 128 * 3;

/// A decoded lump record.
pub trait LumpRecord: Sized {
    const KIND: LumpKind;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextureInfo {
    pub name: String,
    pub flags: i32,
    pub contents: i32,
}

impl LumpRecord for TextureInfo {
    const KIND: LumpKind = LumpKind::Textures;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        Ok(Self {
            name: cursor.read_fixed_str(64)?,
            flags: cursor.read_i32()?,
            contents: cursor.read_i32()?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl LumpRecord for Plane {
    const KIND: LumpKind = LumpKind::Planes;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        Ok(Self {
            normal: Vec3::from_array(cursor.read_vec3()?),
            distance: cursor.read_f32()?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub plane: i32,
    /// Positive values are node indices, negative are `-(leaf + 1)`
    pub children: [i32; 2],
    pub mins: [i32; 3],
    pub maxs: [i32; 3],
}

fn read_i32s<const N: usize>(cursor: &mut ByteCursor<'_>) -> AssetResult<[i32; N]> {
    let mut out = [0i32; N];
    for slot in out.iter_mut() {
        *slot = cursor.read_i32()?;
    }
    Ok(out)
}

impl LumpRecord for Node {
    const KIND: LumpKind = LumpKind::Nodes;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        Ok(Self {
            plane: cursor.read_i32()?,
            children: read_i32s(cursor)?,
            mins: read_i32s(cursor)?,
            maxs: read_i32s(cursor)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Leaf {
    pub cluster: i32,
    pub area: i32,
    pub mins: [i32; 3],
    pub maxs: [i32; 3],
    pub leafface: i32,
    pub n_leaffaces: i32,
    pub leafbrush: i32,
    pub n_leafbrushes: i32,
}

impl LumpRecord for Leaf {
    const KIND: LumpKind = LumpKind::Leafs;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        Ok(Self {
            cluster: cursor.read_i32()?,
            area: cursor.read_i32()?,
            mins: read_i32s(cursor)?,
            maxs: read_i32s(cursor)?,
            leafface: cursor.read_i32()?,
            n_leaffaces: cursor.read_i32()?,
            leafbrush: cursor.read_i32()?,
            n_leafbrushes: cursor.read_i32()?,
        })
    }
}

/// Face index referenced from a leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafFace(pub i32);

impl LumpRecord for LeafFace {
    const KIND: LumpKind = LumpKind::Leaffaces;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        Ok(Self(cursor.read_i32()?))
    }
}

/// Brush index referenced from a leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafBrush(pub i32);

impl LumpRecord for LeafBrush {
    const KIND: LumpKind = LumpKind::Leafbrushes;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        Ok(Self(cursor.read_i32()?))
    }
}

/// A rigid body of the level; model 0 is the static world.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub face: i32,
    pub n_faces: i32,
    pub brush: i32,
    pub n_brushes: i32,
}

impl LumpRecord for Model {
    const KIND: LumpKind = LumpKind::Models;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        Ok(Self {
            mins: Vec3::from_array(cursor.read_vec3()?),
            maxs: Vec3::from_array(cursor.read_vec3()?),
            face: cursor.read_i32()?,
            n_faces: cursor.read_i32()?,
            brush: cursor.read_i32()?,
            n_brushes: cursor.read_i32()?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Brush {
    pub brushside: i32,
    pub n_brushsides: i32,
    pub texture: i32,
}

impl LumpRecord for Brush {
    const KIND: LumpKind = LumpKind::Brushes;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        Ok(Self {
            brushside: cursor.read_i32()?,
            n_brushsides: cursor.read_i32()?,
            texture: cursor.read_i32()?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BrushSide {
    pub plane: i32,
    pub texture: i32,
}

impl LumpRecord for BrushSide {
    const KIND: LumpKind = LumpKind::Brushsides;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        Ok(Self {
            plane: cursor.read_i32()?,
            texture: cursor.read_i32()?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    /// Surface and lightmap coordinates
    pub texcoord: [Vec2; 2],
    pub normal: Vec3,
    pub color: [u8; 4],
}

impl LumpRecord for Vertex {
    const KIND: LumpKind = LumpKind::Vertexes;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        let position = Vec3::from_array(cursor.read_vec3()?);
        let surface = Vec2::new(cursor.read_f32()?, cursor.read_f32()?);
        let lightmap = Vec2::new(cursor.read_f32()?, cursor.read_f32()?);
        let normal = Vec3::from_array(cursor.read_vec3()?);
        let mut color = [0u8; 4];
        for c in color.iter_mut() {
            *c = cursor.read_u8()?;
        }
        Ok(Self {
            position,
            texcoord: [surface, lightmap],
            normal,
            color,
        })
    }
}

/// Vertex offset relative to a face's first vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshVert(pub i32);

impl LumpRecord for MeshVert {
    const KIND: LumpKind = LumpKind::Meshverts;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        Ok(Self(cursor.read_i32()?))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Effect {
    pub name: String,
    pub brush: i32,
    pub unknown: i32,
}

impl LumpRecord for Effect {
    const KIND: LumpKind = LumpKind::Effects;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        Ok(Self {
            name: cursor.read_fixed_str(64)?,
            brush: cursor.read_i32()?,
            unknown: cursor.read_i32()?,
        })
    }
}

/// Surface type of a face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceKind {
    Polygon,
    Patch,
    Mesh,
    Billboard,
    Unknown(i32),
}

impl From<i32> for FaceKind {
    fn from(value: i32) -> Self {
        match value {
            1 => FaceKind::Polygon,
            2 => FaceKind::Patch,
            3 => FaceKind::Mesh,
            4 => FaceKind::Billboard,
            other => FaceKind::Unknown(other),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Face {
    pub texture: i32,
    pub effect: i32,
    pub kind: FaceKind,
    pub vertex: i32,
    pub n_vertexes: i32,
    pub meshvert: i32,
    pub n_meshverts: i32,
    pub lm_index: i32,
    pub lm_start: [i32; 2],
    pub lm_size: [i32; 2],
    pub lm_origin: Vec3,
    pub lm_vecs: [Vec3; 2],
    pub normal: Vec3,
    /// Patch control grid dimensions
    pub size: [i32; 2],
}

impl LumpRecord for Face {
    const KIND: LumpKind = LumpKind::Faces;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        Ok(Self {
            texture: cursor.read_i32()?,
            effect: cursor.read_i32()?,
            kind: FaceKind::from(cursor.read_i32()?),
            vertex: cursor.read_i32()?,
            n_vertexes: cursor.read_i32()?,
            meshvert: cursor.read_i32()?,
            n_meshverts: cursor.read_i32()?,
            lm_index: cursor.read_i32()?,
            lm_start: read_i32s(cursor)?,
            lm_size: read_i32s(cursor)?,
            lm_origin: Vec3::from_array(cursor.read_vec3()?),
            lm_vecs: [
                Vec3::from_array(cursor.read_vec3()?),
                Vec3::from_array(cursor.read_vec3()?),
            ],
            normal: Vec3::from_array(cursor.read_vec3()?),
            size: read_i32s(cursor)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Lightmap {
    /// `LIGHTMAP_BYTES` of packed RGB
    pub rgb: Vec<u8>,
}

impl LumpRecord for Lightmap {
    const KIND: LumpKind = LumpKind::Lightmaps;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        Ok(Self {
            rgb: cursor.take(LIGHTMAP_BYTES)?.to_vec(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LightVol {
    pub ambient: [u8; 3],
    pub directional: [u8; 3],
    /// Spherical direction to the light (phi, theta)
    pub direction: [u8; 2],
}

impl LumpRecord for LightVol {
    const KIND: LumpKind = LumpKind::Lightvols;

    fn read(cursor: &mut ByteCursor<'_>) -> AssetResult<Self> {
        let b = cursor.take(8)?;
        Ok(Self {
            ambient: [b[0], b[1], b[2]],
            directional: [b[3], b[4], b[5]],
            direction: [b[6], b[7]],
        })
    }
}

/// Cluster-to-cluster visibility bit vectors, kept opaque.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisData {
    pub n_vecs: i32,
    pub sz_vecs: i32,
    pub vecs: Vec<u8>,
}

impl VisData {
    /// Whether `to` is potentially visible from `from`.
    pub fn is_visible(&self, from: i32, to: i32) -> bool {
        if from < 0 || to < 0 || from >= self.n_vecs {
            return true;
        }
        let byte = (from * self.sz_vecs + to / 8) as usize;
        self.vecs
            .get(byte)
            .map(|b| b & (1 << (to % 8)) != 0)
            .unwrap_or(false)
    }
}
