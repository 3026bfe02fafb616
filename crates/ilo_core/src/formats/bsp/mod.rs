//! Quake 3 BSP (`.bsp`) level decoder.
//!
//! ```text
//! BSP File Structure:
//! ├── "IBSP" (4 bytes) - Magic number
//! ├── Version (4 bytes) - 46 (Quake 3) or 47 (Quake Live)
//! ├── Directory (17 x (offset, length), file-absolute)
//! └── Lumps, located through the directory
//! ```
//!
//! Fixed-size lumps must be an exact multiple of their record size. The
//! visibility lump is `n_vecs`, `sz_vecs` followed by `n_vecs * sz_vecs`
//! bytes of bit vectors.
//!
//! Geometry comes out as one `RawModel` per entry of the models lump;
//! `model_0` is the static world.

pub mod lumps;

use std::collections::HashMap;

use ilo_math::Vec4;

use crate::cursor::ByteCursor;
use crate::error::{AssetError, AssetResult, Channel, Location};
use crate::raw::RawModel;
use lumps::*;

/// BSP file magic number.
pub const BSP_MAGIC: [u8; 4] = *b"IBSP";

/// Accepted BSP versions.
pub const BSP_VERSIONS: [i32; 2] = [46, 47];

const HEADER_BYTES: usize = 8;
const DIRECTORY_BYTES: usize = LumpKind::COUNT * 8;

/// Location of one lump inside the file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LumpEntry {
    pub offset: usize,
    pub length: usize,
}

/// Every lump of a decoded level.
#[derive(Clone, Debug, Default)]
pub struct BspLevel {
    pub version: i32,
    pub entities: String,
    pub textures: Vec<TextureInfo>,
    pub planes: Vec<Plane>,
    pub nodes: Vec<Node>,
    pub leafs: Vec<Leaf>,
    pub leaffaces: Vec<LeafFace>,
    pub leafbrushes: Vec<LeafBrush>,
    pub models: Vec<Model>,
    pub brushes: Vec<Brush>,
    pub brushsides: Vec<BrushSide>,
    pub vertexes: Vec<Vertex>,
    pub meshverts: Vec<MeshVert>,
    pub effects: Vec<Effect>,
    pub faces: Vec<Face>,
    pub lightmaps: Vec<Lightmap>,
    pub lightvols: Vec<LightVol>,
    /// `None` when the level has no visibility lump
    pub visdata: Option<VisData>,
}

/// Decode a level and extract its geometry.
pub fn decode(bytes: &[u8], source_name: &str) -> AssetResult<Vec<RawModel>> {
    let level = decode_level(bytes, source_name)?;
    let models = extract_models(&level, source_name)?;

    log::info!(
        "Decoded {} model(s) from {} (BSP v{}, {} faces, {} vertexes)",
        models.len(),
        source_name,
        level.version,
        level.faces.len(),
        level.vertexes.len()
    );
    Ok(models)
}

/// Decode every lump of a level.
pub fn decode_level(bytes: &[u8], source_name: &str) -> AssetResult<BspLevel> {
    if bytes.len() < HEADER_BYTES + DIRECTORY_BYTES {
        return Err(AssetError::unsupported(
            source_name,
            format!(
                "{} bytes is too short for a BSP header and directory",
                bytes.len()
            ),
        ));
    }

    let mut cursor = ByteCursor::new(bytes, source_name);

    let magic = cursor.take(4)?;
    if magic != BSP_MAGIC {
        return Err(AssetError::unsupported(
            source_name,
            format!("bad magic {:?}, expected \"IBSP\"", String::from_utf8_lossy(magic)),
        ));
    }
    let version = cursor.read_i32()?;
    if !BSP_VERSIONS.contains(&version) {
        return Err(AssetError::unsupported(
            source_name,
            format!("BSP version {version} (expected 46 or 47)"),
        ));
    }

    let directory = read_directory(&mut cursor)?;
    let entry = |kind: LumpKind| directory[kind as usize];

    let entities = {
        let e = entry(LumpKind::Entities);
        cursor.seek_absolute(e.offset)?;
        let raw = cursor.take(e.length)?;
        String::from_utf8_lossy(raw).trim_end_matches('\0').to_string()
    };

    let level = BspLevel {
        version,
        entities,
        textures: read_lump(&mut cursor, entry(LumpKind::Textures))?,
        planes: read_lump(&mut cursor, entry(LumpKind::Planes))?,
        nodes: read_lump(&mut cursor, entry(LumpKind::Nodes))?,
        leafs: read_lump(&mut cursor, entry(LumpKind::Leafs))?,
        leaffaces: read_lump(&mut cursor, entry(LumpKind::Leaffaces))?,
        leafbrushes: read_lump(&mut cursor, entry(LumpKind::Leafbrushes))?,
        models: read_lump(&mut cursor, entry(LumpKind::Models))?,
        brushes: read_lump(&mut cursor, entry(LumpKind::Brushes))?,
        brushsides: read_lump(&mut cursor, entry(LumpKind::Brushsides))?,
        vertexes: read_lump(&mut cursor, entry(LumpKind::Vertexes))?,
        meshverts: read_lump(&mut cursor, entry(LumpKind::Meshverts))?,
        effects: read_lump(&mut cursor, entry(LumpKind::Effects))?,
        faces: read_lump(&mut cursor, entry(LumpKind::Faces))?,
        lightmaps: read_lump(&mut cursor, entry(LumpKind::Lightmaps))?,
        lightvols: read_lump(&mut cursor, entry(LumpKind::Lightvols))?,
        visdata: read_visdata(&mut cursor, entry(LumpKind::Visdata))?,
    };

    Ok(level)
}

fn read_directory(cursor: &mut ByteCursor<'_>) -> AssetResult<[LumpEntry; LumpKind::COUNT]> {
    let mut directory = [LumpEntry::default(); LumpKind::COUNT];
    let file_len = cursor.len();

    for (slot, kind) in directory.iter_mut().zip(LumpKind::ALL) {
        let at = cursor.position();
        let offset = cursor.read_i32()?;
        let length = cursor.read_i32()?;

        let in_bounds = offset >= 0
            && length >= 0
            && (offset as usize)
                .checked_add(length as usize)
                .is_some_and(|end| end <= file_len);
        if !in_bounds {
            return Err(AssetError::malformed(
                cursor.source_name(),
                Location::Offset(at as u64),
                format!(
                    "{} lump (offset {offset}, length {length}) lies outside the {file_len}-byte file",
                    kind.name()
                ),
            ));
        }

        *slot = LumpEntry {
            offset: offset as usize,
            length: length as usize,
        };
    }

    Ok(directory)
}

/// Read a fixed-size lump. Its length must be a whole number of records.
fn read_lump<R: LumpRecord>(cursor: &mut ByteCursor<'_>, entry: LumpEntry) -> AssetResult<Vec<R>> {
    let kind = R::KIND;
    let size = kind.record_size().unwrap_or(1);

    if entry.length % size != 0 {
        return Err(AssetError::malformed(
            cursor.source_name(),
            Location::Offset(entry.offset as u64),
            format!(
                "{} lump length {} is not a multiple of its {}-byte record size",
                kind.name(),
                entry.length,
                size
            ),
        ));
    }

    let count = entry.length / size;
    cursor.seek_absolute(entry.offset)?;
    let records = (0..count)
        .map(|_| R::read(cursor))
        .collect::<AssetResult<Vec<R>>>()?;

    log::debug!("Read {} {} record(s)", records.len(), kind.name());
    Ok(records)
}

fn read_visdata(cursor: &mut ByteCursor<'_>, entry: LumpEntry) -> AssetResult<Option<VisData>> {
    if entry.length == 0 {
        return Ok(None);
    }

    let malformed = |message: String| {
        AssetError::malformed(cursor.source_name(), Location::Offset(entry.offset as u64), message)
    };

    if entry.length < 8 {
        return Err(malformed(format!(
            "visdata lump length {} is shorter than its 8-byte header",
            entry.length
        )));
    }

    cursor.seek_absolute(entry.offset)?;
    let n_vecs = cursor.read_i32()?;
    let sz_vecs = cursor.read_i32()?;

    let wanted = usize::try_from(n_vecs)
        .ok()
        .zip(usize::try_from(sz_vecs).ok())
        .and_then(|(n, sz)| n.checked_mul(sz))
        .ok_or_else(|| {
            AssetError::malformed(
                cursor.source_name(),
                Location::Offset(entry.offset as u64),
                format!("invalid visdata dimensions {n_vecs} x {sz_vecs}"),
            )
        })?;

    let available = entry.length - 8;
    if wanted > available {
        return Err(AssetError::malformed(
            cursor.source_name(),
            Location::Offset(entry.offset as u64),
            format!("visdata declares {wanted} bytes but the lump holds {available}"),
        ));
    }
    if wanted < available {
        log::debug!("Ignoring {} trailing visdata byte(s)", available - wanted);
    }

    let vecs = cursor.take(wanted)?.to_vec();
    Ok(Some(VisData {
        n_vecs,
        sz_vecs,
        vecs,
    }))
}

/// Turn each BSP model into a `RawModel` with its own compacted vertex list.
pub fn extract_models(level: &BspLevel, source_name: &str) -> AssetResult<Vec<RawModel>> {
    level
        .models
        .iter()
        .enumerate()
        .map(|(index, model)| extract_model(level, index, model, source_name))
        .collect()
}

fn extract_model(level: &BspLevel, index: usize, model: &Model, source_name: &str) -> AssetResult<RawModel> {
    let mut raw = RawModel::new(format!("model_{index}"), source_name);

    let out_of_range = |lump: &'static str, bad: i64, len: usize| AssetError::IndexOutOfRange {
        source_name: source_name.to_string(),
        model: format!("model_{index}"),
        channel: Channel::Lump(lump),
        index: bad.max(0) as usize,
        len,
    };

    let faces = range(model.face, model.n_faces, level.faces.len())
        .ok_or_else(|| out_of_range("faces", model.face as i64 + model.n_faces as i64, level.faces.len()))?;

    // Level vertex index -> index in this model
    let mut remap: HashMap<usize, u32> = HashMap::new();
    let mut skipped = 0usize;

    for face in &level.faces[faces] {
        match face.kind {
            FaceKind::Polygon | FaceKind::Mesh => {}
            _ => {
                skipped += 1;
                continue;
            }
        }

        let meshverts = range(face.meshvert, face.n_meshverts, level.meshverts.len()).ok_or_else(|| {
            out_of_range(
                "meshverts",
                face.meshvert as i64 + face.n_meshverts as i64,
                level.meshverts.len(),
            )
        })?;

        let offsets = &level.meshverts[meshverts];
        if offsets.len() % 3 != 0 {
            log::debug!(
                "Face with {} meshverts in {}; dropping the incomplete triangle",
                offsets.len(),
                source_name
            );
        }

        for tri in offsets.chunks_exact(3) {
            let mut corners = [0u32; 3];
            for (corner, offset) in corners.iter_mut().zip(tri) {
                let global = face.vertex as i64 + offset.0 as i64;
                if global < 0 || global as usize >= level.vertexes.len() {
                    return Err(out_of_range("vertexes", global, level.vertexes.len()));
                }
                let global = global as usize;

                *corner = match remap.get(&global) {
                    Some(local) => *local,
                    None => {
                        let local = raw.positions.len() as u32;
                        let vertex = &level.vertexes[global];
                        raw.positions.push(vertex.position);
                        raw.normals.push(vertex.normal);
                        raw.uvs.push(vertex.texcoord[0]);
                        let [r, g, b, a] = vertex.color;
                        raw.colors.push(Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0);
                        remap.insert(global, local);
                        local
                    }
                };
            }
            raw.faces.push(corners);
        }
    }

    if skipped > 0 {
        log::debug!("{}: skipped {} patch/billboard face(s)", raw.name, skipped);
    }
    Ok(raw)
}

/// `first..first + count` when it lies within `len`.
fn range(first: i32, count: i32, len: usize) -> Option<std::ops::Range<usize>> {
    if first < 0 || count < 0 {
        return None;
    }
    let start = first as usize;
    let end = start.checked_add(count as usize)?;
    (end <= len).then_some(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ilo_math::Vec3;

    /// Assembles a BSP file from raw lump payloads.
    #[derive(Default)]
    struct BspWriter {
        lumps: [Vec<u8>; LumpKind::COUNT],
        version: i32,
    }

    impl BspWriter {
        fn new() -> Self {
            Self {
                version: 46,
                ..Default::default()
            }
        }

        fn lump(&mut self, kind: LumpKind) -> &mut Vec<u8> {
            &mut self.lumps[kind as usize]
        }

        fn i32s(&mut self, kind: LumpKind, values: &[i32]) {
            for v in values {
                self.lump(kind).extend_from_slice(&v.to_le_bytes());
            }
        }

        fn f32s(&mut self, kind: LumpKind, values: &[f32]) {
            for v in values {
                self.lump(kind).extend_from_slice(&v.to_le_bytes());
            }
        }

        fn vertex(&mut self, pos: [f32; 3], uv: [f32; 2], color: [u8; 4]) {
            self.f32s(LumpKind::Vertexes, &pos);
            self.f32s(LumpKind::Vertexes, &[uv[0], uv[1], 0.0, 0.0]);
            self.f32s(LumpKind::Vertexes, &[0.0, 0.0, 1.0]);
            self.lump(LumpKind::Vertexes).extend_from_slice(&color);
        }

        fn face(&mut self, kind: i32, vertex: i32, n_vertexes: i32, meshvert: i32, n_meshverts: i32) {
            self.i32s(LumpKind::Faces, &[0, -1, kind, vertex, n_vertexes, meshvert, n_meshverts, -1]);
            self.i32s(LumpKind::Faces, &[0, 0, 0, 0]);
            self.f32s(LumpKind::Faces, &[0.0; 12]);
            self.i32s(LumpKind::Faces, &[0, 0]);
        }

        fn model(&mut self, face: i32, n_faces: i32) {
            self.f32s(LumpKind::Models, &[0.0; 6]);
            self.i32s(LumpKind::Models, &[face, n_faces, 0, 0]);
        }

        fn build(&self) -> Vec<u8> {
            let mut out = Vec::new();
            out.extend_from_slice(&BSP_MAGIC);
            out.extend_from_slice(&self.version.to_le_bytes());

            let mut offset = HEADER_BYTES + DIRECTORY_BYTES;
            for lump in &self.lumps {
                out.extend_from_slice(&(offset as i32).to_le_bytes());
                out.extend_from_slice(&(lump.len() as i32).to_le_bytes());
                offset += lump.len();
            }
            for lump in &self.lumps {
                out.extend_from_slice(lump);
            }
            out
        }
    }

    /// A square (two triangles via meshverts), a patch face, and a second
    /// model with one triangle.
    fn sample_level() -> BspWriter {
        let mut w = BspWriter::new();
        w.lump(LumpKind::Entities).extend_from_slice(b"{ \"classname\" \"worldspawn\" }\0");

        w.lump(LumpKind::Textures).extend_from_slice(&[0u8; 64]);
        w.i32s(LumpKind::Textures, &[0, 1]);

        w.vertex([0.0, 0.0, 0.0], [0.0, 0.0], [255, 0, 0, 255]);
        w.vertex([1.0, 0.0, 0.0], [1.0, 0.0], [255, 0, 0, 255]);
        w.vertex([1.0, 1.0, 0.0], [1.0, 1.0], [255, 0, 0, 255]);
        w.vertex([0.0, 1.0, 0.0], [0.0, 1.0], [255, 0, 0, 255]);
        w.vertex([5.0, 5.0, 5.0], [0.0, 0.0], [0, 255, 0, 255]);
        w.vertex([6.0, 5.0, 5.0], [0.0, 0.0], [0, 255, 0, 255]);
        w.vertex([5.0, 6.0, 5.0], [0.0, 0.0], [0, 255, 0, 255]);

        w.i32s(LumpKind::Meshverts, &[0, 1, 2, 0, 2, 3]);

        w.face(1, 0, 4, 0, 6);
        w.face(2, 0, 4, 0, 0);
        w.face(3, 4, 3, 0, 3);

        w.model(0, 2);
        w.model(2, 1);

        w.i32s(LumpKind::Visdata, &[2, 1]);
        w.lump(LumpKind::Visdata).extend_from_slice(&[0b11, 0b10]);
        w
    }

    #[test]
    fn test_decode_level_lumps() {
        let bytes = sample_level().build();
        let level = decode_level(&bytes, "t.bsp").unwrap();

        assert_eq!(level.version, 46);
        assert!(level.entities.contains("worldspawn"));
        assert_eq!(level.textures.len(), 1);
        assert_eq!(level.textures[0].contents, 1);
        assert_eq!(level.vertexes.len(), 7);
        assert_eq!(level.vertexes[2].position, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(level.faces.len(), 3);
        assert_eq!(level.faces[1].kind, FaceKind::Patch);
        assert_eq!(level.models.len(), 2);

        let vis = level.visdata.unwrap();
        assert_eq!((vis.n_vecs, vis.sz_vecs), (2, 1));
        assert_eq!(vis.vecs, vec![0b11, 0b10]);
    }

    #[test]
    fn test_extract_models() {
        let bytes = sample_level().build();
        let models = decode(&bytes, "t.bsp").unwrap();
        assert_eq!(models.len(), 2);

        let world = &models[0];
        assert_eq!(world.name, "model_0");
        assert_eq!(world.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(world.positions.len(), 4);
        assert_eq!(world.normals.len(), 4);
        assert_eq!(world.colors[0], Vec4::new(1.0, 0.0, 0.0, 1.0));

        // Second model's vertices are compacted to 0..3
        let door = &models[1];
        assert_eq!(door.faces, vec![[0, 1, 2]]);
        assert_eq!(door.positions[0], Vec3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_partial_record_is_malformed() {
        let mut w = sample_level();
        w.lump(LumpKind::Planes).extend_from_slice(&[0u8; 20]);
        let bytes = w.build();

        match decode_level(&bytes, "t.bsp").unwrap_err() {
            AssetError::MalformedRecord { message, location, .. } => {
                assert!(message.contains("planes"));
                assert!(matches!(location, Location::Offset(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_magic_and_version_are_unsupported() {
        let mut bytes = sample_level().build();
        bytes[0] = b'X';
        assert!(matches!(
            decode_level(&bytes, "t.bsp"),
            Err(AssetError::UnsupportedFormat { .. })
        ));

        let mut w = sample_level();
        w.version = 38;
        assert!(matches!(
            decode_level(&w.build(), "t.bsp"),
            Err(AssetError::UnsupportedFormat { .. })
        ));

        assert!(matches!(
            decode_level(b"IBSP", "t.bsp"),
            Err(AssetError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_directory_outside_file_is_malformed() {
        let mut bytes = sample_level().build();
        // Lengthen the textures entry past the end of the file
        let at = HEADER_BYTES + 8 + 4;
        bytes[at..at + 4].copy_from_slice(&1_000_000i32.to_le_bytes());

        match decode_level(&bytes, "t.bsp").unwrap_err() {
            AssetError::MalformedRecord { location, .. } => {
                assert_eq!(location, Location::Offset((HEADER_BYTES + 8) as u64));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_short_visdata_is_malformed() {
        let mut w = sample_level();
        w.lumps[LumpKind::Visdata as usize].clear();
        w.i32s(LumpKind::Visdata, &[4, 4]);
        w.lump(LumpKind::Visdata).extend_from_slice(&[0u8; 3]);

        assert!(matches!(
            decode_level(&w.build(), "t.bsp"),
            Err(AssetError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_empty_visdata_is_none() {
        let mut w = sample_level();
        w.lumps[LumpKind::Visdata as usize].clear();
        let level = decode_level(&w.build(), "t.bsp").unwrap();
        assert!(level.visdata.is_none());
    }

    #[test]
    fn test_meshvert_out_of_range() {
        let mut w = sample_level();
        w.lumps[LumpKind::Meshverts as usize].clear();
        w.i32s(LumpKind::Meshverts, &[0, 1, 40, 0, 2, 3]);

        assert!(matches!(
            decode(&w.build(), "t.bsp"),
            Err(AssetError::IndexOutOfRange {
                channel: Channel::Lump("vertexes"),
                ..
            })
        ));
    }
}
