//! Wavefront `.obj` decoder.
//!
//! One record per line, classified by its first token. Face corners are
//! `v`, `v/vt`, `v//vn` or `v/vt/vn`, 1-based or negative (relative to the
//! end of the pool). Polygons are fan-triangulated.
//!
//! Normals and texture coordinates keep their own pools and are addressed
//! through per-face index triples, so one position can carry a different
//! normal on each face that uses it. Faces without texture coordinates or
//! normals point at a zero entry appended to the pool.

use ilo_math::{Vec2, Vec3};

use crate::cursor::{Line, LineCursor};
use crate::error::AssetResult;
use crate::raw::RawModel;

/// Record classes recognized by their first token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Record {
    Comment,
    Vertex,
    Normal,
    TexCoord,
    Face,
    Object,
    Other,
}

impl Record {
    fn classify(keyword: &str) -> Self {
        match keyword {
            k if k.starts_with('#') => Record::Comment,
            "v" => Record::Vertex,
            "vn" => Record::Normal,
            "vt" => Record::TexCoord,
            "f" => Record::Face,
            "o" => Record::Object,
            _ => Record::Other,
        }
    }
}

/// One resolved face corner, all indices 0-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Corner {
    position: u32,
    uv: Option<u32>,
    normal: Option<u32>,
}

/// Object under construction. Corner indices into the shared uv and normal
/// pools stay unresolved until the whole file is read.
struct ObjObject {
    model: RawModel,
    uv_corners: Vec<[Option<u32>; 3]>,
    normal_corners: Vec<[Option<u32>; 3]>,
}

impl ObjObject {
    fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        ObjObject {
            model: RawModel::new(name, source),
            uv_corners: Vec::new(),
            normal_corners: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.model.is_empty()
    }

    fn into_model(self, positions: &[Vec3], uvs: &[Vec2], normals: &[Vec3]) -> RawModel {
        let mut model = self.model;
        model.positions = positions.to_vec();
        if let Some((pool, faces)) = resolve_corners(&self.uv_corners, uvs, Vec2::ZERO) {
            model.uvs = pool;
            model.uv_faces = faces;
        }
        // A zero normal makes the converter fall back to the face normal
        if let Some((pool, faces)) = resolve_corners(&self.normal_corners, normals, Vec3::ZERO) {
            model.normals = pool;
            model.normal_faces = faces;
        }
        model
    }
}

/// Build a pool and face table from per-corner indices. Corners without an
/// index point at `fallback`, appended after the pool only when needed.
/// Returns `None` when no corner carries an index.
fn resolve_corners<T: Copy>(
    corners: &[[Option<u32>; 3]],
    pool: &[T],
    fallback: T,
) -> Option<(Vec<T>, Vec<[u32; 3]>)> {
    if corners.iter().flatten().all(Option::is_none) {
        return None;
    }

    let mut pool = pool.to_vec();
    let missing = pool.len() as u32;
    if corners.iter().flatten().any(Option::is_none) {
        pool.push(fallback);
    }
    let faces = corners
        .iter()
        .map(|corner| corner.map(|index| index.unwrap_or(missing)))
        .collect();
    Some((pool, faces))
}

struct ObjDecoder {
    cursor: LineCursor,
    positions: Vec<Vec3>,
    normal_pool: Vec<Vec3>,
    uvs: Vec<Vec2>,
    objects: Vec<ObjObject>,
    current: ObjObject,
}

/// Decode OBJ text. `default_name` names faces that appear before any `o`.
pub fn decode(content: &str, source_name: &str, default_name: &str) -> AssetResult<Vec<RawModel>> {
    let mut decoder = ObjDecoder {
        cursor: LineCursor::new(content, source_name),
        positions: Vec::new(),
        normal_pool: Vec::new(),
        uvs: Vec::new(),
        objects: Vec::new(),
        current: ObjObject::new(default_name, source_name),
    };
    decoder.parse()?;
    let models = decoder.finish();

    log::info!("Decoded {} object(s) from {}", models.len(), source_name);
    Ok(models)
}

impl ObjDecoder {
    fn parse(&mut self) -> AssetResult<()> {
        while let Some(line) = self.cursor.advance() {
            match Record::classify(line.keyword()) {
                Record::Comment | Record::Other => {}
                Record::Vertex => {
                    let [x, y, z] = self.cursor.parse_tokens::<f32, 3>(&line, 1)?;
                    self.positions.push(Vec3::new(x, y, z));
                }
                Record::Normal => {
                    let [x, y, z] = self.cursor.parse_tokens::<f32, 3>(&line, 1)?;
                    self.normal_pool.push(Vec3::new(x, y, z));
                }
                Record::TexCoord => {
                    // v is optional and defaults to 0
                    let u = self.cursor.parse_token::<f32>(&line, 1)?;
                    let v = match line.token(2) {
                        Some(_) => self.cursor.parse_token::<f32>(&line, 2)?,
                        None => 0.0,
                    };
                    self.uvs.push(Vec2::new(u, v));
                }
                Record::Face => self.parse_face(&line)?,
                Record::Object => {
                    let name = line.text[1..].trim();
                    let name = if name.is_empty() {
                        format!("object_{}", self.objects.len() + 1)
                    } else {
                        name.to_string()
                    };
                    self.start_object(name);
                }
            }
        }
        Ok(())
    }

    fn start_object(&mut self, name: String) {
        let source = self.current.model.source.clone();
        let previous = std::mem::replace(&mut self.current, ObjObject::new(name, source));
        if !previous.is_empty() {
            self.objects.push(previous);
        }
    }

    fn parse_face(&mut self, line: &Line) -> AssetResult<()> {
        let corners = line.tokens[1..]
            .iter()
            .map(|token| self.parse_corner(line, token))
            .collect::<AssetResult<Vec<Corner>>>()?;

        if corners.len() < 3 {
            return Err(self.cursor.malformed(
                line,
                format!("face needs at least 3 corners, found {}", corners.len()),
            ));
        }
        let with_uv = corners.iter().filter(|c| c.uv.is_some()).count();
        if with_uv != 0 && with_uv != corners.len() {
            return Err(self
                .cursor
                .malformed(line, "face mixes corners with and without texture coordinates"));
        }

        // Fan triangulation around the first corner
        for i in 1..corners.len() - 1 {
            let (a, b, c) = (corners[0], corners[i], corners[i + 1]);
            self.current.model.faces.push([a.position, b.position, c.position]);
            self.current.uv_corners.push([a.uv, b.uv, c.uv]);
            self.current.normal_corners.push([a.normal, b.normal, c.normal]);
        }
        Ok(())
    }

    fn parse_corner(&self, line: &Line, token: &str) -> AssetResult<Corner> {
        let mut parts = token.split('/');
        let position = parts.next().unwrap_or("");
        let uv = parts.next().filter(|s| !s.is_empty());
        let normal = parts.next().filter(|s| !s.is_empty());
        if parts.next().is_some() {
            return Err(self
                .cursor
                .malformed(line, format!("face corner '{token}' has too many fields")));
        }

        Ok(Corner {
            position: self.resolve(line, position, self.positions.len(), "vertex")?,
            uv: uv
                .map(|s| self.resolve(line, s, self.uvs.len(), "texture coordinate"))
                .transpose()?,
            normal: normal
                .map(|s| self.resolve(line, s, self.normal_pool.len(), "normal"))
                .transpose()?,
        })
    }

    /// Turn a 1-based or negative index into a 0-based one against a pool of
    /// `len` entries read so far.
    fn resolve(&self, line: &Line, token: &str, len: usize, what: &str) -> AssetResult<u32> {
        let raw: i64 = token.parse().map_err(|_| {
            self.cursor
                .malformed(line, format!("invalid {what} index '{token}'"))
        })?;

        let index = match raw {
            0 => None,
            r if r > 0 => Some(r - 1),
            r => Some(len as i64 + r),
        }
        .filter(|i| *i >= 0 && (*i as usize) < len)
        .ok_or_else(|| {
            self.cursor.malformed(
                line,
                format!("{what} index {raw} does not refer to one of the {len} defined so far"),
            )
        })?;

        Ok(index as u32)
    }

    /// Close the current object and attach the shared pools to every model.
    fn finish(mut self) -> Vec<RawModel> {
        let last = std::mem::replace(&mut self.current, ObjObject::new("", ""));
        if !last.is_empty() || self.objects.is_empty() {
            self.objects.push(last);
        }

        let (positions, uvs, normals) = (&self.positions, &self.uvs, &self.normal_pool);
        self.objects
            .into_iter()
            .map(|object| {
                let model = object.into_model(positions, uvs, normals);
                log::debug!(
                    "Object '{}': {} faces over {} shared vertices",
                    model.name,
                    model.faces.len(),
                    model.positions.len()
                );
                model
            })
            .collect()
    }
}
