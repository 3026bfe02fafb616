//! ASCII Scene Export (`.ase`) decoder.
//!
//! The format is line oriented: every record starts with a `*KEYWORD`, and a
//! line ending in `{` opens a block that runs to the matching `}`. Only
//! `*GEOMOBJECT` blocks produce geometry; everything else is skipped with
//! nesting respected.
//!
//! # Supported Records
//!
//! - `*NODE_NAME "name"`
//! - `*MESH_VERTEX i x y z`
//! - `*MESH_FACE i: A: a B: b C: c ...`
//! - `*MESH_TVERT i u v w` / `*MESH_TFACE i a b c`
//! - `*MESH_VERTCOL i r g b` / `*MESH_CFACE i a b c`
//! - `*MESH_FACENORMAL i x y z` / `*MESH_VERTEXNORMAL i x y z`
//!
//! Declared counts such as `*MESH_NUMVERTEX` are advisory; list blocks are
//! read until the first line that is not one of their records.

use ilo_math::{Vec2, Vec3, Vec4};

use crate::cursor::{Line, LineCursor};
use crate::error::{AssetError, AssetResult, Channel};
use crate::raw::RawModel;

/// Record lists inside a `*MESH` block. Each list accepts its own record
/// keywords and ends at the first line it does not accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MeshList {
    Vertices,
    Faces,
    VertexColors,
    ColorFaces,
    TexVertices,
    TexFaces,
    Normals,
}

impl MeshList {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "*MESH_VERTEX_LIST" => Some(MeshList::Vertices),
            "*MESH_FACE_LIST" => Some(MeshList::Faces),
            "*MESH_CVERTLIST" => Some(MeshList::VertexColors),
            "*MESH_CFACELIST" => Some(MeshList::ColorFaces),
            "*MESH_TVERTLIST" => Some(MeshList::TexVertices),
            "*MESH_TFACELIST" => Some(MeshList::TexFaces),
            "*MESH_NORMALS" => Some(MeshList::Normals),
            _ => None,
        }
    }

    fn accepts(self, keyword: &str) -> bool {
        match self {
            MeshList::Vertices => keyword == "*MESH_VERTEX",
            MeshList::Faces => keyword == "*MESH_FACE",
            MeshList::VertexColors => keyword == "*MESH_VERTCOL",
            MeshList::ColorFaces => keyword == "*MESH_CFACE",
            MeshList::TexVertices => keyword == "*MESH_TVERT",
            MeshList::TexFaces => keyword == "*MESH_TFACE",
            MeshList::Normals => keyword == "*MESH_FACENORMAL" || keyword == "*MESH_VERTEXNORMAL",
        }
    }
}

/// Geometry object under construction.
struct GeomObject {
    model: RawModel,
    /// Vertex normals in file order, applied by index once the object closes
    vertex_normals: Vec<(usize, Vec3)>,
}

struct AseDecoder {
    cursor: LineCursor,
    models: Vec<RawModel>,
}

/// Decode ASE text into one `RawModel` per geometry object.
pub fn decode(content: &str, source_name: &str) -> AssetResult<Vec<RawModel>> {
    let mut decoder = AseDecoder {
        cursor: LineCursor::new(content, source_name),
        models: Vec::new(),
    };
    decoder.parse()?;

    log::info!(
        "Decoded {} geometry object(s) from {}",
        decoder.models.len(),
        source_name
    );
    Ok(decoder.models)
}

impl AseDecoder {
    fn source_name(&self) -> String {
        self.cursor.source_name().to_string()
    }

    fn parse(&mut self) -> AssetResult<()> {
        match self.cursor.peek() {
            Some(line) if !line.keyword().starts_with('*') => {
                return Err(AssetError::unsupported(
                    self.source_name(),
                    format!("line {} does not start with a '*' keyword", line.number),
                ));
            }
            None => {
                return Err(AssetError::unsupported(self.source_name(), "file is empty"));
            }
            _ => {}
        }

        while let Some(line) = self.cursor.advance() {
            match line.keyword() {
                "*GEOMOBJECT" if line.opens_block() => {
                    let model = self.parse_geomobject(&line)?;
                    self.models.push(model);
                }
                "}" => return Err(self.cursor.malformed(&line, "unbalanced '}'")),
                keyword if keyword.starts_with('*') => {
                    if line.opens_block() {
                        log::debug!("Skipping block {} at line {}", keyword, line.number);
                        self.skip_block(&line)?;
                    }
                }
                _ => {
                    return Err(self
                        .cursor
                        .malformed(&line, format!("expected a '*' keyword, found '{}'", line.text)))
                }
            }
        }

        Ok(())
    }

    fn unclosed(&self, start: &Line) -> AssetError {
        self.cursor.malformed(
            start,
            format!("block '{}' is never closed", start.keyword()),
        )
    }

    /// Consume lines up to and including the `}` that closes `start`.
    fn skip_block(&mut self, start: &Line) -> AssetResult<()> {
        let mut depth = 1usize;
        while let Some(line) = self.cursor.advance() {
            if line.closes_block() {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            } else if line.opens_block() {
                depth += 1;
            }
        }
        Err(self.unclosed(start))
    }

    fn parse_geomobject(&mut self, start: &Line) -> AssetResult<RawModel> {
        let default_name = format!("object_{}", self.models.len());
        let mut object = GeomObject {
            model: RawModel::new(default_name, self.source_name()),
            vertex_normals: Vec::new(),
        };

        loop {
            let line = self.cursor.advance().ok_or_else(|| self.unclosed(start))?;
            match line.keyword() {
                "}" => break,
                "*NODE_NAME" => {
                    object.model.name = quoted(&line.text)
                        .ok_or_else(|| self.cursor.malformed(&line, "*NODE_NAME needs a quoted name"))?
                        .to_string();
                }
                "*MESH" if line.opens_block() => self.parse_mesh(&line, &mut object)?,
                keyword => {
                    if line.opens_block() {
                        log::debug!("Skipping block {} at line {}", keyword, line.number);
                        self.skip_block(&line)?;
                    }
                }
            }
        }

        self.finish_object(object)
    }

    fn parse_mesh(&mut self, start: &Line, object: &mut GeomObject) -> AssetResult<()> {
        loop {
            let line = self.cursor.advance().ok_or_else(|| self.unclosed(start))?;
            if line.closes_block() {
                return Ok(());
            }
            match MeshList::from_keyword(line.keyword()) {
                Some(list) if line.opens_block() => self.parse_list(&line, list, object)?,
                _ if line.opens_block() => {
                    log::debug!("Skipping block {} at line {}", line.keyword(), line.number);
                    self.skip_block(&line)?;
                }
                _ => {}
            }
        }
    }

    /// Read records while `list` accepts them, then consume the rest of the
    /// block.
    fn parse_list(&mut self, start: &Line, list: MeshList, object: &mut GeomObject) -> AssetResult<()> {
        loop {
            match self.cursor.peek() {
                Some(next) if list.accepts(next.keyword()) => {}
                _ => break,
            }
            let Some(line) = self.cursor.advance() else {
                break;
            };
            self.parse_record(&line, list, object)?;
        }

        if let Some(next) = self.cursor.peek() {
            if !next.closes_block() {
                log::debug!(
                    "Unexpected '{}' in {} at line {}, skipping to block end",
                    next.keyword(),
                    start.keyword(),
                    next.number
                );
            }
        }
        self.skip_block(start)
    }

    fn parse_record(&self, line: &Line, list: MeshList, object: &mut GeomObject) -> AssetResult<()> {
        let cursor = &self.cursor;
        let model = &mut object.model;

        match list {
            MeshList::Vertices => {
                let [x, y, z] = cursor.parse_tokens::<f32, 3>(line, 2)?;
                model.positions.push(Vec3::new(x, y, z));
            }
            MeshList::Faces => {
                let a = self.face_corner(line, "A:")?;
                let b = self.face_corner(line, "B:")?;
                let c = self.face_corner(line, "C:")?;
                model.faces.push([a, b, c]);
            }
            MeshList::VertexColors => {
                let [r, g, b] = cursor.parse_tokens::<f32, 3>(line, 2)?;
                model.colors.push(Vec4::new(r, g, b, 1.0));
            }
            MeshList::ColorFaces => {
                model.color_faces.push(cursor.parse_tokens::<u32, 3>(line, 2)?);
            }
            MeshList::TexVertices => {
                let [u, v] = cursor.parse_tokens::<f32, 2>(line, 2)?;
                model.uvs.push(Vec2::new(u, v));
            }
            MeshList::TexFaces => {
                model.uv_faces.push(cursor.parse_tokens::<u32, 3>(line, 2)?);
            }
            MeshList::Normals => {
                let [x, y, z] = cursor.parse_tokens::<f32, 3>(line, 2)?;
                if line.keyword() == "*MESH_FACENORMAL" {
                    model.face_normals.push(Vec3::new(x, y, z));
                } else {
                    let index: usize = cursor.parse_token(line, 1)?;
                    object.vertex_normals.push((index, Vec3::new(x, y, z)));
                }
            }
        }
        Ok(())
    }

    /// Vertex index following a corner label, written either `A: 0` or `A:0`.
    fn face_corner(&self, line: &Line, label: &str) -> AssetResult<u32> {
        let tokens = &line.tokens;
        for (i, token) in tokens.iter().enumerate().skip(2) {
            let value = if token == label {
                tokens.get(i + 1).map(String::as_str)
            } else if let Some(rest) = token.strip_prefix(label) {
                Some(rest)
            } else {
                continue;
            };
            let value = value.ok_or_else(|| {
                self.cursor
                    .malformed(line, format!("face corner '{label}' has no index"))
            })?;
            return value.parse::<u32>().map_err(|_| {
                self.cursor
                    .malformed(line, format!("invalid index '{value}' for face corner '{label}'"))
            });
        }
        Err(self
            .cursor
            .malformed(line, format!("face record is missing corner '{label}'")))
    }

    fn finish_object(&self, object: GeomObject) -> AssetResult<RawModel> {
        let GeomObject {
            mut model,
            vertex_normals,
        } = object;

        if !vertex_normals.is_empty() {
            let mut normals = vec![Vec3::ZERO; model.positions.len()];
            for (index, normal) in vertex_normals {
                let len = normals.len();
                let slot = normals.get_mut(index).ok_or_else(|| AssetError::IndexOutOfRange {
                    source_name: model.source.clone(),
                    model: model.name.clone(),
                    channel: Channel::Normal,
                    index,
                    len,
                })?;
                *slot = normal;
            }
            model.normals = normals;
        }

        if !model.color_faces.is_empty() && model.colors.is_empty() {
            log::warn!(
                "'{}' in {} has color faces but no vertex colors; ignoring them",
                model.name,
                model.source
            );
            model.color_faces.clear();
        }

        log::debug!(
            "Geometry object '{}': {} vertices, {} faces",
            model.name,
            model.positions.len(),
            model.faces.len()
        );
        Ok(model)
    }
}

/// Text between the first pair of double quotes.
fn quoted(text: &str) -> Option<&str> {
    let start = text.find('"')? + 1;
    let len = text[start..].find('"')?;
    Some(&text[start..start + len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Location;

    const QUAD: &str = r#"*3DSMAX_ASCIIEXPORT	200
*COMMENT "exported"
*SCENE {
	*SCENE_FILENAME "quad.max"
	*SCENE_FIRSTFRAME 0
}
*GEOMOBJECT {
	*NODE_NAME "Quad01"
	*NODE_TM {
		*NODE_NAME "Quad01"
		*TM_ROW0 1.0000	0.0000	0.0000
	}
	*MESH {
		*TIMEVALUE 0
		*MESH_NUMVERTEX 4
		*MESH_NUMFACES 2
		*MESH_VERTEX_LIST {
			*MESH_VERTEX    0	0.0000	0.0000	0.0000
			*MESH_VERTEX    1	1.0000	0.0000	0.0000
			*MESH_VERTEX    2	1.0000	1.0000	0.0000
			*MESH_VERTEX    3	0.0000	1.0000	0.0000
		}
		*MESH_FACE_LIST {
			*MESH_FACE    0:    A:    0 B:    1 C:    2 AB:    1 BC:    1 CA:    0	 *MESH_SMOOTHING 1 	*MESH_MTLID 0
			*MESH_FACE    1:    A:0 B:2 C:3 AB:    1 BC:    1 CA:    0
		}
		*MESH_NUMTVERTEX 2
		*MESH_TVERTLIST {
			*MESH_TVERT 0	0.0000	0.0000	0.0000
			*MESH_TVERT 1	1.0000	1.0000	0.0000
		}
		*MESH_NUMTVFACES 2
		*MESH_TFACELIST {
			*MESH_TFACE 0	0	1	1
			*MESH_TFACE 1	0	1	0
		}
		*MESH_NORMALS {
			*MESH_FACENORMAL 0	0.0000	0.0000	1.0000
				*MESH_VERTEXNORMAL 0	0.0000	0.0000	1.0000
				*MESH_VERTEXNORMAL 1	0.0000	0.0000	1.0000
				*MESH_VERTEXNORMAL 2	0.0000	0.0000	1.0000
			*MESH_FACENORMAL 1	0.0000	0.0000	1.0000
				*MESH_VERTEXNORMAL 0	0.0000	0.0000	1.0000
				*MESH_VERTEXNORMAL 2	0.0000	0.0000	1.0000
				*MESH_VERTEXNORMAL 3	0.0000	0.0000	1.0000
		}
	}
	*PROP_MOTIONBLUR 0
	*PROP_CASTSHADOW 1
	*MATERIAL_REF 0
}
"#;

    #[test]
    fn test_decode_quad() {
        let models = decode(QUAD, "quad.ase").unwrap();
        assert_eq!(models.len(), 1);

        let quad = &models[0];
        assert_eq!(quad.name, "Quad01");
        assert_eq!(quad.source, "quad.ase");
        assert_eq!(quad.positions.len(), 4);
        assert_eq!(quad.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(quad.uvs.len(), 2);
        assert_eq!(quad.uv_faces, vec![[0, 1, 1], [0, 1, 0]]);
        assert_eq!(quad.face_normals.len(), 2);
        assert_eq!(quad.normals, vec![Vec3::Z; 4]);
    }

    #[test]
    fn test_unnamed_objects_and_colors() {
        let src = "*GEOMOBJECT {\n\
                   *MESH {\n\
                   *MESH_VERTEX_LIST {\n\
                   *MESH_VERTEX 0 0 0 0\n\
                   *MESH_VERTEX 1 1 0 0\n\
                   *MESH_VERTEX 2 0 1 0\n\
                   }\n\
                   *MESH_FACE_LIST {\n\
                   *MESH_FACE 0: A: 0 B: 1 C: 2\n\
                   }\n\
                   *MESH_CVERTLIST {\n\
                   *MESH_VERTCOL 0 1.0 0.5 0.25\n\
                   }\n\
                   *MESH_CFACELIST {\n\
                   *MESH_CFACE 0 0 0 0\n\
                   }\n\
                   }\n\
                   }\n\
                   *GEOMOBJECT {\n\
                   *NODE_NAME \"Second One\"\n\
                   }\n";

        let models = decode(src, "t.ase").unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "object_0");
        assert_eq!(models[0].colors, vec![Vec4::new(1.0, 0.5, 0.25, 1.0)]);
        assert_eq!(models[0].color_faces, vec![[0, 0, 0]]);
        assert!(models[0].normals.is_empty());
        assert_eq!(models[1].name, "Second One");
        assert!(models[1].is_empty());
    }

    #[test]
    fn test_unknown_blocks_are_skipped() {
        let src = "*MATERIAL_LIST {\n\
                   *MATERIAL 0 {\n\
                   *MAP_DIFFUSE {\n\
                   *BITMAP \"wood.png\"\n\
                   }\n\
                   }\n\
                   }\n\
                   *GEOMOBJECT {\n\
                   *NODE_NAME \"Box\"\n\
                   *FUTURE_BLOCK {\n\
                   *NESTED {\n\
                   }\n\
                   }\n\
                   }\n";
        let models = decode(src, "t.ase").unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "Box");
    }

    #[test]
    fn test_list_stops_at_first_foreign_record() {
        let src = "*GEOMOBJECT {\n\
                   *MESH {\n\
                   *MESH_VERTEX_LIST {\n\
                   *MESH_VERTEX 0 0 0 0\n\
                   *MESH_WEIRD 1\n\
                   *MESH_VERTEX 1 1 0 0\n\
                   }\n\
                   }\n\
                   }\n";
        let models = decode(src, "t.ase").unwrap();
        assert_eq!(models[0].positions.len(), 1);
    }

    #[test]
    fn test_short_vertex_record_is_malformed() {
        let src = "*GEOMOBJECT {\n*MESH {\n*MESH_VERTEX_LIST {\n*MESH_VERTEX 0 1.0 2.0\n}\n}\n}\n";
        match decode(src, "t.ase").unwrap_err() {
            AssetError::MalformedRecord {
                source_name,
                location,
                ..
            } => {
                assert_eq!(source_name, "t.ase");
                assert_eq!(location, Location::Line(4));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_face_number_is_malformed() {
        let src = "*GEOMOBJECT {\n*MESH {\n*MESH_FACE_LIST {\n*MESH_FACE 0: A: x B: 1 C: 2\n}\n}\n}\n";
        assert!(matches!(
            decode(src, "t.ase"),
            Err(AssetError::MalformedRecord { .. })
        ));

        let src = "*GEOMOBJECT {\n*MESH {\n*MESH_FACE_LIST {\n*MESH_FACE 0: A: 0 B: 1\n}\n}\n}\n";
        let err = decode(src, "t.ase").unwrap_err();
        assert!(err.to_string().contains("C:"));
    }

    #[test]
    fn test_vertex_normal_index_out_of_range() {
        let src = "*GEOMOBJECT {\n*MESH {\n*MESH_VERTEX_LIST {\n*MESH_VERTEX 0 0 0 0\n}\n\
                   *MESH_NORMALS {\n*MESH_VERTEXNORMAL 3 0 0 1\n}\n}\n}\n";
        assert!(matches!(
            decode(src, "t.ase"),
            Err(AssetError::IndexOutOfRange {
                channel: Channel::Normal,
                index: 3,
                len: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_unclosed_block_reports_its_start() {
        let src = "*SCENE {\n*SCENE_FIRSTFRAME 0\n}\n*GEOMOBJECT {\n*NODE_NAME \"x\"\n";
        match decode(src, "t.ase").unwrap_err() {
            AssetError::MalformedRecord { location, message, .. } => {
                assert_eq!(location, Location::Line(4));
                assert!(message.contains("*GEOMOBJECT"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_not_ase_is_unsupported() {
        assert!(matches!(
            decode("v 1 2 3\nf 1 2 3\n", "t.ase"),
            Err(AssetError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            decode("\n\n", "t.ase"),
            Err(AssetError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_quoted() {
        assert_eq!(quoted("*NODE_NAME \"Box 01\""), Some("Box 01"));
        assert_eq!(quoted("*NODE_NAME Box"), None);
    }
}
