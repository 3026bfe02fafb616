//! Material library markup reader.
//!
//! ```xml
//! <materials>
//!   <material id="wood">
//!     <properties ambient="0.2;0.1;0.0" diffuse="0.8;0.5;0.2;1" specular="0;0;0"
//!                 emission="0;0;0" shininess="10"/>
//!     <texture src="wood.png" filter="mipmap"/>
//!     <vertexshader>void main() { ... }</vertexshader>
//!     <fragmentshader>void main() { ... }</fragmentshader>
//!   </material>
//! </materials>
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use roxmltree::Node;

use super::{child_element, elements, location_of, optional_attr, parse_document, parse_float_list, parsed_attr};
use crate::config::LoaderConfig;
use crate::error::{AssetError, AssetResult, Location};
use crate::material::{color_from_slice, Material, ShaderSource, TextureFilter, TextureRef};
use crate::texture::TextureCache;

/// `<texture>` element of a material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDecl {
    pub src: String,
    pub filter: TextureFilter,
}

/// One `<material>` as written in the library.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialDecl {
    pub id: String,
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub emission: [f32; 4],
    pub shininess: f32,
    pub texture: Option<TextureDecl>,
    pub vertex_shader: String,
    pub fragment_shader: String,
    pub line: usize,
}

impl MaterialDecl {
    /// Build the material.
    ///
    /// Texture paths resolve through `config` against `base_dir` (the library
    /// file's directory). When `config.preload_textures` is set and a cache is
    /// given, the image is decoded now and a missing image is `FileNotFound`.
    pub fn build(
        &self,
        config: &LoaderConfig,
        base_dir: &Path,
        textures: Option<&mut TextureCache>,
    ) -> AssetResult<Material> {
        let mut material = Material::new(self.ambient, self.diffuse, self.specular, self.emission, self.shininess);

        if let (true, Some(decl)) = (config.textures, &self.texture) {
            let path = config.resolve(&decl.src, base_dir).display().to_string();
            let mut texture = TextureRef::new(path, decl.filter);
            if let (true, Some(cache)) = (config.preload_textures, textures) {
                let image = cache.load(&texture.path)?;
                texture = texture.with_image(image);
            }
            material = material.with_texture(texture);
        }

        if config.shaders {
            if let Some(shader) = ShaderSource::new(self.vertex_shader.as_str(), self.fragment_shader.as_str()) {
                material = material.with_shader(shader);
            }
        }

        Ok(material)
    }
}

/// Read every `<material>` in a library file, in document order.
///
/// A material without a `<properties>` element, a colour with other than
/// three or four components, or a repeated id is `MalformedRecord`.
pub fn parse_material_library(text: &str, source_name: &str) -> AssetResult<Vec<MaterialDecl>> {
    let doc = parse_document(text, source_name)?;

    let mut seen = BTreeSet::new();
    let mut materials = Vec::new();
    for node in elements(&doc, "material") {
        let decl = read_material(node, source_name)?;
        if !seen.insert(decl.id.clone()) {
            return Err(AssetError::malformed(
                source_name,
                location_of(node),
                format!("duplicate material id '{}'", decl.id),
            ));
        }
        materials.push(decl);
    }

    log::debug!("Parsed material library {}: {} materials", source_name, materials.len());
    Ok(materials)
}

fn read_material(node: Node<'_, '_>, source_name: &str) -> AssetResult<MaterialDecl> {
    let id = super::required_attr(node, "id", source_name)?.to_string();
    let defaults = Material::default();

    let properties = child_element(node, "properties").ok_or_else(|| {
        AssetError::malformed(
            source_name,
            location_of(node),
            format!("material '{id}' has no <properties> element"),
        )
    })?;

    let color = |value: &str| -> Result<[f32; 4], String> {
        let values = parse_float_list(value)?;
        color_from_slice(&values).ok_or_else(|| format!("expected 3 or 4 components, found {}", values.len()))
    };

    let texture = match child_element(node, "texture") {
        Some(tex) => match optional_attr(tex, "src") {
            Some(src) => Some(TextureDecl {
                src: src.to_string(),
                filter: parsed_attr(tex, "filter", source_name, TextureFilter::default(), |v| v.parse())?,
            }),
            None => None,
        },
        None => None,
    };

    Ok(MaterialDecl {
        ambient: parsed_attr(properties, "ambient", source_name, defaults.ambient, color)?,
        diffuse: parsed_attr(properties, "diffuse", source_name, defaults.diffuse, color)?,
        specular: parsed_attr(properties, "specular", source_name, defaults.specular, color)?,
        emission: parsed_attr(properties, "emission", source_name, defaults.emission, color)?,
        shininess: parsed_attr(properties, "shininess", source_name, defaults.shininess, |v| {
            v.parse::<f32>().map_err(|_| format!("'{v}' is not a number"))
        })?,
        texture,
        vertex_shader: shader_text(node, "vertexshader"),
        fragment_shader: shader_text(node, "fragmentshader"),
        line: match location_of(node) {
            Location::Line(line) => line,
            _ => 0,
        },
        id,
    })
}

/// Concatenated text (including CDATA) of a shader element, trimmed.
fn shader_text(node: Node<'_, '_>, tag: &str) -> String {
    child_element(node, tag)
        .map(|shader| {
            shader
                .children()
                .filter(|n| n.is_text())
                .filter_map(|n| n.text())
                .collect::<String>()
        })
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"<materials>
  <material id="wood">
    <properties ambient="0.2;0.1;0" diffuse="0.8;0.5;0.2;0.5" specular="1;1;1"
                emission="0;0;0" shininess="12.5"/>
    <texture src="wood.png" filter="mipmap"/>
    <vertexshader><![CDATA[
      void main() { gl_Position = ftransform(); }
    ]]></vertexshader>
    <fragmentshader>void main() { gl_FragColor = vec4(1.0); }</fragmentshader>
  </material>
  <material id="plain">
    <properties shininess="0"/>
  </material>
</materials>
"#;

    #[test]
    fn test_parse_library() {
        let materials = parse_material_library(LIBRARY, "mats.xml").unwrap();
        assert_eq!(materials.len(), 2);

        let wood = &materials[0];
        assert_eq!(wood.id, "wood");
        assert_eq!(wood.ambient, [0.2, 0.1, 0.0, 1.0]);
        assert_eq!(wood.diffuse, [0.8, 0.5, 0.2, 0.5]);
        assert_eq!(wood.shininess, 12.5);
        assert_eq!(
            wood.texture,
            Some(TextureDecl {
                src: "wood.png".to_string(),
                filter: TextureFilter::Mipmap
            })
        );
        assert_eq!(wood.vertex_shader, "void main() { gl_Position = ftransform(); }");
        assert!(wood.fragment_shader.starts_with("void main()"));
        assert_eq!(wood.line, 2);

        let plain = &materials[1];
        assert_eq!(plain.diffuse, Material::default().diffuse);
        assert!(plain.texture.is_none());
        assert!(plain.vertex_shader.is_empty());
    }

    #[test]
    fn test_build_honours_config() {
        let materials = parse_material_library(LIBRARY, "mats.xml").unwrap();
        let base = Path::new("/assets/materials");

        let material = materials[0].build(&LoaderConfig::default(), base, None).unwrap();
        let texture = material.texture.as_ref().unwrap();
        assert_eq!(Path::new(&texture.path), Path::new("/assets/materials/wood.png"));
        assert_eq!(texture.filter, TextureFilter::Mipmap);
        assert!(texture.image.is_none());
        assert!(material.shader.is_some());

        let config = LoaderConfig {
            textures: false,
            shaders: false,
            ..Default::default()
        };
        let material = materials[0].build(&config, base, None).unwrap();
        assert!(material.texture.is_none());
        assert!(material.shader.is_none());
    }

    #[test]
    fn test_preload_missing_texture_fails() {
        let materials = parse_material_library(LIBRARY, "mats.xml").unwrap();
        let config = LoaderConfig {
            preload_textures: true,
            ..Default::default()
        };
        let mut cache = TextureCache::new();
        let err = materials[0]
            .build(&config, Path::new("/no/such/dir"), Some(&mut cache))
            .unwrap_err();
        assert!(matches!(err, AssetError::FileNotFound { .. }));
    }

    #[test]
    fn test_preload_attaches_decoded_image() {
        let dir = std::env::temp_dir().join(format!("ilo_matlib_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        image::RgbaImage::from_pixel(1, 1, image::Rgba([10, 20, 30, 255]))
            .save(dir.join("wood.png"))
            .unwrap();

        let materials = parse_material_library(LIBRARY, "mats.xml").unwrap();
        let config = LoaderConfig {
            preload_textures: true,
            ..Default::default()
        };
        let mut cache = TextureCache::new();
        let material = materials[0].build(&config, &dir, Some(&mut cache)).unwrap();

        let texture = material.texture.unwrap();
        assert!(texture.path.ends_with("wood.png"));
        let image = texture.image.unwrap();
        assert_eq!(image.pixel(0, 0), [10, 20, 30, 255]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_missing_properties() {
        let err = parse_material_library("<m>\n<material id=\"x\"/>\n</m>", "mats.xml").unwrap_err();
        match err {
            AssetError::MalformedRecord { location, message, .. } => {
                assert_eq!(location, Location::Line(2));
                assert!(message.contains("<properties>"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_colour() {
        let err = parse_material_library(
            "<m><material id=\"x\"><properties diffuse=\"1;1\"/></material></m>",
            "mats.xml",
        )
        .unwrap_err();
        assert!(err.to_string().contains("diffuse"));

        let err = parse_material_library(
            "<m><material id=\"x\"><properties/><texture src=\"a.png\" filter=\"bicubic\"/></material></m>",
            "mats.xml",
        )
        .unwrap_err();
        assert!(err.to_string().contains("bicubic"));
    }

    #[test]
    fn test_duplicate_material_id() {
        let err = parse_material_library(
            "<m><material id=\"x\"><properties/></material><material id=\"x\"><properties/></material></m>",
            "mats.xml",
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate material id 'x'"));
    }
}
