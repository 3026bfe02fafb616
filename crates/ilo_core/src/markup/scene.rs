//! Scene markup reader.
//!
//! ```xml
//! <scene>
//!   <sceneid>demo</sceneid>
//!   <geometry id="level" src="box.ase" format="ase"/>
//!   <matlib id="mats" src="materials.xml"/>
//!   <object id="main" geometry="level.Box01" texture="mats.wood"/>
//!   <object id="lamp" geometry="level.Lamp" texture="mats." coord="0;2;0" angle="0;90;0"/>
//! </scene>
//! ```
//!
//! This module only reads declarations. Resolving them against files and the
//! registry is done by [`crate::assembler::SceneAssembler`].

use std::collections::BTreeSet;

use roxmltree::{Document, Node};

use super::{elements, location_of, optional_attr, parse_document, parse_triple, parsed_attr, required_attr};
use crate::error::{AssetError, AssetResult, Location};
use crate::formats::ModelFormat;
use crate::registry::ResourceKey;
use crate::scene::{NodeTransform, SceneInfo};

/// Id of the object that becomes the scene root.
pub const ROOT_OBJECT_ID: &str = "main";

/// A `<geometry>` library declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryLibDecl {
    pub id: String,
    pub src: String,

    /// Explicit format; inferred from the file extension when `None`
    pub format: Option<ModelFormat>,

    pub line: usize,
}

/// A `<matlib>` library declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterialLibDecl {
    pub id: String,
    pub src: String,
    pub line: usize,
}

/// An `<object>` declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectDecl {
    pub id: String,
    pub geometry: Option<ResourceKey>,
    pub material: Option<ResourceKey>,
    pub visible: bool,
    pub hittest: bool,
    pub shadow: bool,
    pub transform: NodeTransform,
    pub line: usize,
}

/// Everything a scene file declares, in document order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneDescription {
    pub info: SceneInfo,
    pub geometry_libs: Vec<GeometryLibDecl>,
    pub material_libs: Vec<MaterialLibDecl>,
    pub objects: Vec<ObjectDecl>,
}

impl SceneDescription {
    pub fn geometry_lib(&self, id: &str) -> Option<&GeometryLibDecl> {
        self.geometry_libs.iter().find(|lib| lib.id == id)
    }

    pub fn material_lib(&self, id: &str) -> Option<&MaterialLibDecl> {
        self.material_libs.iter().find(|lib| lib.id == id)
    }

    pub fn object(&self, id: &str) -> Option<&ObjectDecl> {
        self.objects.iter().find(|obj| obj.id == id)
    }
}

/// Read a scene file's declarations.
///
/// Fails with `MalformedRecord` on XML errors, missing required attributes,
/// bad numeric lists, duplicate ids or a missing `main` object, and with
/// `UnsupportedFormat` on an unknown geometry `format`.
pub fn parse_scene(text: &str, source_name: &str) -> AssetResult<SceneDescription> {
    let doc = parse_document(text, source_name)?;

    let info = SceneInfo {
        id: element_text(&doc, "sceneid"),
        name: element_text(&doc, "scenename"),
        kind: element_text(&doc, "scenetype"),
    };

    let mut geometry_libs: Vec<GeometryLibDecl> = Vec::new();
    for node in elements(&doc, "geometry") {
        let decl = read_geometry_lib(node, source_name)?;
        if geometry_libs.iter().any(|lib| lib.id == decl.id) {
            return Err(duplicate(node, source_name, "geometry library", &decl.id));
        }
        geometry_libs.push(decl);
    }

    let mut material_libs: Vec<MaterialLibDecl> = Vec::new();
    for node in elements(&doc, "matlib") {
        let decl = MaterialLibDecl {
            id: required_attr(node, "id", source_name)?.to_string(),
            src: required_attr(node, "src", source_name)?.to_string(),
            line: line_of(node),
        };
        if material_libs.iter().any(|lib| lib.id == decl.id) {
            return Err(duplicate(node, source_name, "material library", &decl.id));
        }
        material_libs.push(decl);
    }

    let mut seen = BTreeSet::new();
    let mut objects = Vec::new();
    for node in elements(&doc, "object") {
        let decl = read_object(node, source_name)?;
        if !seen.insert(decl.id.clone()) {
            return Err(duplicate(node, source_name, "object", &decl.id));
        }
        objects.push(decl);
    }

    if !seen.contains(ROOT_OBJECT_ID) {
        return Err(AssetError::malformed(
            source_name,
            Location::Unknown,
            format!("scene has no '{ROOT_OBJECT_ID}' object"),
        ));
    }

    log::debug!(
        "Parsed scene {}: {} geometry libraries, {} material libraries, {} objects",
        source_name,
        geometry_libs.len(),
        material_libs.len(),
        objects.len()
    );

    Ok(SceneDescription {
        info,
        geometry_libs,
        material_libs,
        objects,
    })
}

fn read_geometry_lib(node: Node<'_, '_>, source_name: &str) -> AssetResult<GeometryLibDecl> {
    let id = required_attr(node, "id", source_name)?.to_string();
    let src = required_attr(node, "src", source_name)?.to_string();
    let format = match optional_attr(node, "format") {
        None => None,
        Some(name) => Some(name.parse::<ModelFormat>().map_err(|reason| {
            AssetError::unsupported(format!("{source_name} (geometry library '{id}')"), reason)
        })?),
    };
    Ok(GeometryLibDecl {
        id,
        src,
        format,
        line: line_of(node),
    })
}

fn read_object(node: Node<'_, '_>, source_name: &str) -> AssetResult<ObjectDecl> {
    let id = required_attr(node, "id", source_name)?.to_string();

    let geometry = match optional_attr(node, "geometry") {
        None => None,
        Some(value) => {
            let key = parse_reference(node, "geometry", value, source_name)?;
            if key.id.is_empty() {
                return Err(AssetError::malformed(
                    source_name,
                    location_of(node),
                    format!("object '{id}' has an empty geometry id in '{value}'"),
                ));
            }
            Some(key)
        }
    };

    // `lib.` names no material
    let material = match optional_attr(node, "texture") {
        None => None,
        Some(value) => Some(parse_reference(node, "texture", value, source_name)?).filter(|key| !key.id.is_empty()),
    };

    let flag = |value: &str| -> Result<bool, String> { Ok(value == "1") };
    let transform = NodeTransform {
        translation: parsed_attr(node, "coord", source_name, NodeTransform::default().translation, parse_triple)?,
        rotation: parsed_attr(node, "angle", source_name, NodeTransform::default().rotation, parse_triple)?,
        scale: parsed_attr(node, "scale", source_name, NodeTransform::default().scale, parse_triple)?,
    };

    Ok(ObjectDecl {
        id,
        geometry,
        material,
        visible: parsed_attr(node, "visible", source_name, true, flag)?,
        hittest: parsed_attr(node, "hittest", source_name, false, flag)?,
        shadow: parsed_attr(node, "shadow", source_name, false, flag)?,
        transform,
        line: line_of(node),
    })
}

fn parse_reference(node: Node<'_, '_>, attr: &str, value: &str, source_name: &str) -> AssetResult<ResourceKey> {
    value.parse::<ResourceKey>().map_err(|e| {
        AssetError::malformed(source_name, location_of(node), format!("attribute {attr}: {e}"))
    })
}

fn element_text(doc: &Document<'_>, tag: &str) -> Option<String> {
    elements(doc, tag)
        .next()
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn line_of(node: Node<'_, '_>) -> usize {
    match location_of(node) {
        Location::Line(line) => line,
        _ => 0,
    }
}

fn duplicate(node: Node<'_, '_>, source_name: &str, what: &str, id: &str) -> AssetError {
    AssetError::malformed(source_name, location_of(node), format!("duplicate {what} id '{id}'"))
}
