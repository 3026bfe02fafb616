//! XML scene and material-library markup.
//!
//! Both readers are element based: they look elements up by tag name
//! anywhere in the document and read their attributes. Numeric lists are
//! `;`-separated (`coord="1;2;3"`).

pub mod matlib;
pub mod scene;

use ilo_math::Vec3;
use roxmltree::{Document, Node};

use crate::error::{AssetError, AssetResult, Location};

pub use matlib::{parse_material_library, MaterialDecl, TextureDecl};
pub use scene::{parse_scene, GeometryLibDecl, MaterialLibDecl, ObjectDecl, SceneDescription};

/// Parse XML, reporting syntax errors as `MalformedRecord` with their line.
pub(crate) fn parse_document<'a>(text: &'a str, source_name: &str) -> AssetResult<Document<'a>> {
    Document::parse(text).map_err(|e| {
        AssetError::malformed(source_name, Location::Line(e.pos().row as usize), e.to_string())
    })
}

/// Line on which an element starts.
pub(crate) fn location_of(node: Node<'_, '_>) -> Location {
    let pos = node.document().text_pos_at(node.range().start);
    Location::Line(pos.row as usize)
}

/// Elements with the given tag name, in document order.
pub(crate) fn elements<'a, 'input>(
    doc: &'a Document<'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    doc.descendants().filter(move |n| n.is_element() && n.has_tag_name(tag))
}

/// First child element of `node` with the given tag name.
pub(crate) fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.is_element() && n.has_tag_name(tag))
}

/// A required, non-empty attribute.
pub(crate) fn required_attr<'a>(node: Node<'a, '_>, name: &str, source_name: &str) -> AssetResult<&'a str> {
    match node.attribute(name).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(AssetError::malformed(
            source_name,
            location_of(node),
            format!("<{}> is missing required attribute '{}'", node.tag_name().name(), name),
        )),
    }
}

/// An attribute that is absent or empty counts as not given.
pub(crate) fn optional_attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name).map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a `;`-separated list of floats.
pub fn parse_float_list(value: &str) -> Result<Vec<f32>, String> {
    value
        .split(';')
        .map(|part| {
            let part = part.trim();
            part.parse::<f32>()
                .map_err(|_| format!("'{part}' is not a number"))
        })
        .collect()
}

/// Parse exactly three `;`-separated floats.
pub fn parse_triple(value: &str) -> Result<Vec3, String> {
    match parse_float_list(value)?.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        other => Err(format!("expected 3 values, found {}", other.len())),
    }
}

/// Attribute parsed with `parse`, or `default` when absent. Parse failures
/// become `MalformedRecord` at the element's line.
pub(crate) fn parsed_attr<T>(
    node: Node<'_, '_>,
    name: &str,
    source_name: &str,
    default: T,
    parse: impl Fn(&str) -> Result<T, String>,
) -> AssetResult<T> {
    match optional_attr(node, name) {
        None => Ok(default),
        Some(value) => parse(value).map_err(|reason| {
            AssetError::malformed(
                source_name,
                location_of(node),
                format!("<{}> attribute {}=\"{}\": {}", node.tag_name().name(), name, value, reason),
            )
        }),
    }
}
