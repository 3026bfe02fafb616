//! Surface shading parameters.
//!
//! Materials come from material-library markup (see [`crate::markup::matlib`]).
//! Texture images and shader sources are only referenced here; turning them
//! into GPU objects is the renderer's job, which hands back a [`GpuHandle`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::registry::{GpuHandle, Namespace, Resource};
use crate::texture::Texture;

/// Texture sampling filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
    Mipmap,
}

impl FromStr for TextureFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(TextureFilter::Nearest),
            "" | "linear" => Ok(TextureFilter::Linear),
            "mipmap" => Ok(TextureFilter::Mipmap),
            other => Err(format!("unknown texture filter '{other}'")),
        }
    }
}

impl fmt::Display for TextureFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureFilter::Nearest => f.write_str("nearest"),
            TextureFilter::Linear => f.write_str("linear"),
            TextureFilter::Mipmap => f.write_str("mipmap"),
        }
    }
}

/// Bitmap texture bound to a material.
#[derive(Debug)]
pub struct TextureRef {
    /// Image path as resolved at load time
    pub path: String,

    pub filter: TextureFilter,

    /// Decoded pixels, present when textures were preloaded
    pub image: Option<Arc<Texture>>,

    handle: Option<Box<dyn GpuHandle>>,
}

impl TextureRef {
    pub fn new(path: impl Into<String>, filter: TextureFilter) -> Self {
        Self {
            path: path.into(),
            filter,
            image: None,
            handle: None,
        }
    }

    pub fn with_image(mut self, image: Arc<Texture>) -> Self {
        self.image = Some(image);
        self
    }

    pub fn attach_handle(&mut self, handle: Box<dyn GpuHandle>) {
        self.release();
        self.handle = Some(handle);
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    pub fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }
    }
}

/// Vertex and fragment shader sources.
#[derive(Debug)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
    handle: Option<Box<dyn GpuHandle>>,
}

impl ShaderSource {
    /// `None` unless both stages have source text.
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Option<Self> {
        let vertex = vertex.into().trim().to_string();
        let fragment = fragment.into().trim().to_string();
        if vertex.is_empty() || fragment.is_empty() {
            return None;
        }
        Some(Self {
            vertex,
            fragment,
            handle: None,
        })
    }

    pub fn attach_handle(&mut self, handle: Box<dyn GpuHandle>) {
        self.release();
        self.handle = Some(handle);
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    pub fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }
    }
}

/// Fixed-function style material.
#[derive(Debug)]
pub struct Material {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub emission: [f32; 4],
    pub shininess: f32,
    pub texture: Option<TextureRef>,
    pub shader: Option<ShaderSource>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: [0.2, 0.2, 0.2, 1.0],
            diffuse: [0.8, 0.8, 0.8, 1.0],
            specular: [0.0, 0.0, 0.0, 1.0],
            emission: [0.0, 0.0, 0.0, 1.0],
            shininess: 0.0,
            texture: None,
            shader: None,
        }
    }
}

impl Material {
    pub fn new(ambient: [f32; 4], diffuse: [f32; 4], specular: [f32; 4], emission: [f32; 4], shininess: f32) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            emission,
            shininess,
            texture: None,
            shader: None,
        }
    }

    pub fn with_texture(mut self, texture: TextureRef) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_shader(mut self, shader: ShaderSource) -> Self {
        self.shader = Some(shader);
        self
    }

    /// Release texture and shader handles.
    pub fn release(&mut self) {
        if let Some(texture) = self.texture.as_mut() {
            texture.release();
        }
        if let Some(shader) = self.shader.as_mut() {
            shader.release();
        }
    }
}

impl Resource for Material {
    const NAMESPACE: Namespace = Namespace::Material;

    fn teardown(&mut self) {
        self.release();
    }
}

/// Expand an RGB or RGBA list to RGBA. Other lengths are rejected.
pub fn color_from_slice(values: &[f32]) -> Option<[f32; 4]> {
    match *values {
        [r, g, b] => Some([r, g, b, 1.0]),
        [r, g, b, a] => Some([r, g, b, a]),
        _ => None,
    }
}
