//! Texture image loading and caching.
//!
//! Images are decoded with the `image` crate into RGBA8 and shared through a
//! path-keyed cache, so materials that use the same bitmap hold one copy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{AssetError, AssetResult};

/// A decoded texture image.
#[derive(Clone, Debug)]
pub struct Texture {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// RGBA8 pixels, row-major from the top-left corner
    pub pixels: Vec<[u8; 4]>,

    /// File the image was read from
    pub path: String,
}

impl Texture {
    pub fn new(width: u32, height: u32, pixels: Vec<[u8; 4]>, path: impl Into<String>) -> Self {
        Self {
            width,
            height,
            pixels,
            path: path.into(),
        }
    }

    /// Pixel at integer coordinates, transparent black outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0, 0];
        }
        let idx = (y * self.width + x) as usize;
        self.pixels.get(idx).copied().unwrap_or([0, 0, 0, 0])
    }

    /// Raw pixel bytes for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn size_bytes(&self) -> usize {
        self.pixels.len() * 4
    }
}

/// Cache of decoded textures, keyed by the path they were requested with.
pub struct TextureCache {
    textures: HashMap<String, Arc<Texture>>,

    /// Base directory for resolving relative paths
    base_dir: Option<PathBuf>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            base_dir: None,
        }
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            textures: HashMap::new(),
            base_dir: Some(base_dir.into()),
        }
    }

    pub fn set_base_dir(&mut self, base_dir: impl Into<PathBuf>) {
        self.base_dir = Some(base_dir.into());
    }

    /// Load a texture from file, using the cache if available.
    pub fn load(&mut self, path: &str) -> AssetResult<Arc<Texture>> {
        if let Some(texture) = self.textures.get(path) {
            return Ok(texture.clone());
        }

        let full_path = self.resolve_path(path);
        let texture = Arc::new(load_texture_file(&full_path)?);
        self.textures.insert(path.to_string(), texture.clone());

        log::debug!(
            "Loaded texture: {} ({}x{}, {:.1} KB)",
            path,
            texture.width,
            texture.height,
            texture.size_bytes() as f32 / 1024.0
        );

        Ok(texture)
    }

    pub fn get(&self, path: &str) -> Option<Arc<Texture>> {
        self.textures.get(path).cloned()
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.textures.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }

    pub fn total_size_bytes(&self) -> usize {
        self.textures.values().map(|t| t.size_bytes()).sum()
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);

        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(base) = &self.base_dir {
            base.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}

fn load_texture_file(path: &Path) -> AssetResult<Texture> {
    if !path.is_file() {
        return Err(AssetError::file_not_found(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "texture image not found"),
        ));
    }

    let img = image::open(path).map_err(|e| AssetError::unsupported(path.display().to_string(), e.to_string()))?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixels: Vec<[u8; 4]> = rgba.pixels().map(|p| p.0).collect();

    Ok(Texture::new(width, height, pixels, path.to_string_lossy().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ilo_texture_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_texture_cache_starts_empty() {
        let cache = TextureCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_load_png_is_cached() {
        let dir = temp_dir("png");
        let mut img = image::RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, image::Rgba([0, 0, 255, 128]));
        img.save(dir.join("red_blue.png")).unwrap();

        let mut cache = TextureCache::with_base_dir(&dir);
        let tex = cache.load("red_blue.png").unwrap();
        assert_eq!((tex.width, tex.height), (2, 1));
        assert_eq!(tex.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(tex.pixel(1, 0), [0, 0, 255, 128]);
        assert_eq!(tex.pixel(5, 5), [0, 0, 0, 0]);
        assert_eq!(tex.as_bytes().len(), 8);

        let again = cache.load("red_blue.png").unwrap();
        assert!(Arc::ptr_eq(&tex, &again));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_size_bytes(), 8);
    }

    #[test]
    fn test_missing_texture_is_file_not_found() {
        let mut cache = TextureCache::with_base_dir(temp_dir("missing"));
        let err = cache.load("nope.png").unwrap_err();
        assert!(matches!(err, AssetError::FileNotFound { .. }));
    }

    #[test]
    fn test_undecodable_texture_is_unsupported() {
        let dir = temp_dir("garbage");
        std::fs::write(dir.join("garbage.png"), b"not an image").unwrap();

        let mut cache = TextureCache::with_base_dir(&dir);
        let err = cache.load("garbage.png").unwrap_err();
        assert!(matches!(err, AssetError::UnsupportedFormat { .. }));
    }
}
