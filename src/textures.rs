//! Source textures used to bake particle colors.
//!
//! A [`SourceTexture`] is the surface texture of a source mesh. Its pixels
//! are decoded lazily, exactly once, the first time a color is baked from
//! it. Decoding failures are not errors: the texture simply reports no
//! pixels and the geometry sampler falls back to the material color.
//!
//! # Example
//!
//! ```
//! use meshdust::textures::SourceTexture;
//! use meshdust::Vec2;
//!
//! // 2x2 texture, top row red/green, bottom row blue/white
//! let tex = SourceTexture::from_rgba("quad", vec![
//!     255, 0, 0, 255,    0, 255, 0, 255,
//!     0, 0, 255, 255,    255, 255, 255, 255,
//! ], 2, 2);
//!
//! // v = 1 is the top of the image
//! let c = tex.sample_nearest(Vec2::new(0.25, 0.75)).unwrap();
//! assert_eq!(c.x, 1.0);
//! ```

use std::path::PathBuf;
use std::sync::OnceLock;

use glam::{Vec2, Vec3};
use image::RgbaImage;

/// Where a texture's pixels come from.
#[derive(Debug, Clone)]
pub enum TextureSource {
    /// Raw RGBA8 pixel data (width * height * 4 bytes).
    Rgba { data: Vec<u8>, width: u32, height: u32 },
    /// An image file on disk (PNG or JPEG).
    File(PathBuf),
    /// An encoded image held in memory, e.g. embedded in a model file.
    Encoded(Vec<u8>),
}

/// A mesh surface texture with cached decoded pixels.
#[derive(Debug)]
pub struct SourceTexture {
    name: String,
    source: TextureSource,
    pixels: OnceLock<Option<RgbaImage>>,
}

impl SourceTexture {
    /// Create a texture from raw RGBA data.
    ///
    /// A size mismatch is reported when the pixels are first read, like any
    /// other unreadable texture.
    pub fn from_rgba(name: impl Into<String>, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self::new(name, TextureSource::Rgba { data, width, height })
    }

    /// Create a texture backed by an image file. Nothing is read until the
    /// first sample.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(path.display().to_string(), TextureSource::File(path))
    }

    /// Create a texture from encoded PNG/JPEG bytes.
    pub fn from_encoded(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, TextureSource::Encoded(bytes))
    }

    /// Create a checkerboard pattern texture.
    ///
    /// # Example
    ///
    /// ```
    /// use meshdust::textures::SourceTexture;
    ///
    /// let checker = SourceTexture::checkerboard(64, 8, [255, 255, 255, 255], [0, 0, 0, 255]);
    /// assert!(checker.pixels().is_some());
    /// ```
    pub fn checkerboard(size: u32, cell_size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let cell_size = cell_size.max(1);
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let color = if (x / cell_size + y / cell_size) % 2 == 0 {
                    color1
                } else {
                    color2
                };
                data.extend_from_slice(&color);
            }
        }
        Self::from_rgba("checkerboard", data, size, size)
    }

    fn new(name: impl Into<String>, source: TextureSource) -> Self {
        Self {
            name: name.into(),
            source,
            pixels: OnceLock::new(),
        }
    }

    /// Texture name, used in log messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the pixels come from.
    pub fn source(&self) -> &TextureSource {
        &self.source
    }

    /// Decoded RGBA pixels, or `None` if the texture could not be read.
    ///
    /// The first call decodes; later calls return the cached result.
    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.get_or_init(|| self.decode()).as_ref()
    }

    fn decode(&self) -> Option<RgbaImage> {
        let decoded = match &self.source {
            TextureSource::Rgba { data, width, height } => {
                RgbaImage::from_raw(*width, *height, data.clone()).ok_or_else(|| {
                    format!(
                        "RGBA data is {} bytes, expected {}x{}x4",
                        data.len(),
                        width,
                        height
                    )
                })
            }
            TextureSource::File(path) => image::open(path)
                .map(|img| img.into_rgba8())
                .map_err(|e| e.to_string()),
            TextureSource::Encoded(bytes) => image::load_from_memory(bytes)
                .map(|img| img.into_rgba8())
                .map_err(|e| e.to_string()),
        };

        match decoded {
            Ok(img) if img.width() > 0 && img.height() > 0 => {
                log::debug!(
                    "decoded texture '{}' ({}x{})",
                    self.name,
                    img.width(),
                    img.height()
                );
                Some(img)
            }
            Ok(_) => {
                log::warn!("texture '{}' is empty, falling back to material color", self.name);
                None
            }
            Err(e) => {
                log::warn!(
                    "texture '{}' is unreadable ({}), falling back to material color",
                    self.name,
                    e
                );
                None
            }
        }
    }

    /// Nearest-neighbour sample at `uv`, returning linear RGB in 0-1.
    ///
    /// V is flipped so that `v = 1` addresses the first image row, and
    /// coordinates outside 0-1 wrap around.
    pub fn sample_nearest(&self, uv: Vec2) -> Option<Vec3> {
        let img = self.pixels()?;
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return None;
        }

        let x = ((uv.x * width as f32).floor() as i64).rem_euclid(width as i64) as u32;
        let y = (((1.0 - uv.y) * height as f32).floor() as i64).rem_euclid(height as i64) as u32;

        let px = img.get_pixel(x, y).0;
        Some(Vec3::new(
            px[0] as f32 / 255.0,
            px[1] as f32 / 255.0,
            px[2] as f32 / 255.0,
        ))
    }
}
