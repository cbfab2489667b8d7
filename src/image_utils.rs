/*!
 * Captured image handling for vision providers.
 *
 * [`ImageData`] is a cheap-to-clone handle over a decoded bitmap. Network
 * providers upload it as base64 JPEG; the PaddleOCR command line reads it
 * from a temporary PNG file.
 */

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{ColorType, DynamicImage, ImageOutputFormat, RgbaImage};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

use crate::errors::ProviderError;
use crate::models::ImageSize;

/// JPEG quality used when uploading screenshots
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// A captured bitmap
#[derive(Clone)]
pub struct ImageData {
    image: Arc<DynamicImage>,
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

impl ImageData {
    pub fn new(image: DynamicImage) -> Self {
        Self { image: Arc::new(image) }
    }

    /// Wrap raw RGBA8 pixels as produced by a screen capture
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ProviderError> {
        let buffer = RgbaImage::from_raw(width, height, pixels).ok_or_else(|| {
            ProviderError::ImageEncodingFailed(format!(
                "pixel buffer does not match {}x{} RGBA",
                width, height
            ))
        })?;
        Ok(Self::new(DynamicImage::ImageRgba8(buffer)))
    }

    /// Decode an encoded image (PNG, JPEG)
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, ProviderError> {
        image::load_from_memory(bytes)
            .map(Self::new)
            .map_err(|e| ProviderError::ImageEncodingFailed(e.to_string()))
    }

    /// Load an image file from disk
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let image = image::open(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to open image {:?}: {}", path.as_ref(), e))?;
        Ok(Self::new(image))
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.image.width(), self.image.height())
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    /// Encode as JPEG, dropping any alpha channel
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, ProviderError> {
        if self.is_empty() {
            return Err(ProviderError::ImageEncodingFailed("image has no pixels".to_string()));
        }
        let rgb = self.image.to_rgb8();
        let mut bytes = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
        encoder
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| ProviderError::ImageEncodingFailed(e.to_string()))?;
        Ok(bytes)
    }

    pub fn to_jpeg_base64(&self, quality: u8) -> Result<String, ProviderError> {
        Ok(STANDARD.encode(self.to_jpeg(quality)?))
    }

    pub fn to_png(&self) -> Result<Vec<u8>, ProviderError> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .map_err(|e| ProviderError::ImageEncodingFailed(e.to_string()))?;
        Ok(bytes)
    }

    pub fn to_png_base64(&self) -> Result<String, ProviderError> {
        Ok(STANDARD.encode(self.to_png()?))
    }

    /// Write a PNG into a temp file that is removed when the handle drops
    pub fn write_temp_png(&self) -> Result<NamedTempFile, ProviderError> {
        let png = self.to_png()?;
        let mut file = tempfile::Builder::new()
            .prefix("screentrans-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| ProviderError::ImageEncodingFailed(format!("temp file: {}", e)))?;
        file.write_all(&png)
            .and_then(|_| file.flush())
            .map_err(|e| ProviderError::ImageEncodingFailed(format!("temp file: {}", e)))?;
        Ok(file)
    }
}
