use crate::utils::error::LeafGuardError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::Path;

/// Upload and file size cap
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// Largest accepted edge in pixels
pub const MAX_IMAGE_EDGE: u32 = 8192;

/// Decodes bitmaps handed to the classifier.
pub struct ImageLoader;

impl ImageLoader {
    /// Load an image from a base64 string, with or without a `data:` URL prefix
    pub fn from_base64(base64_data: &str) -> Result<DynamicImage> {
        let base64_clean = match base64_data.strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
            None => base64_data,
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?;
        Self::from_bytes(&image_bytes)
    }

    /// Load an image from raw encoded bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(LeafGuardError::FileTooLarge(bytes.len(), MAX_IMAGE_BYTES));
        }
        if bytes.is_empty() {
            return Err(LeafGuardError::InvalidInput("Empty image data".to_string()));
        }

        if let Some(format) = Self::detect_format(bytes) {
            if !Self::is_supported_format(format) {
                return Err(LeafGuardError::UnsupportedFormat(format!("{:?}", format)));
            }
        }

        let image = image::load_from_memory(bytes)?;
        Self::validate_dimensions(&image)?;

        Ok(image)
    }

    /// Load an image from a file path
    pub fn from_path(path: impl AsRef<Path>) -> Result<DynamicImage> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// Sniff the image format from its magic bytes
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Bmp
                | ImageFormat::Tiff
                | ImageFormat::WebP
        )
    }

    /// Check the image is at least 1x1 and within the edge limit
    pub fn validate_dimensions(image: &DynamicImage) -> Result<()> {
        let (width, height) = image.dimensions();

        if width == 0 || height == 0 {
            return Err(LeafGuardError::InvalidInput(format!(
                "Image has no pixels: {}x{}",
                width, height
            )));
        }

        if width > MAX_IMAGE_EDGE || height > MAX_IMAGE_EDGE {
            return Err(LeafGuardError::InvalidInput(format!(
                "Image too large: {}x{}, maximum {}x{}",
                width, height, MAX_IMAGE_EDGE, MAX_IMAGE_EDGE
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image =
            DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 200, 30])));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    #[test]
    fn decodes_png_bytes() {
        let image = ImageLoader::from_bytes(&png_bytes(4, 3)).unwrap();
        assert_eq!(image.dimensions(), (4, 3));
    }

    #[test]
    fn decodes_data_url() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(2, 2));
        let data_url = format!("data:image/png;base64,{}", encoded);

        let image = ImageLoader::from_base64(&data_url).unwrap();
        assert_eq!(image.dimensions(), (2, 2));
    }

    #[test]
    fn rejects_empty_and_garbage_input() {
        assert!(matches!(
            ImageLoader::from_bytes(&[]),
            Err(LeafGuardError::InvalidInput(_))
        ));
        assert!(matches!(
            ImageLoader::from_base64("!!not base64!!"),
            Err(LeafGuardError::Base64(_))
        ));
        assert!(ImageLoader::from_bytes(b"definitely not an image").is_err());
    }
}
