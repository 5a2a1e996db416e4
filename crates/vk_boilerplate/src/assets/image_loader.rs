//! Image loading utilities for texture data
//!
//! PNG and JPEG files are decoded with the `image` crate and converted to
//! tightly packed RGBA8, the layout [`Texture::from_rgba8`] uploads.
//!
//! [`Texture::from_rgba8`]: crate::render::vulkan::Texture::from_rgba8

use std::path::Path;

use crate::assets::AssetError;

/// Loaded image data ready for GPU upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageData {
    /// Load an image from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }

        log::debug!("Loading image from: {:?}", path);

        let img = image::open(path)
            .map_err(|e| AssetError::LoadFailed(format!("{}: {}", path.display(), e)))?;
        let image = Self::from_dynamic(img);

        log::info!("Loaded image {}x{} from {:?}", image.width, image.height, path);
        Ok(image)
    }

    /// Decode an encoded image held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| AssetError::LoadFailed(format!("Failed to load image from bytes: {}", e)))?;
        Ok(Self::from_dynamic(img))
    }

    /// Wrap already-decoded RGBA8 pixels
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self, AssetError> {
        if data.len() != (width as usize) * (height as usize) * 4 {
            return Err(AssetError::InvalidData(format!(
                "{} bytes is not a {}x{} RGBA8 image",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self { data, width, height })
    }

    /// Create a solid color image (useful for testing and defaults)
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = (width * height) as usize;
        Self {
            data: color.repeat(pixel_count),
            width,
            height,
        }
    }

    /// Get the size of the image data in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    fn from_dynamic(img: image::DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            data: rgba.into_raw(),
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(img: image::DynamicImage, format: image::ImageFormat) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, format).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_solid_color_image() {
        let img = ImageData::solid_color(4, 4, [255, 0, 0, 255]);
        assert_eq!(img.width, 4);
        assert_eq!(img.height, 4);
        assert_eq!(img.size_bytes(), 4 * 4 * 4);
        assert_eq!(&img.data[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_png_rgb_expands_to_rgba() {
        let rgb = image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        let bytes = encode(image::DynamicImage::ImageRgb8(rgb), image::ImageFormat::Png);

        let img = ImageData::from_bytes(&bytes).unwrap();
        assert_eq!((img.width, img.height), (3, 2));
        assert_eq!(img.size_bytes(), 3 * 2 * 4);
        assert_eq!(&img.data[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_jpeg_decodes() {
        let rgb = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 200, 200]));
        let bytes = encode(image::DynamicImage::ImageRgb8(rgb), image::ImageFormat::Jpeg);

        let img = ImageData::from_bytes(&bytes).unwrap();
        assert_eq!((img.width, img.height), (8, 8));
        assert_eq!(img.data[3], 255);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let result = ImageData::from_file("definitely/not/here.png");
        assert!(matches!(result, Err(AssetError::NotFound(_))));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(ImageData::from_bytes(b"not an image").is_err());
        assert!(ImageData::from_rgba8(2, 2, vec![0; 15]).is_err());
    }
}
