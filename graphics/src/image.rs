//! Image decoding into packed RGBA8 pixels.

use std::path::Path;

use crate::error::GraphicsError;

/// Decoded image: tightly packed RGBA8 rows, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl ImageData {
    /// Wrap already decoded RGBA8 pixels.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if `pixels` is not exactly
    /// `width * height * 4` bytes or either dimension is zero.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, GraphicsError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(GraphicsError::InvalidParameter(format!(
                "{width}x{height} RGBA8 image needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// An image filled with one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: rgba.repeat(count),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed pixel bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

/// Decode a PNG or JPEG file, converting to RGBA8.
///
/// # Errors
///
/// Returns [`GraphicsError::ImageDecode`] if the file is missing or cannot
/// be decoded.
pub fn decode_image(path: impl AsRef<Path>) -> Result<ImageData, GraphicsError> {
    let rgba = ::image::open(path.as_ref())?.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(ImageData {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba8_checks_length() {
        assert!(ImageData::from_rgba8(2, 2, vec![0; 16]).is_ok());
        assert!(ImageData::from_rgba8(2, 2, vec![0; 15]).is_err());
        assert!(ImageData::from_rgba8(0, 2, Vec::new()).is_err());
    }

    #[test]
    fn test_solid() {
        let image = ImageData::solid(2, 1, [1, 2, 3, 4]);
        assert_eq!(image.pixels(), &[1, 2, 3, 4, 1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.png");
        let mut img = ::image::RgbaImage::new(2, 1);
        img.put_pixel(0, 0, ::image::Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, ::image::Rgba([0, 0, 255, 128]));
        img.save(&path).unwrap();

        let decoded = decode_image(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (2, 1));
        assert_eq!(decoded.pixels(), &[255, 0, 0, 255, 0, 0, 255, 128]);
    }

    #[test]
    fn test_decode_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            decode_image(dir.path().join("missing.jpg")),
            Err(GraphicsError::ImageDecode(_))
        ));
    }
}
