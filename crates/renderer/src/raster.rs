//! RGBA raster produced by the colorizer.

use crate::png::encode_png_auto;
use crate::RenderError;

/// Row-major RGBA image, 4 bytes per pixel, row 0 at the top (north).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) pixels: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self, RenderError> {
        let expected = width * height * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(RenderError::InvalidDimensions {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA at column `x`, row `y`.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Number of pixels with non-zero alpha.
    pub fn opaque_count(&self) -> usize {
        self.pixels.chunks_exact(4).filter(|p| p[3] != 0).count()
    }

    /// Encode as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        encode_png_auto(&self.pixels, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_length() {
        assert!(RasterImage::new(2, 2, vec![0; 16]).is_ok());
        assert!(RasterImage::new(2, 2, vec![0; 15]).is_err());
        assert!(RasterImage::new(0, 2, vec![]).is_err());
    }

    #[test]
    fn test_pixel_lookup() {
        let mut pixels = vec![0; 2 * 3 * 4];
        pixels[(2 * 2 + 1) * 4..(2 * 2 + 2) * 4].copy_from_slice(&[1, 2, 3, 4]);
        let image = RasterImage::new(2, 3, pixels).unwrap();

        assert_eq!(image.pixel(1, 2), Some([1, 2, 3, 4]));
        assert_eq!(image.pixel(2, 0), None);
        assert_eq!(image.opaque_count(), 1);
    }

    #[test]
    fn test_encode_png_signature() {
        let image = RasterImage::new(1, 1, vec![0, 0, 0, 0]).unwrap();
        let png = image.encode_png().unwrap();
        assert_eq!(&png[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }
}
