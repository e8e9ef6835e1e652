//! Captured pixel buffers.

use image::{imageops, DynamicImage, RgbaImage};

use crate::error::{CaptureFailure, ExportError};

/// A captured region: an RGBA pixel buffer with a non-zero width and height.
///
/// Blocks are immutable once captured; pagination only reads their
/// dimensions and slicing copies rows out into new buffers.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterBlock {
    pixels: RgbaImage,
}

impl RasterBlock {
    /// Wraps an RGBA buffer, rejecting zero-area captures.
    pub fn new(pixels: RgbaImage) -> Result<Self, CaptureFailure> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(CaptureFailure::ZeroArea { width, height });
        }
        Ok(Self { pixels })
    }

    /// Converts any decoded image into a block.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, CaptureFailure> {
        Self::new(image.into_rgba8())
    }

    /// Decodes an encoded image (PNG, JPEG, ...) into a block.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, CaptureFailure> {
        let image = image::load_from_memory(bytes)?;
        Self::from_dynamic(image)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels; the axis pagination slices along.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// The captured RGBA buffer.
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Copies `height` full-width rows starting at row `y` into a new buffer.
    pub fn slice(&self, y: u32, height: u32) -> Result<RgbaImage, ExportError> {
        let end = y.checked_add(height);
        if height == 0 || end.map_or(true, |end| end > self.height()) {
            return Err(ExportError::Encoding(format!(
                "slice of {height} rows at offset {y} does not fit a block {} rows tall",
                self.height()
            )));
        }
        Ok(imageops::crop_imm(&self.pixels, 0, y, self.width(), height).to_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn striped(width: u32, height: u32) -> RasterBlock {
        let pixels = RgbaImage::from_fn(width, height, |_, y| Rgba([y as u8, 0, 0, 255]));
        RasterBlock::new(pixels).expect("non-empty block")
    }

    #[test]
    fn rejects_zero_area() {
        assert!(matches!(
            RasterBlock::new(RgbaImage::new(0, 10)),
            Err(CaptureFailure::ZeroArea { width: 0, height: 10 })
        ));
        assert!(matches!(
            RasterBlock::new(RgbaImage::new(10, 0)),
            Err(CaptureFailure::ZeroArea { .. })
        ));
    }

    #[test]
    fn slice_copies_requested_rows() {
        let block = striped(4, 10);
        let slice = block.slice(3, 4).expect("slice in range");
        assert_eq!(slice.dimensions(), (4, 4));
        assert_eq!(slice.get_pixel(0, 0)[0], 3);
        assert_eq!(slice.get_pixel(3, 3)[0], 6);
    }

    #[test]
    fn slice_past_the_end_is_an_encoding_error() {
        let block = striped(4, 10);
        assert!(matches!(block.slice(8, 3), Err(ExportError::Encoding(_))));
        assert!(matches!(block.slice(0, 0), Err(ExportError::Encoding(_))));
        assert!(matches!(block.slice(u32::MAX, 2), Err(ExportError::Encoding(_))));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(
            RasterBlock::from_encoded(b"not an image"),
            Err(CaptureFailure::Image(_))
        ));
    }
}
