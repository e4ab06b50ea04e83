//! Validated RGB frame handed to perception

use image::RgbImage;

use crate::error::{SimError, SimResult};

/// A non-empty RGB8 frame
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap a raw, row-major RGB8 buffer
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> SimResult<Self> {
        if width == 0 || height == 0 {
            return Err(SimError::InvalidFrame(format!("zero-area frame {width}x{height}")));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| SimError::InvalidFrame(format!("frame {width}x{height} too large")))?;
        if data.len() != expected {
            return Err(SimError::InvalidFrame(format!(
                "buffer holds {} bytes, {width}x{height} RGB needs {expected}",
                data.len()
            )));
        }
        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| SimError::InvalidFrame("buffer rejected".into()))?;
        Ok(Self { image })
    }

    pub fn from_image(image: RgbImage) -> SimResult<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(SimError::InvalidFrame(format!(
                "zero-area frame {}x{}",
                image.width(),
                image.height()
            )));
        }
        Ok(Self { image })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}
