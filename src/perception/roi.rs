//! Region of interest for line detection

use glam::Vec2;
use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::map::map_colors2;
use imageproc::rect::Rect;

use crate::settings::RoiConfig;

/// Rectangular region of interest in pixel coordinates (inclusive).
///
/// Edges may lie outside the frame; masking clips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Roi {
    pub fn from_config(config: &RoiConfig, width: u32, height: u32) -> Self {
        let (w, h) = (width as i32, height as i32);
        Self {
            left: config.left,
            top: h / 2 + config.top_offset,
            right: w + config.right_extend,
            bottom: 2 * h / 3 + config.bottom_offset,
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    /// Corners clockwise from top-left, for overlays
    pub fn polygon(&self) -> [Vec2; 4] {
        let (l, t, r, b) = (self.left as f32, self.top as f32, self.right as f32, self.bottom as f32);
        [Vec2::new(l, t), Vec2::new(r, t), Vec2::new(r, b), Vec2::new(l, b)]
    }

    /// Binary mask of the region, 255 inside
    pub fn mask(&self, width: u32, height: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        if self.right >= self.left && self.bottom >= self.top {
            let w = (self.right - self.left + 1) as u32;
            let h = (self.bottom - self.top + 1) as u32;
            draw_filled_rect_mut(&mut mask, Rect::at(self.left, self.top).of_size(w, h), Luma([255]));
        }
        mask
    }

    /// Bitwise AND of `img` with the region mask
    pub fn apply(&self, img: &GrayImage) -> GrayImage {
        let mask = self.mask(img.width(), img.height());
        map_colors2(img, &mask, |p: Luma<u8>, m: Luma<u8>| Luma([p[0] & m[0]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_band_rows() {
        let roi = Roi::from_config(&RoiConfig::default(), 800, 600);
        assert_eq!((roi.top, roi.bottom), (270, 380));
        assert_eq!((roi.left, roi.right), (-50, 950));
        assert!(roi.contains(0, 300));
        assert!(!roi.contains(0, 381));
    }

    #[test]
    fn test_apply_masks_outside() {
        let roi = Roi::from_config(&RoiConfig::default(), 800, 600);
        let masked = roi.apply(&GrayImage::from_pixel(800, 600, Luma([255])));
        assert_eq!(masked.get_pixel(0, 269)[0], 0);
        assert_eq!(masked.get_pixel(0, 270)[0], 255);
        assert_eq!(masked.get_pixel(799, 380)[0], 255);
        assert_eq!(masked.get_pixel(400, 381)[0], 0);
    }

    #[test]
    fn test_empty_region_masks_everything() {
        let roi = Roi {
            left: 0,
            top: 50,
            right: 10,
            bottom: 40,
        };
        let masked = roi.apply(&GrayImage::from_pixel(20, 60, Luma([255])));
        assert!(masked.as_raw().iter().all(|&p| p == 0));
    }
}
