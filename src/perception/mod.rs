//! Lane perception
//!
//! Frame -> grayscale -> contrast -> blur -> Canny -> dilate -> ROI mask ->
//! Hough lines cut into segments -> classified segments -> lane center and
//! slope. The image stages are `imageproc` operators.
//!
//! No detected segments is a normal outcome (`lane_center == None`), not an
//! error. Only unusable frames fail.

pub mod frame;
pub mod hough;
pub mod roi;
pub mod worker;

pub use frame::Frame;
pub use roi::Roi;
pub use worker::PerceptionWorker;

use glam::Vec2;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::map::map_colors;
use imageproc::morphology::dilate;
use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::settings::PerceptionConfig;

/// Lane marking style, judged by segment length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineKind {
    Solid,
    Dashed,
}

/// A detected marking segment in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub a: Vec2,
    pub b: Vec2,
    pub kind: LineKind,
}

impl LineSegment {
    /// Classify by endpoint distance: longer than `solid_threshold` is solid
    pub fn classify(a: Vec2, b: Vec2, solid_threshold: f32) -> Self {
        let kind = if a.distance(b) > solid_threshold {
            LineKind::Solid
        } else {
            LineKind::Dashed
        };
        Self { a, b, kind }
    }

    pub fn length(&self) -> f32 {
        self.a.distance(self.b)
    }

    pub fn midpoint(&self) -> Vec2 {
        (self.a + self.b) * 0.5
    }

    /// dy/dx, `None` for vertical segments
    pub fn slope(&self) -> Option<f32> {
        let dx = self.b.x - self.a.x;
        if dx == 0.0 {
            None
        } else {
            Some((self.b.y - self.a.y) / dx)
        }
    }
}

/// Result of one perception pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneObservation {
    pub segments: Vec<LineSegment>,
    /// Centroid of segment midpoints
    pub lane_center: Option<Vec2>,
    /// Mean slope over non-vertical segments (0 if all are vertical)
    pub average_slope: Option<f32>,
}

impl LaneObservation {
    pub fn from_segments(segments: Vec<LineSegment>) -> Self {
        if segments.is_empty() {
            return Self::default();
        }
        let n = segments.len() as f32;
        let center = segments.iter().map(LineSegment::midpoint).sum::<Vec2>() / n;

        let slopes: Vec<f32> = segments.iter().filter_map(LineSegment::slope).collect();
        let average_slope = if slopes.is_empty() {
            0.0
        } else {
            slopes.iter().sum::<f32>() / slopes.len() as f32
        };

        Self {
            segments,
            lane_center: Some(center),
            average_slope: Some(average_slope),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn count(&self, kind: LineKind) -> usize {
        self.segments.iter().filter(|s| s.kind == kind).count()
    }
}

/// Stateless image-to-lane estimator
#[derive(Debug, Clone, Default)]
pub struct PerceptionPipeline {
    config: PerceptionConfig,
}

impl PerceptionPipeline {
    pub fn new(config: PerceptionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PerceptionConfig {
        &self.config
    }

    pub fn roi(&self, width: u32, height: u32) -> Roi {
        Roi::from_config(&self.config.roi, width, height)
    }

    /// Masked, dilated edge map that feeds line detection
    pub fn edge_map(&self, frame: &Frame) -> GrayImage {
        let gray = image::imageops::grayscale(frame.image());
        let alpha = self.config.contrast;
        let contrasted = map_colors(&gray, |p: Luma<u8>| Luma([(alpha * f32::from(p[0])).abs().round().min(255.0) as u8]));
        let blurred = gaussian_blur_f32(&contrasted, self.config.blur_sigma);
        let edges = canny(&blurred, self.config.canny_low, self.config.canny_high);
        let dilated = dilate(&edges, Norm::LInf, 1);
        self.roi(frame.width(), frame.height()).apply(&dilated)
    }

    pub fn detect_segments(&self, frame: &Frame) -> Vec<LineSegment> {
        let edges = self.edge_map(frame);
        hough::detect_segments(&edges, &self.config.hough)
            .into_iter()
            .map(|[x1, y1, x2, y2]| {
                LineSegment::classify(
                    Vec2::new(x1 as f32, y1 as f32),
                    Vec2::new(x2 as f32, y2 as f32),
                    self.config.solid_line_threshold,
                )
            })
            .collect()
    }

    /// Full pass: frame to lane estimate
    pub fn process(&self, frame: &Frame) -> SimResult<LaneObservation> {
        let segments = self.detect_segments(frame);
        let observation = LaneObservation::from_segments(segments);
        log::debug!(
            "Perception: {} segments ({} solid), center {:?}",
            observation.segments.len(),
            observation.count(LineKind::Solid),
            observation.lane_center
        );
        Ok(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use image::{Rgb, RgbImage};

    fn seg(x1: f32, y1: f32, x2: f32, y2: f32) -> LineSegment {
        LineSegment::classify(Vec2::new(x1, y1), Vec2::new(x2, y2), 200.0)
    }

    #[test]
    fn test_classification_threshold() {
        assert_eq!(seg(0.0, 0.0, 300.0, 0.0).kind, LineKind::Solid);
        assert_eq!(seg(0.0, 0.0, 200.0, 0.0).kind, LineKind::Dashed);
        assert_eq!(seg(0.0, 0.0, 120.0, 160.0).kind, LineKind::Dashed);
    }

    #[test]
    fn test_empty_observation() {
        let obs = LaneObservation::from_segments(Vec::new());
        assert!(obs.lane_center.is_none());
        assert!(obs.average_slope.is_none());
        assert!(obs.is_empty());
    }

    #[test]
    fn test_center_is_mean_of_midpoints() {
        let obs = LaneObservation::from_segments(vec![seg(0.0, 0.0, 100.0, 0.0), seg(200.0, 100.0, 300.0, 100.0)]);
        assert_eq!(obs.lane_center, Some(Vec2::new(150.0, 50.0)));
        assert_eq!(obs.average_slope, Some(0.0));
    }

    #[test]
    fn test_vertical_segment_excluded_from_slope() {
        let sloped = vec![seg(0.0, 0.0, 10.0, 10.0), seg(0.0, 0.0, 10.0, 30.0)];
        let base = LaneObservation::from_segments(sloped.clone());
        assert_eq!(base.average_slope, Some(2.0));

        let mut with_vertical = sloped;
        with_vertical.push(seg(50.0, 0.0, 50.0, 100.0));
        let obs = LaneObservation::from_segments(with_vertical);
        assert_eq!(obs.average_slope, Some(2.0));
        // but the vertical segment still moves the center
        assert_ne!(obs.lane_center, base.lane_center);
    }

    #[test]
    fn test_all_vertical_slope_defaults_to_zero() {
        let obs = LaneObservation::from_segments(vec![seg(5.0, 0.0, 5.0, 100.0)]);
        assert_eq!(obs.average_slope, Some(0.0));
        assert_eq!(obs.lane_center, Some(Vec2::new(5.0, 50.0)));
    }

    #[test]
    fn test_blank_frame_has_no_lane() {
        let frame = Frame::from_image(RgbImage::from_pixel(160, 120, Rgb([60, 60, 60]))).unwrap();
        let obs = PerceptionPipeline::default().process(&frame).unwrap();
        assert!(obs.lane_center.is_none());
        assert!(obs.average_slope.is_none());
    }

    #[test]
    fn test_malformed_buffer_is_invalid_frame() {
        let err = Frame::from_raw(10, 10, vec![0; 10])
            .and_then(|frame| PerceptionPipeline::default().process(&frame))
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidFrame(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_horizontal_marking_detected_in_roi() {
        // white band across the frame inside the ROI rows (270..=380)
        let mut img = RgbImage::from_pixel(800, 600, Rgb([50, 50, 50]));
        for y in 310..318 {
            for x in 0..800 {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let frame = Frame::from_image(img).unwrap();
        let obs = PerceptionPipeline::default().process(&frame).unwrap();
        assert!(!obs.is_empty());
        assert!(obs.count(LineKind::Solid) >= 1);
        let slope = obs.average_slope.unwrap();
        assert!(slope.abs() < 0.05, "slope {slope}");
        let center = obs.lane_center.unwrap();
        assert!(center.y > 300.0 && center.y < 325.0, "center {center:?}");
    }

    #[test]
    fn test_marking_outside_roi_ignored() {
        let mut img = RgbImage::from_pixel(800, 600, Rgb([50, 50, 50]));
        for y in 100..108 {
            for x in 0..800 {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let frame = Frame::from_image(img).unwrap();
        let obs = PerceptionPipeline::default().process(&frame).unwrap();
        assert!(obs.is_empty());
    }
}
