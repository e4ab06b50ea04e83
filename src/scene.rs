//! Synthetic camera frames and overlay annotations
//!
//! The camera looks straight down from above the vehicle, forward is up the
//! image and the vehicle sits at the bottom-center pixel. Each pixel is mapped
//! back to world coordinates, so heading and lateral offset move the road in
//! the frame the way a mounted camera would see it.
//!
//! World lateral axis points left; image x points right.

use glam::Vec2;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::map::map_colors2;
use imageproc::point::Point;
use serde::Serialize;

use crate::error::SimResult;
use crate::perception::{Frame, LineKind, LineSegment, Roi};
use crate::sim::road::{GREENERY_COLOR, RoadSurfaceModel};
use crate::sim::state::{ControlInput, VehicleState};

/// Image scale (px per m)
pub const PIXELS_PER_METER: f32 = 20.0;
/// Lateral offsets of the lane markings (m)
pub const MARKING_OFFSETS: [f32; 3] = [-3.5, 0.0, 3.5];
/// Marking stripe width (m)
pub const MARKING_WIDTH: f32 = 0.3;
/// Road half width (m); the road fills roughly the middle third of the default frame
pub const ROAD_HALF_WIDTH: f32 = 6.5;
/// Center line dash and gap length (m)
pub const DASH_LENGTH: f32 = 3.0;
pub const DASH_GAP: f32 = 3.0;

const MARKING_COLOR: [u8; 3] = [255, 255, 255];

pub const SOLID_COLOR: [u8; 3] = [0, 255, 0];
pub const DASHED_COLOR: [u8; 3] = [255, 0, 0];
pub const ROI_COLOR: [u8; 3] = [255, 255, 0];
const LINE_THICKNESS: f32 = 10.0;
const ROI_THICKNESS: f32 = 2.0;

/// Rasterizes the road around the vehicle
#[derive(Debug, Clone)]
pub struct SceneRenderer {
    width: u32,
    height: u32,
    road: RoadSurfaceModel,
}

impl SceneRenderer {
    pub fn new(width: u32, height: u32, road: RoadSurfaceModel) -> Self {
        Self { width, height, road }
    }

    /// Color of the world point at `(longitudinal, lateral)`
    fn world_color(&self, longitudinal: f32, lateral: f32) -> [u8; 3] {
        if lateral.abs() > ROAD_HALF_WIDTH {
            return GREENERY_COLOR;
        }
        let half = MARKING_WIDTH / 2.0;
        for &offset in &MARKING_OFFSETS {
            if (lateral - offset).abs() <= half {
                let dashed = offset == 0.0;
                if !dashed || longitudinal.rem_euclid(DASH_LENGTH + DASH_GAP) < DASH_LENGTH {
                    return MARKING_COLOR;
                }
            }
        }
        self.road.road_type_at(f64::from(longitudinal)).color()
    }

    /// Render the view from `state`
    pub fn render(&self, state: &VehicleState) -> SimResult<Frame> {
        let cx = self.width as f32 / 2.0;
        let h = self.height as f32;
        let (sin, cos) = (state.orientation as f32).sin_cos();
        let (x0, y0) = (state.position as f32, state.lateral_position as f32);

        let image = RgbImage::from_fn(self.width, self.height, |col, row| {
            // vehicle frame
            let forward = (h - row as f32) / PIXELS_PER_METER;
            let left = (cx - col as f32) / PIXELS_PER_METER;
            // world frame
            let longitudinal = x0 + forward * cos - left * sin;
            let lateral = y0 + forward * sin + left * cos;
            Rgb(self.world_color(longitudinal, lateral))
        });
        Frame::from_image(image)
    }
}

/// Vehicle sprite placement in world units
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpritePose {
    pub x: f64,
    pub y: f64,
    /// Counter-clockwise degrees; opposite sign to the steering angle
    pub rotation_deg: f64,
}

impl SpritePose {
    pub fn new(state: &VehicleState, control: &ControlInput) -> Self {
        let theta = state.orientation;
        Self {
            x: state.position + 5.0 * theta.cos(),
            y: state.lateral_position - 5.0 * theta.sin(),
            rotation_deg: -control.steering_angle().to_degrees(),
        }
    }
}

/// Everything drawn on top of a camera frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub segments: Vec<LineSegment>,
    pub roi: [Vec2; 4],
    pub sprite: SpritePose,
}

impl Overlay {
    pub fn new(segments: Vec<LineSegment>, roi: &Roi, sprite: SpritePose) -> Self {
        Self {
            segments,
            roi: roi.polygon(),
            sprite,
        }
    }

    /// Blend the annotations onto `frame`: `0.8 * frame + layer + 1`, saturating
    pub fn annotate(&self, frame: &Frame) -> RgbImage {
        let (w, h) = (frame.width(), frame.height());
        let mut layer = RgbImage::new(w, h);
        for segment in &self.segments {
            let color = match segment.kind {
                LineKind::Solid => SOLID_COLOR,
                LineKind::Dashed => DASHED_COLOR,
            };
            draw_thick_line(&mut layer, segment.a, segment.b, LINE_THICKNESS, color);
        }
        for i in 0..self.roi.len() {
            let next = self.roi[(i + 1) % self.roi.len()];
            draw_thick_line(&mut layer, self.roi[i], next, ROI_THICKNESS, ROI_COLOR);
        }

        map_colors2(frame.image(), &layer, |p: Rgb<u8>, q: Rgb<u8>| {
            Rgb(std::array::from_fn(|c| {
                (0.8 * f32::from(p[c]) + f32::from(q[c]) + 1.0).round().min(255.0) as u8
            }))
        })
    }
}

/// Fill the band of width `thickness` around segment `a-b`
fn draw_thick_line(img: &mut RgbImage, a: Vec2, b: Vec2, thickness: f32, color: [u8; 3]) {
    let half = thickness / 2.0;
    let Some(dir) = (b - a).try_normalize() else {
        draw_filled_circle_mut(img, (a.x.round() as i32, a.y.round() as i32), half.round() as i32, Rgb(color));
        return;
    };
    let n = dir.perp() * half;
    let corner = |p: Vec2| Point::new(p.x.round() as i32, p.y.round() as i32);
    let quad = [corner(a + n), corner(b + n), corner(b - n), corner(a - n)];
    if quad[0] == quad[3] {
        // thinner than a pixel
        draw_line_segment_mut(img, (a.x, a.y), (b.x, b.y), Rgb(color));
    } else {
        draw_polygon_mut(img, &quad, Rgb(color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{SCREEN_HEIGHT, SCREEN_WIDTH};
    use crate::perception::PerceptionPipeline;

    fn renderer() -> SceneRenderer {
        SceneRenderer::new(SCREEN_WIDTH, SCREEN_HEIGHT, RoadSurfaceModel::default())
    }

    #[test]
    fn test_centered_frame_layout() {
        let frame = renderer().render(&VehicleState::default()).unwrap();
        let img = frame.image();
        let row = 300;
        // solid edge markings at +-3.5 m -> 400 -+ 70 px
        assert_eq!(img.get_pixel(330, row).0, MARKING_COLOR);
        assert_eq!(img.get_pixel(470, row).0, MARKING_COLOR);
        // asphalt between, greenery outside the road
        assert_eq!(img.get_pixel(365, row).0, [50, 50, 50]);
        assert_eq!(img.get_pixel(10, row).0, GREENERY_COLOR);
        assert_eq!(img.get_pixel(790, row).0, GREENERY_COLOR);
    }

    #[test]
    fn test_center_line_is_dashed() {
        let frame = renderer().render(&VehicleState::default()).unwrap();
        let column: Vec<bool> = (0..SCREEN_HEIGHT)
            .map(|row| frame.image().get_pixel(400, row).0 == MARKING_COLOR)
            .collect();
        assert!(column.iter().any(|&m| m));
        assert!(column.iter().any(|&m| !m));
    }

    #[test]
    fn test_lateral_offset_shifts_markings() {
        // vehicle 1 m left of center: markings appear 20 px further right
        let state = VehicleState {
            lateral_position: 1.0,
            ..Default::default()
        };
        let frame = renderer().render(&state).unwrap();
        assert_eq!(frame.image().get_pixel(350, 300).0, MARKING_COLOR);
        assert_eq!(frame.image().get_pixel(490, 300).0, MARKING_COLOR);
        assert_ne!(frame.image().get_pixel(330, 300).0, MARKING_COLOR);
    }

    #[test]
    fn test_road_color_follows_surface() {
        let state = VehicleState {
            position: 150.0,
            ..Default::default()
        };
        let frame = renderer().render(&state).unwrap();
        assert_eq!(frame.image().get_pixel(365, 590).0, [139, 69, 19]);
    }

    #[test]
    fn test_perceived_center_near_screen_center() {
        let pipeline = PerceptionPipeline::default();
        let frame = renderer().render(&VehicleState::default()).unwrap();
        let obs = pipeline.process(&frame).unwrap();
        let center = obs.lane_center.expect("markings detected");
        assert!((center.x - 400.0).abs() < 25.0, "center {center:?}");

        // offset to the left: lane center moves right of the screen center
        let shifted = VehicleState {
            lateral_position: 2.0,
            ..Default::default()
        };
        let obs = pipeline.process(&renderer().render(&shifted).unwrap()).unwrap();
        let moved = obs.lane_center.expect("markings detected");
        assert!(moved.x > center.x, "{moved:?} vs {center:?}");
    }

    #[test]
    fn test_sprite_pose() {
        let state = VehicleState {
            position: 10.0,
            lateral_position: 2.0,
            orientation: std::f64::consts::FRAC_PI_2,
            ..Default::default()
        };
        let pose = SpritePose::new(&state, &ControlInput::new(0.0, 0.0, 0.1));
        assert!((pose.x - 10.0).abs() < 1e-9);
        assert!((pose.y + 3.0).abs() < 1e-9);
        assert!((pose.rotation_deg + 0.1f64.to_degrees()).abs() < 1e-9);
    }

    #[test]
    fn test_annotate_blends_colors() {
        let frame = Frame::from_image(RgbImage::from_pixel(100, 100, Rgb([100, 100, 100]))).unwrap();
        let segment = LineSegment::classify(Vec2::new(10.0, 50.0), Vec2::new(90.0, 50.0), 200.0);
        let roi = Roi {
            left: 0,
            top: 0,
            right: 99,
            bottom: 99,
        };
        let sprite = SpritePose::new(&VehicleState::default(), &ControlInput::IDLE);
        let out = Overlay::new(vec![segment], &roi, sprite).annotate(&frame);
        // dashed -> red on top of 0.8 * 100 + 1
        assert_eq!(out.get_pixel(50, 50).0, [255, 81, 81]);
        // untouched pixel is just dimmed
        assert_eq!(out.get_pixel(50, 30).0, [81, 81, 81]);
        // ROI border is yellow
        assert_eq!(out.get_pixel(50, 0).0, [255, 255, 81]);
    }
}
