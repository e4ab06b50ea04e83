//! Line segments from the masked edge map
//!
//! `imageproc` votes for infinite lines in (r, angle) space. Each accepted
//! line is then walked across the edge map and cut into segments: gaps up to
//! `max_line_gap` pixels are bridged and only runs spanning at least
//! `min_line_length` pixels along x or y are kept.

use image::GrayImage;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};

use crate::settings::HoughConfig;

/// Integer endpoints `[x1, y1, x2, y2]`
pub type RawSegment = [i32; 4];

/// Pixels either side of the walked line that still count as on it.
/// Vote bins truncate r, so the true edge row can sit one pixel off.
const NORMAL_TOLERANCE: i32 = 1;

/// Detect line segments in a binary edge image
pub fn detect_segments(edges: &GrayImage, config: &HoughConfig) -> Vec<RawSegment> {
    let options = LineDetectionOptions {
        vote_threshold: config.vote_threshold,
        suppression_radius: config.suppression_radius,
    };
    detect_lines(edges, options)
        .iter()
        .flat_map(|line| segments_along(edges, line, config))
        .collect()
}

fn edge_at(edges: &GrayImage, x: i32, y: i32) -> bool {
    x >= 0 && y >= 0 && (x as u32) < edges.width() && (y as u32) < edges.height() && edges.get_pixel(x as u32, y as u32)[0] > 0
}

fn close_run(out: &mut Vec<RawSegment>, (start, end): ((i32, i32), (i32, i32)), min_len: u32) {
    let min_len = min_len as i32;
    if (end.0 - start.0).abs() >= min_len || (end.1 - start.1).abs() >= min_len {
        out.push([start.0, start.1, end.0, end.1]);
    }
}

/// Cut one polar line into supported segments
fn segments_along(edges: &GrayImage, line: &PolarLine, config: &HoughConfig) -> Vec<RawSegment> {
    let (sin, cos) = (line.angle_in_degrees as f32).to_radians().sin_cos();
    let foot = (line.r * cos, line.r * sin);
    let dir = (-sin, cos);
    let reach = (edges.width() + edges.height()) as i32;

    let mut out = Vec::new();
    let mut run: Option<((i32, i32), (i32, i32))> = None;
    let mut gap = 0u32;
    let mut previous = None;

    for step in -reach..=reach {
        let t = step as f32;
        let (x, y) = ((foot.0 + t * dir.0).round() as i32, (foot.1 + t * dir.1).round() as i32);
        if previous == Some((x, y)) {
            continue;
        }
        previous = Some((x, y));

        // nearest hit across the line, center first
        let hit = std::iter::once(0)
            .chain((1..=NORMAL_TOLERANCE).flat_map(|k| [-k, k]))
            .map(|k| ((x as f32 + k as f32 * cos).round() as i32, (y as f32 + k as f32 * sin).round() as i32))
            .find(|&(hx, hy)| edge_at(edges, hx, hy));

        match (hit, run) {
            (Some(p), Some((start, _))) => {
                run = Some((start, p));
                gap = 0;
            }
            (Some(p), None) => {
                run = Some((p, p));
                gap = 0;
            }
            (None, Some(r)) => {
                gap += 1;
                if gap > config.max_line_gap {
                    close_run(&mut out, r, config.min_line_length);
                    run = None;
                }
            }
            (None, None) => {}
        }
    }
    if let Some(r) = run {
        close_run(&mut out, r, config.min_line_length);
    }
    out
}
