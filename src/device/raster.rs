//! Triangle rasterizer of the software device.
//!
//! Vertices arrive in normalized device coordinates (`x`, `y` in `[-1, 1]` with `+y` up, `z` in
//! `[0, 1]` with smaller values nearer). Coverage is sampled at pixel centers on a fixed-point
//! grid with a top-left fill rule, so two triangles sharing an edge never both produce a fragment
//! for the same pixel. Fragments whose depth falls outside `[0, 1]` are clipped.

use glam::Vec3;

use crate::foundation::core::{Rgba, Viewport};

const SUBPIXEL_BITS: u32 = 8;
const SUBPIXEL: i64 = 1 << SUBPIXEL_BITS;
const HALF_PIXEL: i64 = SUBPIXEL / 2;

/// Triangles with a vertex further than this many pixels off-screen are dropped; clip first.
const MAX_SCREEN_EXTENT: f32 = (1 << 20) as f32;

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Rgba,
}

impl Vertex {
    pub fn new(position: Vec3, color: Rgba) -> Self {
        Self { position, color }
    }
}

/// A rasterized sample, before depth test and shading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fragment {
    pub x: u32,
    pub y: u32,
    pub depth: f32,
    pub color: Rgba,
}

#[derive(Clone, Copy, Debug)]
struct ScreenVertex {
    x: i64,
    y: i64,
    z: f64,
    color: [f64; 4],
}

impl ScreenVertex {
    fn from_ndc(v: &Vertex, viewport: Viewport) -> Option<Self> {
        let p = v.position;
        if !p.is_finite() {
            return None;
        }
        let sx = (p.x + 1.0) * 0.5 * viewport.width as f32;
        let sy = (1.0 - p.y) * 0.5 * viewport.height as f32;
        if sx.abs() > MAX_SCREEN_EXTENT || sy.abs() > MAX_SCREEN_EXTENT {
            return None;
        }
        let c = v.color;
        Some(Self {
            x: (f64::from(sx) * SUBPIXEL as f64).round() as i64,
            y: (f64::from(sy) * SUBPIXEL as f64).round() as i64,
            z: f64::from(p.z),
            color: [
                f64::from(c.r),
                f64::from(c.g),
                f64::from(c.b),
                f64::from(c.a),
            ],
        })
    }
}

fn edge(a: &ScreenVertex, b: &ScreenVertex, px: i64, py: i64) -> i64 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Top or left edge for the positive-area (clockwise on a y-down screen) orientation.
fn is_top_left(a: &ScreenVertex, b: &ScreenVertex) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dy == 0 && dx > 0) || dy < 0
}

fn covers(w: i64, top_left: bool) -> bool {
    w > 0 || (w == 0 && top_left)
}

fn floor_div(a: i64, b: i64) -> i64 {
    a.div_euclid(b)
}

fn ceil_div(a: i64, b: i64) -> i64 {
    -(-a).div_euclid(b)
}

/// Rasterize one triangle, calling `emit` for every covered pixel center inside the viewport.
///
/// Returns the number of fragments emitted.
pub fn rasterize_triangle(
    viewport: Viewport,
    tri: &[Vertex; 3],
    mut emit: impl FnMut(Fragment),
) -> u64 {
    let (Some(v0), Some(mut v1), Some(mut v2)) = (
        ScreenVertex::from_ndc(&tri[0], viewport),
        ScreenVertex::from_ndc(&tri[1], viewport),
        ScreenVertex::from_ndc(&tri[2], viewport),
    ) else {
        return 0;
    };

    let mut area = edge(&v0, &v1, v2.x, v2.y);
    if area == 0 {
        return 0;
    }
    if area < 0 {
        std::mem::swap(&mut v1, &mut v2);
        area = -area;
    }

    let min_x = v0.x.min(v1.x).min(v2.x);
    let max_x = v0.x.max(v1.x).max(v2.x);
    let min_y = v0.y.min(v1.y).min(v2.y);
    let max_y = v0.y.max(v1.y).max(v2.y);

    let last_x = i64::from(viewport.width) - 1;
    let last_y = i64::from(viewport.height) - 1;
    let x_start = ceil_div(min_x - HALF_PIXEL, SUBPIXEL).max(0);
    let x_end = floor_div(max_x - HALF_PIXEL, SUBPIXEL).min(last_x);
    let y_start = ceil_div(min_y - HALF_PIXEL, SUBPIXEL).max(0);
    let y_end = floor_div(max_y - HALF_PIXEL, SUBPIXEL).min(last_y);
    if x_start > x_end || y_start > y_end {
        return 0;
    }

    let tl0 = is_top_left(&v1, &v2);
    let tl1 = is_top_left(&v2, &v0);
    let tl2 = is_top_left(&v0, &v1);
    let inv_area = 1.0 / area as f64;

    let mut emitted = 0u64;
    for py in y_start..=y_end {
        let cy = py * SUBPIXEL + HALF_PIXEL;
        for px in x_start..=x_end {
            let cx = px * SUBPIXEL + HALF_PIXEL;
            let w0 = edge(&v1, &v2, cx, cy);
            let w1 = edge(&v2, &v0, cx, cy);
            let w2 = edge(&v0, &v1, cx, cy);
            if !(covers(w0, tl0) && covers(w1, tl1) && covers(w2, tl2)) {
                continue;
            }

            let b0 = w0 as f64 * inv_area;
            let b1 = w1 as f64 * inv_area;
            let b2 = w2 as f64 * inv_area;
            let depth = (b0 * v0.z + b1 * v1.z + b2 * v2.z) as f32;
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }
            let lerp = |i: usize| (b0 * v0.color[i] + b1 * v1.color[i] + b2 * v2.color[i]) as f32;

            emit(Fragment {
                x: px as u32,
                y: py as u32,
                depth,
                color: Rgba::new(lerp(0), lerp(1), lerp(2), lerp(3)),
            });
            emitted += 1;
        }
    }
    emitted
}

#[cfg(test)]
#[path = "../../tests/unit/device/raster.rs"]
mod tests;
