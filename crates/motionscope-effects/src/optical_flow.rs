//! Single-pass block Lucas-Kanade flow estimate.
//!
//! Each `window x window` block gets one flow vector solved from the summed
//! spatial and temporal gradients of the block. This is deliberately coarse:
//! one pass, no pyramid, no iterative refinement.

use glam::Vec2;
use motionscope_core::{Color, EffectBuffer, Frame, MotionScopeError, Result};
use serde::{Deserialize, Serialize};

/// Regularizer added to the gradient energy before dividing.
const EPSILON: f32 = 1e-3;

/// Parameters for flow estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowParams {
    /// Block size in pixels.
    pub window: u32,
    /// Blocks with a smaller flow magnitude (pixels) are left transparent.
    pub min_magnitude: f32,
    /// Magnitude that maps to full brightness.
    pub max_magnitude: f32,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            window: 8,
            min_magnitude: 0.5,
            max_magnitude: 8.0,
        }
    }
}

impl FlowParams {
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(MotionScopeError::InvalidParameter(
                "flow window must be at least 1".into(),
            ));
        }
        if self.max_magnitude.is_nan() || self.max_magnitude <= 0.0 || self.min_magnitude < 0.0 {
            return Err(MotionScopeError::InvalidParameter(format!(
                "flow magnitudes invalid: min {} max {}",
                self.min_magnitude, self.max_magnitude
            )));
        }
        Ok(())
    }
}

/// Block flow field: one displacement vector per block.
#[derive(Debug, Clone)]
pub struct FlowField {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    pub window: u32,
    /// Number of blocks across.
    pub cols: u32,
    /// Number of blocks down.
    pub rows: u32,
    /// Per-block displacement, row-major.
    pub data: Vec<Vec2>,
}

impl FlowField {
    /// A zero flow field for the given frame size.
    pub fn zeros(width: u32, height: u32, window: u32) -> Self {
        let window = window.max(1);
        let cols = width.div_ceil(window);
        let rows = height.div_ceil(window);
        Self {
            width,
            height,
            window,
            cols,
            rows,
            data: vec![Vec2::ZERO; (cols * rows) as usize],
        }
    }

    /// Estimate flow from `prev` to `next`. Frames must be the same size.
    pub fn estimate(prev: &Frame, next: &Frame, window: u32) -> Self {
        let w = next.width;
        let h = next.height;
        let prev_gray = Self::to_gray(prev);
        let next_gray = Self::to_gray(next);
        let mut field = Self::zeros(w, h, window);

        for by in 0..field.rows {
            for bx in 0..field.cols {
                let x0 = bx * field.window;
                let y0 = by * field.window;
                let x1 = (x0 + field.window).min(w);
                let y1 = (y0 + field.window).min(h);

                let mut sum_ix_it = 0.0f32;
                let mut sum_iy_it = 0.0f32;
                let mut energy = 0.0f32;
                for y in y0..y1 {
                    for x in x0..x1 {
                        let (ix, iy) = Self::spatial_gradient(&next_gray, w, h, x, y);
                        let idx = (y * w + x) as usize;
                        let it = next_gray[idx] - prev_gray[idx];
                        sum_ix_it += ix * it;
                        sum_iy_it += iy * it;
                        energy += ix * ix + iy * iy;
                    }
                }

                let flow = -Vec2::new(sum_ix_it, sum_iy_it) / (energy + EPSILON);
                field.data[(by * field.cols + bx) as usize] = flow;
            }
        }
        field
    }

    /// Central-difference gradient, clamped at the frame edges.
    fn spatial_gradient(gray: &[f32], w: u32, h: u32, x: u32, y: u32) -> (f32, f32) {
        let at = |px: u32, py: u32| gray[(py * w + px) as usize];
        let xl = x.saturating_sub(1);
        let xr = (x + 1).min(w - 1);
        let yu = y.saturating_sub(1);
        let yd = (y + 1).min(h - 1);
        let dx = (xr - xl).max(1) as f32;
        let dy = (yd - yu).max(1) as f32;
        (
            (at(xr, y) - at(xl, y)) / dx,
            (at(x, yd) - at(x, yu)) / dy,
        )
    }

    /// Flow vector for the block containing pixel `(x, y)`.
    pub fn flow_at(&self, x: u32, y: u32) -> Vec2 {
        let bx = (x / self.window).min(self.cols.saturating_sub(1));
        let by = (y / self.window).min(self.rows.saturating_sub(1));
        self.data
            .get((by * self.cols + bx) as usize)
            .copied()
            .unwrap_or(Vec2::ZERO)
    }

    /// Get the flow magnitude at a pixel.
    pub fn magnitude_at(&self, x: u32, y: u32) -> f32 {
        self.flow_at(x, y).length()
    }

    /// Render the field: hue from direction, brightness and alpha from magnitude.
    pub fn visualize(&self, params: &FlowParams) -> EffectBuffer {
        let mut out = EffectBuffer::transparent(self.width, self.height);
        let block_colors: Vec<[u8; 4]> = self
            .data
            .iter()
            .map(|flow| {
                let mag = flow.length();
                if mag < params.min_magnitude || mag == 0.0 {
                    return [0, 0, 0, 0];
                }
                let strength = (mag / params.max_magnitude).min(1.0);
                let hue = flow.y.atan2(flow.x).to_degrees() + 180.0;
                let mut rgba = Color::from_hsv(hue, 1.0, strength).to_rgba8();
                rgba[3] = (strength * 255.0).round().max(1.0) as u8;
                rgba
            })
            .collect();

        let window = self.window;
        let cols = self.cols;
        let width = self.width;
        for (i, px) in out.rgba_mut().iter_mut().enumerate() {
            let x = i as u32 % width;
            let y = i as u32 / width;
            *px = block_colors[((y / window) * cols + x / window) as usize];
        }
        out
    }

    // Helper: convert RGBA to grayscale f32 in [0, 1]
    fn to_gray(frame: &Frame) -> Vec<f32> {
        frame
            .rgba()
            .iter()
            .map(|p| (0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32) / 255.0)
            .collect()
    }
}
