//! Sobel edge detection over luminance.

use motionscope_core::color::mean_intensity;
use motionscope_core::{Color, EffectBuffer, Frame, MotionScopeError, Result};
use serde::{Deserialize, Serialize};

/// How edge pixels are colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeColor {
    /// Every edge pixel gets the same RGB color.
    Uniform([u8; 3]),
    /// Hue follows the gradient direction.
    Direction,
}

impl Default for EdgeColor {
    fn default() -> Self {
        Self::Uniform([0, 255, 255])
    }
}

/// Largest accepted border width.
const MAX_THICKNESS: u32 = 4096;

/// Parameters for edge detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgeDetectParams {
    /// Gradient magnitude a pixel must exceed to be kept.
    pub threshold: f32,
    pub color: EdgeColor,
    /// Border width (pixels) excluded from processing; at least 1.
    pub thickness: u32,
}

impl Default for EdgeDetectParams {
    fn default() -> Self {
        Self {
            threshold: 50.0,
            color: EdgeColor::default(),
            thickness: 1,
        }
    }
}

impl EdgeDetectParams {
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(MotionScopeError::InvalidParameter(format!(
                "edge threshold {} must be non-negative",
                self.threshold
            )));
        }
        if self.thickness > MAX_THICKNESS {
            return Err(MotionScopeError::InvalidParameter(format!(
                "edge thickness {} exceeds {MAX_THICKNESS}",
                self.thickness
            )));
        }
        Ok(())
    }
}

/// Gradient at one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gradient {
    pub magnitude: f32,
    /// Direction in radians, `atan2(gy, gx)`.
    pub direction: f32,
}

/// Edge detection processor.
pub struct EdgeDetectProcessor;

impl EdgeDetectProcessor {
    const KX: [[f32; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
    const KY: [[f32; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

    pub fn apply(frame: &Frame, params: &EdgeDetectParams) -> EffectBuffer {
        let w = frame.width;
        let h = frame.height;
        let mut out = EffectBuffer::transparent(w, h);
        let border = params.thickness.max(1);
        let span = border.saturating_mul(2);
        if w <= span || h <= span {
            return out;
        }

        let luma: Vec<f32> = frame.rgba().iter().map(|&p| mean_intensity(p)).collect();

        for y in border..h - border {
            for x in border..w - border {
                let g = Self::gradient_at(&luma, w, x, y);
                if g.magnitude > params.threshold {
                    let color = match params.color {
                        EdgeColor::Uniform([r, gc, b]) => [r, gc, b, 255],
                        EdgeColor::Direction => {
                            let hue = g.direction.to_degrees() + 180.0;
                            Color::from_hsv(hue, 1.0, 1.0).to_rgba8()
                        }
                    };
                    out.set_pixel(x, y, color);
                }
            }
        }
        out
    }

    /// Sobel gradient at an interior pixel of a luminance plane.
    pub fn gradient_at(luma: &[f32], width: u32, x: u32, y: u32) -> Gradient {
        let w = width as usize;
        let mut gx = 0.0f32;
        let mut gy = 0.0f32;
        for ky in 0..3 {
            for kx in 0..3 {
                let sx = x as usize + kx - 1;
                let sy = y as usize + ky - 1;
                let v = luma[sy * w + sx];
                gx += Self::KX[ky][kx] * v;
                gy += Self::KY[ky][kx] * v;
            }
        }
        Gradient {
            magnitude: (gx * gx + gy * gy).sqrt(),
            direction: gy.atan2(gx),
        }
    }
}
