//! Horizontal chromatic offset of the red and blue channels.

use motionscope_core::{EffectBuffer, Frame, MotionScopeError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorShiftParams {
    /// Horizontal shift of the red channel in pixels.
    pub red_offset: i32,
    /// Horizontal shift of the blue channel in pixels.
    pub blue_offset: i32,
}

impl Default for ColorShiftParams {
    fn default() -> Self {
        Self {
            red_offset: 6,
            blue_offset: -6,
        }
    }
}

impl ColorShiftParams {
    pub fn validate(&self) -> Result<()> {
        const LIMIT: i32 = 4096;
        if self.red_offset.abs() > LIMIT || self.blue_offset.abs() > LIMIT {
            return Err(MotionScopeError::InvalidParameter(format!(
                "color shift offsets ({}, {}) exceed {LIMIT}",
                self.red_offset, self.blue_offset
            )));
        }
        Ok(())
    }
}

pub struct ColorShiftProcessor;

impl ColorShiftProcessor {
    pub fn apply(frame: &Frame, params: &ColorShiftParams) -> EffectBuffer {
        let w = frame.width as i64;
        let mut out = EffectBuffer::transparent(frame.width, frame.height);
        let src = frame.rgba();
        let sample_x = |x: i64, offset: i32| (x - offset as i64).clamp(0, w - 1) as usize;

        for (row_idx, row) in out.rgba_mut().chunks_exact_mut(frame.width as usize).enumerate() {
            let base = row_idx * frame.width as usize;
            for (x, dst) in row.iter_mut().enumerate() {
                let x = x as i64;
                let r = src[base + sample_x(x, params.red_offset)][0];
                let g = src[base + x as usize][1];
                let b = src[base + sample_x(x, params.blue_offset)][2];
                *dst = [r, g, b, 255];
            }
        }
        out
    }
}
