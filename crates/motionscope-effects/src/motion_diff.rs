//! Frame differencing against the previous frame.

use motionscope_core::color::mean_abs_diff;
use motionscope_core::{Color, EffectBuffer, Frame, MotionScopeError, Result};
use serde::{Deserialize, Serialize};

/// How activated pixels are colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TintMode {
    #[default]
    Red,
    Green,
    Blue,
    White,
    /// Hue follows the difference magnitude.
    Rainbow,
}

/// Parameters for motion differencing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MotionDiffParams {
    /// Mean channel difference (0-255) a pixel must exceed to activate.
    pub sensitivity: f32,
    pub color_mode: TintMode,
    /// Gain applied to the difference before clamping to 255.
    pub boost: f32,
}

impl Default for MotionDiffParams {
    fn default() -> Self {
        Self {
            sensitivity: 30.0,
            color_mode: TintMode::Red,
            boost: 2.0,
        }
    }
}

impl MotionDiffParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=255.0).contains(&self.sensitivity) {
            return Err(MotionScopeError::InvalidParameter(format!(
                "motion diff sensitivity {} outside 0-255",
                self.sensitivity
            )));
        }
        if !self.boost.is_finite() || self.boost <= 0.0 {
            return Err(MotionScopeError::InvalidParameter(format!(
                "motion diff boost {} must be positive",
                self.boost
            )));
        }
        Ok(())
    }
}

/// Motion differencing processor.
pub struct MotionDiffProcessor;

impl MotionDiffProcessor {
    /// Difference `current` against `previous`. Both frames must be the same size.
    pub fn apply(current: &Frame, previous: &Frame, params: &MotionDiffParams) -> EffectBuffer {
        let mut out = EffectBuffer::transparent(current.width, current.height);
        for ((dst, &cur), &prev) in out
            .rgba_mut()
            .iter_mut()
            .zip(current.rgba())
            .zip(previous.rgba())
        {
            let diff = mean_abs_diff(cur, prev);
            if diff > params.sensitivity {
                *dst = Self::colorize(diff, params);
            }
        }
        out
    }

    /// Color for an activated pixel with the given mean difference.
    pub fn colorize(diff: f32, params: &MotionDiffParams) -> [u8; 4] {
        let v = (diff * params.boost).clamp(0.0, 255.0);
        let level = v.round() as u8;
        match params.color_mode {
            TintMode::Red => [level, 0, 0, 255],
            TintMode::Green => [0, level, 0, 255],
            TintMode::Blue => [0, 0, level, 255],
            TintMode::White => [level, level, level, 255],
            TintMode::Rainbow => {
                let hue = (diff / 255.0) * 360.0;
                Color::from_hsv(hue, 1.0, v / 255.0).to_rgba8()
            }
        }
    }
}
