//! Comparison of the current frame against a frame from the past.

use motionscope_core::{EffectBuffer, Frame, MotionScopeError, Result};
use serde::{Deserialize, Serialize};

/// Multiplier applied to the tinted channel.
const TINT_GAIN: f32 = 1.5;

/// How the past frame is combined with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeShiftMode {
    /// Sum of absolute channel deltas, shown as gray.
    #[default]
    Difference,
    /// Linear interpolation by opacity.
    Blend,
    /// Per-channel max of the weighted current and past frames.
    OnionSkin,
}

/// Channel boosted by the tint post-pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelTint {
    Red,
    Green,
    Blue,
}

impl ChannelTint {
    fn channel(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
        }
    }
}

/// Parameters for the time-shift comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeShiftParams {
    /// How many frames back the comparison frame is.
    pub frame_offset: usize,
    pub mode: TimeShiftMode,
    /// Weight of the past frame (0.0-1.0).
    pub opacity: f32,
    pub tint: Option<ChannelTint>,
}

impl Default for TimeShiftParams {
    fn default() -> Self {
        Self {
            frame_offset: 10,
            mode: TimeShiftMode::Difference,
            opacity: 0.5,
            tint: None,
        }
    }
}

impl TimeShiftParams {
    pub fn validate(&self) -> Result<()> {
        if self.frame_offset == 0 {
            return Err(MotionScopeError::InvalidParameter(
                "time shift frame offset must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(MotionScopeError::InvalidParameter(format!(
                "time shift opacity {} outside 0-1",
                self.opacity
            )));
        }
        Ok(())
    }
}

/// Time-shift processor.
pub struct TimeShiftProcessor;

impl TimeShiftProcessor {
    /// Combine `current` with `past`. Both frames must be the same size.
    pub fn apply(current: &Frame, past: &Frame, params: &TimeShiftParams) -> EffectBuffer {
        let mut out = EffectBuffer::transparent(current.width, current.height);
        let op = params.opacity;

        for ((dst, &c), &p) in out.rgba_mut().iter_mut().zip(current.rgba()).zip(past.rgba()) {
            *dst = match params.mode {
                TimeShiftMode::Difference => {
                    let sum: u16 = (0..3)
                        .map(|i| (c[i] as i16 - p[i] as i16).unsigned_abs())
                        .sum();
                    let v = sum.min(255) as u8;
                    [v, v, v, if v > 0 { 255 } else { 0 }]
                }
                TimeShiftMode::Blend => {
                    let mut px = [0, 0, 0, 255];
                    for i in 0..3 {
                        px[i] = (c[i] as f32 * (1.0 - op) + p[i] as f32 * op).round() as u8;
                    }
                    px
                }
                TimeShiftMode::OnionSkin => {
                    let current_weight = 1.0 - op * 0.5;
                    let mut px = [0, 0, 0, 255];
                    for i in 0..3 {
                        let a = c[i] as f32 * current_weight;
                        let b = p[i] as f32 * op;
                        px[i] = a.max(b).round() as u8;
                    }
                    px
                }
            };
        }

        if let Some(tint) = params.tint {
            Self::apply_tint(&mut out, tint);
        }
        out
    }

    /// Boost one channel of every activated pixel.
    pub fn apply_tint(buffer: &mut EffectBuffer, tint: ChannelTint) {
        let ch = tint.channel();
        for px in buffer.rgba_mut().iter_mut().filter(|px| px[3] != 0) {
            px[ch] = (px[ch] as f32 * TINT_GAIN).min(255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (Frame, Frame) {
        (
            Frame::solid(10, 2, 2, [200, 100, 0, 255]),
            Frame::solid(0, 2, 2, [100, 100, 50, 255]),
        )
    }

    #[test]
    fn difference_mode_sums_deltas() {
        let (cur, past) = pair();
        let out = TimeShiftProcessor::apply(&cur, &past, &TimeShiftParams::default());
        assert_eq!(out.pixel(0, 0), [150, 150, 150, 255]);
    }

    #[test]
    fn difference_mode_identical_is_transparent() {
        let (cur, _) = pair();
        let out = TimeShiftProcessor::apply(&cur, &cur, &TimeShiftParams::default());
        assert!(out.is_fully_transparent());
    }

    #[test]
    fn blend_mode_interpolates() {
        let (cur, past) = pair();
        let params = TimeShiftParams {
            mode: TimeShiftMode::Blend,
            opacity: 0.5,
            ..Default::default()
        };
        let out = TimeShiftProcessor::apply(&cur, &past, &params);
        assert_eq!(out.pixel(1, 1), [150, 100, 25, 255]);
    }

    #[test]
    fn onion_skin_takes_channel_max() {
        let (cur, past) = pair();
        let params = TimeShiftParams {
            mode: TimeShiftMode::OnionSkin,
            opacity: 1.0,
            ..Default::default()
        };
        // current weighted by 0.5, past by 1.0
        let out = TimeShiftProcessor::apply(&cur, &past, &params);
        assert_eq!(out.pixel(0, 0), [100, 100, 50, 255]);
    }

    #[test]
    fn tint_boosts_channel() {
        let (cur, past) = pair();
        let params = TimeShiftParams {
            tint: Some(ChannelTint::Red),
            ..Default::default()
        };
        let out = TimeShiftProcessor::apply(&cur, &past, &params);
        assert_eq!(out.pixel(0, 0), [225, 150, 150, 255]);
    }

    #[test]
    fn zero_offset_rejected() {
        let params = TimeShiftParams {
            frame_offset: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
