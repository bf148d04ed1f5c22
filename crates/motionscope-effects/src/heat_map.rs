//! Decaying motion accumulation rendered through a palette.

use motionscope_core::color::mean_abs_diff;
use motionscope_core::{EffectBuffer, Frame, MotionScopeError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::palette::Palette;

/// Parameters for the heat map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeatMapParams {
    /// Per-frame multiplier applied to the accumulator, in (0, 1).
    pub decay_rate: f32,
    pub palette: Palette,
    /// Clear the accumulator every N frames.
    pub reset_interval: Option<u32>,
    /// Mean channel difference (0-255) below which a pixel counts as still.
    pub sensitivity: f32,
}

impl Default for HeatMapParams {
    fn default() -> Self {
        Self {
            decay_rate: 0.95,
            palette: Palette::Thermal,
            reset_interval: None,
            sensitivity: 10.0,
        }
    }
}

impl HeatMapParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.decay_rate > 0.0 && self.decay_rate < 1.0) {
            return Err(MotionScopeError::InvalidParameter(format!(
                "heat map decay rate {} outside (0, 1)",
                self.decay_rate
            )));
        }
        if self.reset_interval == Some(0) {
            return Err(MotionScopeError::InvalidParameter(
                "heat map reset interval must be at least 1".into(),
            ));
        }
        if !(0.0..=255.0).contains(&self.sensitivity) {
            return Err(MotionScopeError::InvalidParameter(format!(
                "heat map sensitivity {} outside 0-255",
                self.sensitivity
            )));
        }
        Ok(())
    }
}

/// Per-pixel accumulator that persists across frames.
#[derive(Debug, Clone, Default)]
pub struct HeatMapState {
    width: u32,
    height: u32,
    acc: Vec<f32>,
    frames_seen: u32,
}

impl HeatMapState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.acc.iter_mut().for_each(|v| *v = 0.0);
        self.frames_seen = 0;
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn values(&self) -> &[f32] {
        &self.acc
    }

    /// Accumulated value at a pixel, 0.0 outside the buffer.
    pub fn value(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.acc[(y * self.width + x) as usize]
    }

    /// Size the accumulator for a frame, clearing it if the size changed.
    pub fn ensure_size(&mut self, width: u32, height: u32) {
        if (self.width, self.height) != (width, height) {
            debug!(width, height, "heat map accumulator resized");
            self.width = width;
            self.height = height;
            self.acc = vec![0.0; (width as usize) * (height as usize)];
            self.frames_seen = 0;
        }
    }

    /// Fold one frame of motion intensities (each in [0, 1]) into the accumulator.
    pub fn accumulate(&mut self, motion: &[f32], decay: f32) {
        for (acc, &m) in self.acc.iter_mut().zip(motion) {
            *acc = m.max(*acc * decay);
        }
    }

    /// Count a frame against the reset interval, clearing when it elapses.
    fn tick_interval(&mut self, interval: Option<u32>) {
        if let Some(n) = interval {
            if self.frames_seen >= n {
                debug!(interval = n, "heat map interval reset");
                self.reset();
            }
        }
        self.frames_seen = self.frames_seen.saturating_add(1);
    }
}

/// Heat-map processor.
pub struct HeatMapProcessor;

impl HeatMapProcessor {
    /// Per-pixel motion intensity in [0, 1], zero at or below the sensitivity.
    pub fn motion_intensity(current: &Frame, previous: &Frame, sensitivity: f32) -> Vec<f32> {
        current
            .rgba()
            .iter()
            .zip(previous.rgba())
            .map(|(&c, &p)| {
                let diff = mean_abs_diff(c, p);
                if diff <= sensitivity {
                    0.0
                } else {
                    diff / 255.0
                }
            })
            .collect()
    }

    /// Update `state` with the motion between `current` and `previous` and render it.
    pub fn apply(
        state: &mut HeatMapState,
        current: &Frame,
        previous: &Frame,
        params: &HeatMapParams,
    ) -> EffectBuffer {
        state.ensure_size(current.width, current.height);
        state.tick_interval(params.reset_interval);
        let motion = Self::motion_intensity(current, previous, params.sensitivity);
        state.accumulate(&motion, params.decay_rate);
        Self::render(state, params.palette)
    }

    pub fn render(state: &HeatMapState, palette: Palette) -> EffectBuffer {
        let mut out = EffectBuffer::transparent(state.width, state.height);
        for (dst, &v) in out.rgba_mut().iter_mut().zip(&state.acc) {
            let alpha = (v * 255.0).round().clamp(0.0, 255.0) as u8;
            if alpha == 0 {
                continue;
            }
            let [r, g, b] = palette.sample(v);
            *dst = [r, g, b, alpha];
        }
        out
    }
}
