//! Feedback controller for downscale factor and frame skipping.

use motionscope_core::limits::MAX_DOWNSCALE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Scale growth when the average exceeds the budget.
const SCALE_UP: f64 = 1.2;
/// Scale shrink when the average is well under the budget.
const SCALE_DOWN: f64 = 0.9;
/// Fraction of the budget below which quality is restored.
const HEADROOM: f64 = 0.5;

/// Current quality setting. Only the [`QualityController`] mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityState {
    pub downscale_factor: u32,
    pub frame_skip_interval: u32,
    pub adaptive_scale: f64,
}

impl QualityState {
    pub fn new(downscale_factor: u32, frame_skip_interval: u32) -> Self {
        let downscale_factor = downscale_factor.clamp(1, MAX_DOWNSCALE);
        Self {
            downscale_factor,
            frame_skip_interval: frame_skip_interval.max(1),
            adaptive_scale: downscale_factor as f64,
        }
    }
}

/// Adjusts [`QualityState`] once per metrics window and gates frames.
#[derive(Debug, Clone)]
pub struct QualityController {
    preset: QualityState,
    state: QualityState,
    budget_ms: f64,
    adaptive: bool,
    last_processed: Option<u64>,
}

impl QualityController {
    pub fn new(preset: QualityState, budget_ms: f64, adaptive: bool) -> Self {
        Self {
            preset,
            state: preset,
            budget_ms,
            adaptive,
            last_processed: None,
        }
    }

    pub fn state(&self) -> QualityState {
        self.state
    }

    pub fn downscale_factor(&self) -> u32 {
        self.state.downscale_factor
    }

    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }

    pub fn last_processed(&self) -> Option<u64> {
        self.last_processed
    }

    /// Re-evaluate against the window's average processing time.
    ///
    /// Returns true if the downscale factor changed.
    pub fn evaluate(&mut self, avg_ms: f64) -> bool {
        if !self.adaptive || !avg_ms.is_finite() {
            return false;
        }
        let before = self.state.downscale_factor;
        let mut scale = self.state.adaptive_scale;
        if avg_ms > self.budget_ms {
            scale *= SCALE_UP;
        } else if avg_ms < self.budget_ms * HEADROOM {
            scale *= SCALE_DOWN;
        }
        let max = MAX_DOWNSCALE as f64;
        scale = scale.clamp(1.0, max);
        self.state.adaptive_scale = scale;
        self.state.downscale_factor = (scale.ceil() as u32).clamp(1, MAX_DOWNSCALE);

        let changed = self.state.downscale_factor != before;
        if changed {
            info!(
                from = before,
                to = self.state.downscale_factor,
                avg_ms,
                budget_ms = self.budget_ms,
                "quality adjusted"
            );
        } else {
            debug!(scale, avg_ms, "quality unchanged");
        }
        changed
    }

    /// Whether frame `index` should be processed.
    ///
    /// Off-interval indices are skipped, and so is an index that was already
    /// processed (a re-delivered frame).
    pub fn should_process(&self, index: u64) -> bool {
        index % self.state.frame_skip_interval as u64 == 0 && self.last_processed != Some(index)
    }

    pub fn mark_processed(&mut self, index: u64) {
        self.last_processed = Some(index);
    }

    /// Restore the preset state.
    pub fn reset(&mut self) {
        self.state = self.preset;
        self.last_processed = None;
    }
}
