//! Motion amplification: extrapolate each pixel away from a reference frame.

use motionscope_core::{EffectBuffer, Frame, FrameHistory, MotionScopeError, Result, SharedFrame};
use serde::{Deserialize, Serialize};

/// Which frame serves as the amplification reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceMode {
    /// Oldest frame in the history.
    #[default]
    Oldest,
    /// A frame a fixed number of steps back.
    StepsBack(usize),
    /// The first eligible reference, held until reset.
    Locked,
}

/// Parameters for motion amplification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AmplificationParams {
    /// Extrapolation factor; 1.0 reproduces the current frame.
    pub factor: f32,
    /// Pull toward the current frame (0.0 = none, 1.0 = current frame).
    pub smoothing: f32,
    /// Clamp to 0-255; when false channels wrap around.
    pub clamp: bool,
    pub reference: ReferenceMode,
    /// History length that must be exceeded before the effect runs.
    pub min_history: usize,
}

impl Default for AmplificationParams {
    fn default() -> Self {
        Self {
            factor: 2.0,
            smoothing: 0.0,
            clamp: true,
            reference: ReferenceMode::Oldest,
            min_history: 10,
        }
    }
}

impl AmplificationParams {
    pub fn validate(&self) -> Result<()> {
        if !self.factor.is_finite() {
            return Err(MotionScopeError::InvalidParameter(
                "amplification factor must be finite".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(MotionScopeError::InvalidParameter(format!(
                "amplification smoothing {} outside 0-1",
                self.smoothing
            )));
        }
        if let ReferenceMode::StepsBack(0) = self.reference {
            return Err(MotionScopeError::InvalidParameter(
                "amplification reference must be at least 1 step back".into(),
            ));
        }
        Ok(())
    }
}

/// Persistent state: the locked reference frame, if any.
#[derive(Debug, Clone, Default)]
pub struct AmplificationState {
    locked: Option<SharedFrame>,
}

impl AmplificationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.locked = None;
    }

    /// Index of the locked reference frame.
    pub fn locked_index(&self) -> Option<u64> {
        self.locked.as_ref().map(|f| f.index)
    }

    /// Pick the reference for this frame, or `None` if the history is too short.
    pub fn select_reference(
        &mut self,
        current: &Frame,
        history: &FrameHistory,
        params: &AmplificationParams,
    ) -> Option<SharedFrame> {
        if history.len() <= params.min_history {
            return None;
        }
        let candidate = match params.reference {
            ReferenceMode::Oldest => history.oldest().cloned(),
            ReferenceMode::StepsBack(n) => history.get(n).cloned(),
            ReferenceMode::Locked => {
                if let Some(ref locked) = self.locked {
                    if !locked.same_size(current) {
                        self.locked = None;
                    }
                }
                if self.locked.is_none() {
                    self.locked = history.oldest().cloned();
                }
                self.locked.clone()
            }
        };
        candidate.filter(|f| f.same_size(current))
    }
}

/// Amplification processor.
pub struct AmplificationProcessor;

impl AmplificationProcessor {
    /// Amplify `current` relative to `reference`. Both frames must be the same size.
    pub fn apply(current: &Frame, reference: &Frame, params: &AmplificationParams) -> EffectBuffer {
        let mut out = EffectBuffer::transparent(current.width, current.height);
        let keep = 1.0 - params.smoothing;

        for ((dst, &c), &r) in out
            .rgba_mut()
            .iter_mut()
            .zip(current.rgba())
            .zip(reference.rgba())
        {
            for i in 0..3 {
                let cur = c[i] as f32;
                let reference = r[i] as f32;
                let amplified = reference + (cur - reference) * params.factor;
                let smoothed = amplified * keep + cur * params.smoothing;
                dst[i] = if params.clamp {
                    smoothed.round().clamp(0.0, 255.0) as u8
                } else {
                    (smoothed.round() as i32).rem_euclid(256) as u8
                };
            }
            dst[3] = 255;
        }
        out
    }
}
