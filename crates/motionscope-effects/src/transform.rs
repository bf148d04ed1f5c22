//! Transform definitions, stateful instances and the per-frame transform set.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;

use motionscope_core::{EffectBuffer, Frame, FrameHistory, MotionScopeError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::amplification::{AmplificationParams, AmplificationProcessor, AmplificationState};
use crate::color_shift::{ColorShiftParams, ColorShiftProcessor};
use crate::edge_detect::{EdgeDetectParams, EdgeDetectProcessor};
use crate::heat_map::{HeatMapParams, HeatMapProcessor, HeatMapState};
use crate::motion_diff::{MotionDiffParams, MotionDiffProcessor};
use crate::optical_flow::{FlowField, FlowParams};
use crate::time_shift::{TimeShiftParams, TimeShiftProcessor};

/// Inputs every transform sees for one frame.
///
/// `history.get(0)` is the current frame, `history.get(1)` the previous one.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub current: &'a Frame,
    pub history: &'a FrameHistory,
}

impl<'a> FrameContext<'a> {
    /// Context for the newest frame in `history`, `None` if the history is empty.
    pub fn from_history(history: &'a FrameHistory) -> Option<Self> {
        let current = history.newest()?;
        Some(Self {
            current: current.as_ref(),
            history,
        })
    }

    /// The frame `offset` steps back, which must match the current frame's size.
    pub fn reference(&self, offset: usize) -> Result<&'a Frame> {
        let frame = self
            .history
            .get(offset)
            .ok_or(MotionScopeError::InsufficientHistory {
                required: offset + 1,
                available: self.history.len(),
            })?;
        if !frame.same_size(self.current) {
            return Err(MotionScopeError::DimensionMismatch {
                expected: self.current.dimensions(),
                actual: frame.dimensions(),
            });
        }
        Ok(frame.as_ref())
    }

    /// The previous frame.
    pub fn previous(&self) -> Result<&'a Frame> {
        self.reference(1)
    }
}

/// Identifies a transform independent of its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformKind {
    MotionDiff,
    TimeShift,
    EdgeDetect,
    Amplification,
    OpticalFlow,
    HeatMap,
    ColorShift,
}

impl TransformKind {
    pub const ALL: [TransformKind; 7] = [
        TransformKind::MotionDiff,
        TransformKind::TimeShift,
        TransformKind::EdgeDetect,
        TransformKind::Amplification,
        TransformKind::OpticalFlow,
        TransformKind::HeatMap,
        TransformKind::ColorShift,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::MotionDiff => "motion-diff",
            Self::TimeShift => "time-shift",
            Self::EdgeDetect => "edge-detect",
            Self::Amplification => "amplification",
            Self::OpticalFlow => "optical-flow",
            Self::HeatMap => "heat-map",
            Self::ColorShift => "color-shift",
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransformKind {
    type Err = MotionScopeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| MotionScopeError::InvalidParameter(format!("unknown transform '{s}'")))
    }
}

/// A transform and its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Transform {
    MotionDiff(MotionDiffParams),
    TimeShift(TimeShiftParams),
    EdgeDetect(EdgeDetectParams),
    Amplification(AmplificationParams),
    OpticalFlow(FlowParams),
    HeatMap(HeatMapParams),
    ColorShift(ColorShiftParams),
}

impl Transform {
    /// The transform of `kind` with default parameters.
    pub fn with_defaults(kind: TransformKind) -> Self {
        match kind {
            TransformKind::MotionDiff => Self::MotionDiff(MotionDiffParams::default()),
            TransformKind::TimeShift => Self::TimeShift(TimeShiftParams::default()),
            TransformKind::EdgeDetect => Self::EdgeDetect(EdgeDetectParams::default()),
            TransformKind::Amplification => Self::Amplification(AmplificationParams::default()),
            TransformKind::OpticalFlow => Self::OpticalFlow(FlowParams::default()),
            TransformKind::HeatMap => Self::HeatMap(HeatMapParams::default()),
            TransformKind::ColorShift => Self::ColorShift(ColorShiftParams::default()),
        }
    }

    pub fn kind(&self) -> TransformKind {
        match self {
            Self::MotionDiff(_) => TransformKind::MotionDiff,
            Self::TimeShift(_) => TransformKind::TimeShift,
            Self::EdgeDetect(_) => TransformKind::EdgeDetect,
            Self::Amplification(_) => TransformKind::Amplification,
            Self::OpticalFlow(_) => TransformKind::OpticalFlow,
            Self::HeatMap(_) => TransformKind::HeatMap,
            Self::ColorShift(_) => TransformKind::ColorShift,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::MotionDiff(p) => p.validate(),
            Self::TimeShift(p) => p.validate(),
            Self::EdgeDetect(p) => p.validate(),
            Self::Amplification(p) => p.validate(),
            Self::OpticalFlow(p) => p.validate(),
            Self::HeatMap(p) => p.validate(),
            Self::ColorShift(p) => p.validate(),
        }
    }
}

/// State carried between frames by the stateful transforms.
#[derive(Debug, Clone, Default)]
pub enum TransformState {
    #[default]
    Stateless,
    Amplification(AmplificationState),
    HeatMap(HeatMapState),
}

impl TransformState {
    fn for_kind(kind: TransformKind) -> Self {
        match kind {
            TransformKind::Amplification => Self::Amplification(AmplificationState::new()),
            TransformKind::HeatMap => Self::HeatMap(HeatMapState::new()),
            _ => Self::Stateless,
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Stateless => {}
            Self::Amplification(s) => s.reset(),
            Self::HeatMap(s) => s.reset(),
        }
    }
}

/// A configured transform together with its exclusively owned state.
#[derive(Debug, Clone)]
pub struct TransformInstance {
    transform: Transform,
    state: TransformState,
    pub enabled: bool,
}

impl TransformInstance {
    pub fn new(transform: Transform) -> Self {
        let state = TransformState::for_kind(transform.kind());
        Self {
            transform,
            state,
            enabled: true,
        }
    }

    pub fn kind(&self) -> TransformKind {
        self.transform.kind()
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn state(&self) -> &TransformState {
        &self.state
    }

    /// Clear persistent state (heat accumulator, locked reference).
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Run the transform. `Ok(None)` means it had nothing to compare against.
    pub fn apply(&mut self, ctx: &FrameContext<'_>) -> Result<Option<EffectBuffer>> {
        self.transform.validate()?;
        match self.run(ctx) {
            Ok(buffer) => Ok(buffer),
            Err(
                e @ (MotionScopeError::InsufficientHistory { .. }
                | MotionScopeError::DimensionMismatch { .. }),
            ) => {
                trace!(
                    transform = self.name(),
                    frame = ctx.current.index,
                    reason = %e,
                    "transform skipped"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn run(&mut self, ctx: &FrameContext<'_>) -> Result<Option<EffectBuffer>> {
        let current = ctx.current;
        let buffer = match (&self.transform, &mut self.state) {
            (Transform::MotionDiff(p), _) => {
                MotionDiffProcessor::apply(current, ctx.previous()?, p)
            }
            (Transform::TimeShift(p), _) => {
                TimeShiftProcessor::apply(current, ctx.reference(p.frame_offset)?, p)
            }
            (Transform::EdgeDetect(p), _) => EdgeDetectProcessor::apply(current, p),
            (Transform::Amplification(p), TransformState::Amplification(state)) => {
                match state.select_reference(current, ctx.history, p) {
                    Some(reference) => AmplificationProcessor::apply(current, &reference, p),
                    None => return Ok(None),
                }
            }
            (Transform::OpticalFlow(p), _) => {
                FlowField::estimate(ctx.previous()?, current, p.window).visualize(p)
            }
            (Transform::HeatMap(p), TransformState::HeatMap(state)) => {
                HeatMapProcessor::apply(state, current, ctx.previous()?, p)
            }
            (Transform::ColorShift(p), _) => ColorShiftProcessor::apply(current, p),
            (transform, _) => {
                return Err(MotionScopeError::TransformFailure {
                    transform: transform.kind().name().to_string(),
                    reason: "state does not match transform".into(),
                })
            }
        };
        Ok(Some(buffer))
    }
}

/// Result of running one transform on one frame.
#[derive(Debug)]
pub enum TransformOutcome {
    Applied {
        kind: TransformKind,
        buffer: EffectBuffer,
    },
    Skipped {
        kind: TransformKind,
    },
    Failed {
        kind: TransformKind,
        error: MotionScopeError,
    },
}

impl TransformOutcome {
    pub fn kind(&self) -> TransformKind {
        match self {
            Self::Applied { kind, .. } | Self::Skipped { kind } | Self::Failed { kind, .. } => {
                *kind
            }
        }
    }

    pub fn buffer(&self) -> Option<&EffectBuffer> {
        match self {
            Self::Applied { buffer, .. } => Some(buffer),
            _ => None,
        }
    }

    pub fn into_buffer(self) -> Option<EffectBuffer> {
        match self {
            Self::Applied { buffer, .. } => Some(buffer),
            _ => None,
        }
    }
}

/// Ordered set of transform instances applied to every processed frame.
#[derive(Debug, Clone, Default)]
pub struct TransformSet {
    instances: Vec<TransformInstance>,
}

impl TransformSet {
    /// Build a set in the given order, all instances enabled.
    pub fn new(transforms: Vec<Transform>) -> Result<Self> {
        for t in &transforms {
            t.validate()?;
        }
        Ok(Self {
            instances: transforms.into_iter().map(TransformInstance::new).collect(),
        })
    }

    /// Every transform with default parameters; only `enabled` kinds start active.
    pub fn standard(enabled: &[TransformKind]) -> Self {
        let instances = TransformKind::ALL
            .into_iter()
            .map(|kind| {
                let mut instance = TransformInstance::new(Transform::with_defaults(kind));
                instance.enabled = enabled.contains(&kind);
                instance
            })
            .collect();
        Self { instances }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformInstance> {
        self.instances.iter()
    }

    pub fn get(&self, kind: TransformKind) -> Option<&TransformInstance> {
        self.instances.iter().find(|i| i.kind() == kind)
    }

    /// Toggle every instance of `kind`. Returns false if none is configured.
    pub fn set_enabled(&mut self, kind: TransformKind, enabled: bool) -> bool {
        let mut found = false;
        for instance in self.instances.iter_mut().filter(|i| i.kind() == kind) {
            instance.enabled = enabled;
            found = true;
        }
        found
    }

    pub fn active_kinds(&self) -> Vec<TransformKind> {
        self.instances
            .iter()
            .filter(|i| i.enabled)
            .map(|i| i.kind())
            .collect()
    }

    pub fn reset_state(&mut self) {
        for instance in &mut self.instances {
            instance.reset();
        }
    }

    /// Run every enabled transform on one frame, in configuration order.
    ///
    /// Errors and panics are contained per transform and reported as
    /// [`TransformOutcome::Failed`].
    pub fn apply_all(&mut self, ctx: &FrameContext<'_>, parallel: bool) -> Vec<TransformOutcome> {
        if parallel {
            self.instances
                .par_iter_mut()
                .filter(|i| i.enabled)
                .map(|i| run_contained(i, ctx))
                .collect()
        } else {
            self.instances
                .iter_mut()
                .filter(|i| i.enabled)
                .map(|i| run_contained(i, ctx))
                .collect()
        }
    }
}

fn run_contained(instance: &mut TransformInstance, ctx: &FrameContext<'_>) -> TransformOutcome {
    let kind = instance.kind();
    match catch_unwind(AssertUnwindSafe(|| instance.apply(ctx))) {
        Ok(Ok(Some(buffer))) => TransformOutcome::Applied { kind, buffer },
        Ok(Ok(None)) => TransformOutcome::Skipped { kind },
        Ok(Err(error)) => {
            warn!(transform = kind.name(), frame = ctx.current.index, %error, "transform failed");
            TransformOutcome::Failed { kind, error }
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            warn!(
                transform = kind.name(),
                frame = ctx.current.index,
                %reason,
                "transform panicked"
            );
            // State may be half-updated
            instance.reset();
            TransformOutcome::Failed {
                kind,
                error: MotionScopeError::TransformFailure {
                    transform: kind.name().to_string(),
                    reason,
                },
            }
        }
    }
}
