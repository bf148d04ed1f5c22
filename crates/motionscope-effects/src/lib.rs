//! MotionScope Effects - per-frame motion analysis transforms
//!
//! Each transform consumes the current frame (and optionally earlier frames
//! from the history) and produces an RGBA buffer whose alpha channel marks
//! the pixels it activated. Transforms are wrapped in [`TransformInstance`]s
//! that own any state carried across frames, and grouped in a
//! [`TransformSet`] that runs them, in parallel if asked.

pub mod amplification;
pub mod color_shift;
pub mod edge_detect;
pub mod heat_map;
pub mod motion_diff;
pub mod optical_flow;
pub mod palette;
pub mod time_shift;
pub mod transform;

pub use amplification::{AmplificationParams, AmplificationState, ReferenceMode};
pub use color_shift::ColorShiftParams;
pub use edge_detect::{EdgeColor, EdgeDetectParams};
pub use heat_map::{HeatMapParams, HeatMapState};
pub use motion_diff::{MotionDiffParams, TintMode};
pub use optical_flow::{FlowField, FlowParams};
pub use palette::Palette;
pub use time_shift::{ChannelTint, TimeShiftMode, TimeShiftParams};
pub use transform::{
    FrameContext, Transform, TransformInstance, TransformKind, TransformOutcome, TransformSet,
    TransformState,
};
