//! MotionScope Core - Foundation types for motion analysis
//!
//! This crate provides the fundamental types used throughout MotionScope:
//! - RGBA frames and effect buffers
//! - The bounded frame history
//! - Color helpers
//! - The error taxonomy

pub mod color;
pub mod error;
pub mod frame;
pub mod history;

pub use color::Color;
pub use error::{MotionScopeError, Result};
pub use frame::{rgba_len, EffectBuffer, Frame, SharedFrame, BYTES_PER_PIXEL};
pub use history::FrameHistory;

/// Limits shared by the pipeline and the quality controller.
pub mod limits {
    /// Largest downscale factor the quality controller will apply.
    pub const MAX_DOWNSCALE: u32 = 4;

    /// Samples kept in the rolling processing-time window.
    pub const METRICS_WINDOW_SAMPLES: usize = 60;

    /// Upper bound accepted for `maxHistoryFrames`.
    pub const MAX_HISTORY_FRAMES: usize = 240;
}
