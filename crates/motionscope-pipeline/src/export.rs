//! JSON dump of pipeline statistics and configuration.

use std::path::Path;

use motionscope_core::{MotionScopeError, Result};
use motionscope_effects::TransformKind;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::driver::Pipeline;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputStats {
    pub width: u32,
    pub height: u32,
    pub frames_processed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputStats {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub total_frames: u64,
    pub avg_processing_time_ms: f64,
    /// Processed frames per second of uptime.
    pub throughput: f64,
}

/// Snapshot written by `--export`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub input: InputStats,
    pub output: OutputStats,
    pub transforms_active: Vec<TransformKind>,
    pub stats: RunStats,
    pub config: PipelineConfig,
}

impl ExportSnapshot {
    /// Capture the current state of `pipeline`.
    pub fn capture(pipeline: &Pipeline, timestamp: u64) -> Self {
        let state = pipeline.state();
        let (in_w, in_h) = state.frame_size.unwrap_or((0, 0));
        let (out_w, out_h) = state.output_size.unwrap_or((0, 0));
        let uptime = pipeline.uptime().as_secs_f64();
        let throughput = if uptime > 0.0 {
            state.frames_processed as f64 / uptime
        } else {
            0.0
        };
        Self {
            timestamp,
            input: InputStats {
                width: in_w,
                height: in_h,
                frames_processed: state.frames_processed,
            },
            output: OutputStats {
                width: out_w,
                height: out_h,
            },
            transforms_active: pipeline.active_transforms(),
            stats: RunStats {
                total_frames: state.metrics.total_frames(),
                avg_processing_time_ms: state.metrics.average_ms(),
                throughput,
            },
            config: pipeline.config().clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MotionScopeError::Serialization(e.to_string()))
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
