//! Pipeline configuration and quality presets.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use motionscope_core::limits::MAX_HISTORY_FRAMES;
use motionscope_core::{MotionScopeError, Result};
use motionscope_effects::{Transform, TransformKind};
use serde::{Deserialize, Serialize};

use crate::blend::BlendMode;
use crate::compositor::CompositePolicy;
use crate::quality::QualityState;

/// Processing quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingQuality {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

/// Values a quality tier expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPreset {
    pub scale: u32,
    pub skip_frames: u32,
    pub max_history: usize,
}

impl ProcessingQuality {
    pub const ALL: [ProcessingQuality; 4] = [Self::Low, Self::Medium, Self::High, Self::Ultra];

    pub fn preset(self) -> QualityPreset {
        let (scale, skip_frames, max_history) = match self {
            Self::Low => (3, 3, 20),
            Self::Medium => (2, 2, 40),
            Self::High => (1, 1, 60),
            Self::Ultra => (1, 1, 120),
        };
        QualityPreset {
            scale,
            skip_frames,
            max_history,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Ultra => "ultra",
        }
    }
}

impl fmt::Display for ProcessingQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProcessingQuality {
    type Err = MotionScopeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|q| q.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| MotionScopeError::InvalidParameter(format!("unknown quality '{s}'")))
    }
}

/// Where transforms run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// On the driver thread.
    #[default]
    Inline,
    /// On a dedicated worker thread.
    Worker,
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub processing_quality: ProcessingQuality,
    /// Overrides the preset's skip interval.
    pub frame_skipping: Option<u32>,
    /// Overrides the preset's history capacity.
    pub max_history_frames: Option<usize>,
    pub blend_multiple_effects: bool,
    pub blend_mode: BlendMode,
    pub adaptive_quality: bool,
    pub target_frame_budget_ms: f64,
    pub backend: BackendKind,
    /// Run transforms of one frame in parallel.
    pub parallel_transforms: bool,
    /// Transforms in application order.
    pub transforms: Vec<Transform>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            processing_quality: ProcessingQuality::Medium,
            frame_skipping: None,
            max_history_frames: None,
            blend_multiple_effects: true,
            blend_mode: BlendMode::Screen,
            adaptive_quality: true,
            target_frame_budget_ms: 16.0,
            backend: BackendKind::Inline,
            parallel_transforms: true,
            transforms: vec![Transform::with_defaults(TransformKind::MotionDiff)],
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| MotionScopeError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MotionScopeError::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_skipping == Some(0) {
            return Err(MotionScopeError::InvalidParameter(
                "frameSkipping must be at least 1".into(),
            ));
        }
        match self.max_history_frames {
            Some(0) => {
                return Err(MotionScopeError::InvalidParameter(
                    "maxHistoryFrames must be at least 1".into(),
                ))
            }
            Some(n) if n > MAX_HISTORY_FRAMES => {
                return Err(MotionScopeError::InvalidParameter(format!(
                    "maxHistoryFrames {n} exceeds {MAX_HISTORY_FRAMES}"
                )))
            }
            _ => {}
        }
        if !(self.target_frame_budget_ms.is_finite() && self.target_frame_budget_ms > 0.0) {
            return Err(MotionScopeError::InvalidParameter(format!(
                "targetFrameBudgetMs {} must be positive",
                self.target_frame_budget_ms
            )));
        }
        for t in &self.transforms {
            t.validate()?;
        }
        Ok(())
    }

    /// Skip interval after applying the override.
    pub fn effective_skip(&self) -> u32 {
        self.frame_skipping
            .unwrap_or_else(|| self.processing_quality.preset().skip_frames)
    }

    /// History capacity after applying the override.
    pub fn effective_history(&self) -> usize {
        self.max_history_frames
            .unwrap_or_else(|| self.processing_quality.preset().max_history)
    }

    /// Initial quality state for the preset and overrides.
    pub fn quality_state(&self) -> QualityState {
        QualityState::new(self.processing_quality.preset().scale, self.effective_skip())
    }

    pub fn composite_policy(&self) -> CompositePolicy {
        CompositePolicy {
            blend: self.blend_multiple_effects,
            mode: self.blend_mode,
        }
    }
}
