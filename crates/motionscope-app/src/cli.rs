//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use motionscope_effects::{Transform, TransformKind};
use motionscope_pipeline::{BackendKind, BlendMode, PipelineConfig, ProcessingQuality};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "motionscope",
    version,
    about = "Adaptive motion-analysis pipeline over a synthetic video source"
)]
pub struct Cli {
    /// Pipeline configuration JSON. Flags below override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub quality: Option<Quality>,

    /// Number of source frames to generate.
    #[arg(long, default_value_t = 300)]
    pub frames: u64,

    #[arg(long, default_value_t = 640)]
    pub width: u32,

    #[arg(long, default_value_t = 480)]
    pub height: u32,

    /// Tick rate; 0 runs as fast as possible.
    #[arg(long, default_value_t = 60.0)]
    pub fps: f64,

    #[arg(long, value_enum)]
    pub blend_mode: Option<Blend>,

    /// Show only the last active transform instead of blending.
    #[arg(long, default_value_t = false)]
    pub no_blend: bool,

    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Transform to enable; repeat for several.
    #[arg(long = "transform", value_parser = parse_transform)]
    pub transforms: Vec<TransformKind>,

    #[arg(long)]
    pub frame_skipping: Option<u32>,

    #[arg(long)]
    pub max_history: Option<usize>,

    /// Keep the preset quality fixed.
    #[arg(long, default_value_t = false)]
    pub no_adaptive: bool,

    /// Rayon worker threads for parallel transforms.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Write a JSON metrics snapshot here when the run ends.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Quality {
    Low,
    Medium,
    High,
    Ultra,
}

impl From<Quality> for ProcessingQuality {
    fn from(q: Quality) -> Self {
        match q {
            Quality::Low => Self::Low,
            Quality::Medium => Self::Medium,
            Quality::High => Self::High,
            Quality::Ultra => Self::Ultra,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Blend {
    Screen,
    Overlay,
    #[value(alias = "add")]
    Additive,
}

impl From<Blend> for BlendMode {
    fn from(b: Blend) -> Self {
        match b {
            Blend::Screen => Self::Screen,
            Blend::Overlay => Self::Overlay,
            Blend::Additive => Self::Additive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Inline,
    Worker,
}

impl From<Backend> for BackendKind {
    fn from(b: Backend) -> Self {
        match b {
            Backend::Inline => Self::Inline,
            Backend::Worker => Self::Worker,
        }
    }
}

fn parse_transform(s: &str) -> Result<TransformKind, String> {
    s.parse::<TransformKind>().map_err(|e| e.to_string())
}

impl Cli {
    /// Apply command-line overrides on top of `config`.
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(q) = self.quality {
            config.processing_quality = q.into();
        }
        if let Some(mode) = self.blend_mode {
            config.blend_mode = mode.into();
        }
        if self.no_blend {
            config.blend_multiple_effects = false;
        }
        if let Some(backend) = self.backend {
            config.backend = backend.into();
        }
        if self.frame_skipping.is_some() {
            config.frame_skipping = self.frame_skipping;
        }
        if self.max_history.is_some() {
            config.max_history_frames = self.max_history;
        }
        if self.no_adaptive {
            config.adaptive_quality = false;
        }
        if !self.transforms.is_empty() {
            config.transforms = self
                .transforms
                .iter()
                .map(|&kind| {
                    // Keep configured parameters for transforms already in the file
                    config
                        .transforms
                        .iter()
                        .find(|t| t.kind() == kind)
                        .cloned()
                        .unwrap_or_else(|| Transform::with_defaults(kind))
                })
                .collect();
        }
    }
}
