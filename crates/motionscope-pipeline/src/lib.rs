//! MotionScope Pipeline - adaptive frame processing
//!
//! Provides the driver that pulls frames from a source, keeps the frame
//! history, runs the transform set inline or on a worker thread, composites
//! the results and feeds timing back into the quality controller.

pub mod blend;
pub mod buffer_pool;
pub mod compositor;
pub mod config;
pub mod driver;
pub mod executor;
pub mod export;
pub mod metrics;
pub mod quality;
pub mod source;

pub use blend::BlendMode;
pub use buffer_pool::{BufferPool, PooledBuffer, SharedBufferPool};
pub use compositor::{CompositePolicy, Compositor, EffectList};
pub use config::{BackendKind, PipelineConfig, ProcessingQuality, QualityPreset};
pub use driver::{run_fixed_rate, FrameReport, Pipeline, PipelineState, RunSummary, TickOutcome};
pub use executor::{ComputeBackend, FrameJob, InlineExecutor, ProcessedFrame, WorkerExecutor};
pub use export::ExportSnapshot;
pub use metrics::{MetricsSnapshot, ProcessingMetrics};
pub use quality::{QualityController, QualityState};
pub use source::{FrameSource, MemorySink, NullSink, OutputSink, SyntheticSource, VecSource};
