//! Per-tick pipeline driver and the fixed-rate scheduler.
//!
//! At most one frame is in flight. A tick that arrives while a frame is still
//! being processed is dropped and counted, not queued.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use motionscope_core::{FrameHistory, Result, SharedFrame};
use motionscope_effects::{TransformKind, TransformSet};
use tracing::{debug, info, trace, warn};

use crate::buffer_pool::BufferPool;
use crate::compositor::Compositor;
use crate::config::{BackendKind, PipelineConfig};
use crate::executor::{build_backend, ComputeBackend, FrameJob, InlineExecutor, ProcessedFrame};
use crate::metrics::{MetricsSnapshot, ProcessingMetrics};
use crate::quality::QualityController;
use crate::source::{FrameSource, OutputSink};

/// How long `finish` waits for an outstanding worker result.
const FINISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Summary of one completed frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub applied: Vec<TransformKind>,
    pub failed: usize,
    /// Transform, composite and present time; what the quality controller sees.
    pub duration: Duration,
    /// Submit-to-present time, including ticks spent waiting on the worker.
    pub latency: Duration,
}

/// What a single tick did.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// A frame was still in flight; this tick was dropped.
    Busy,
    /// The source has no more frames.
    Exhausted,
    /// The frame was gated out by the skip interval or already processed.
    Skipped { index: u64 },
    /// The frame was handed to the worker; its result arrives on a later tick.
    Submitted { index: u64 },
    /// A frame completed and was presented during this tick.
    Processed(FrameReport),
}

/// Mutable state owned by the driver.
#[derive(Debug)]
pub struct PipelineState {
    pub history: FrameHistory,
    pub quality: QualityController,
    pub metrics: ProcessingMetrics,
    /// Size of the most recent accepted frame.
    pub frame_size: Option<(u32, u32)>,
    /// Size of the most recent presented buffer.
    pub output_size: Option<(u32, u32)>,
    pub frames_processed: u64,
}

#[derive(Debug)]
struct Pending {
    ticket: u64,
    frame: SharedFrame,
    started: Instant,
}

/// Frame processing pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    state: PipelineState,
    backend: Box<dyn ComputeBackend>,
    /// Transform configuration with the current enabled flags, used to rebuild
    /// an inline backend if the worker goes away.
    template: TransformSet,
    compositor: Compositor,
    pending: Option<Pending>,
    next_ticket: u64,
    started: Instant,
}

impl Pipeline {
    /// Build a pipeline. Fails on invalid configuration or if the history
    /// storage cannot be reserved.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let history = FrameHistory::with_capacity(config.effective_history())?;
        let set = TransformSet::new(config.transforms.clone())?;
        Self::with_transforms(config, history, set)
    }

    /// Build a pipeline around an already configured transform set.
    pub fn with_transform_set(config: PipelineConfig, set: TransformSet) -> Result<Self> {
        config.validate()?;
        let history = FrameHistory::with_capacity(config.effective_history())?;
        Self::with_transforms(config, history, set)
    }

    fn with_transforms(
        config: PipelineConfig,
        history: FrameHistory,
        set: TransformSet,
    ) -> Result<Self> {
        let template = set.clone();
        let backend = build_backend(config.backend, set, config.parallel_transforms);
        let compositor = Compositor::new(config.composite_policy(), BufferPool::shared());
        let quality = QualityController::new(
            config.quality_state(),
            config.target_frame_budget_ms,
            config.adaptive_quality,
        );
        info!(
            quality = %config.processing_quality,
            history = history.capacity(),
            backend = ?backend.kind(),
            transforms = ?template.active_kinds(),
            "pipeline created"
        );
        Ok(Self {
            config,
            state: PipelineState {
                history,
                quality,
                metrics: ProcessingMetrics::new(),
                frame_size: None,
                output_size: None,
                frames_processed: 0,
            },
            backend,
            template,
            compositor,
            pending: None,
            next_ticket: 0,
            started: Instant::now(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn active_transforms(&self) -> Vec<TransformKind> {
        self.backend.active_kinds()
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Time since construction or the last restart.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// History plus pooled output buffers, in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.state.history.memory_bytes() + self.compositor.pool().lock().memory_usage()
    }

    pub fn set_transform_enabled(&mut self, kind: TransformKind, enabled: bool) -> bool {
        self.template.set_enabled(kind, enabled);
        let found = self.backend.set_enabled(kind, enabled);
        debug!(transform = kind.name(), enabled, found, "transform toggled");
        found
    }

    /// Advance the pipeline by one tick.
    pub fn tick(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn OutputSink,
        now: Instant,
    ) -> TickOutcome {
        if self.pending.is_some() && self.collect(sink, None).is_none() {
            self.state.metrics.record_drop();
            trace!("frame in flight, tick dropped");
            self.poll_metrics(now);
            return TickOutcome::Busy;
        }

        let (native_w, native_h) = source.native_size();
        let factor = self.state.quality.downscale_factor().max(1);
        let target = ((native_w / factor).max(1), (native_h / factor).max(1));
        let Some(frame) = source.next_frame(target.0, target.1) else {
            debug!("source exhausted");
            return TickOutcome::Exhausted;
        };

        let index = frame.index;
        if !self.state.quality.should_process(index) {
            trace!(frame = index, "frame gated");
            self.poll_metrics(now);
            return TickOutcome::Skipped { index };
        }

        let size = frame.dimensions();
        if let Some(previous) = self.state.frame_size {
            if previous != size {
                info!(from = ?previous, to = ?size, "resolution changed, clearing history");
                self.state.history.clear();
                self.backend.reset();
            }
        }
        self.state.frame_size = Some(size);

        let frame: SharedFrame = Arc::new(frame);
        self.state.history.push(Arc::clone(&frame));
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let started = Instant::now();
        self.submit(FrameJob {
            ticket,
            index,
            history: self.state.history.clone(),
        });
        self.pending = Some(Pending {
            ticket,
            frame,
            started,
        });

        let outcome = match self.collect(sink, None) {
            Some(report) => TickOutcome::Processed(report),
            None => TickOutcome::Submitted { index },
        };
        self.poll_metrics(now);
        outcome
    }

    /// Wait for the frame in flight, if any, and present it.
    pub fn finish(&mut self, sink: &mut dyn OutputSink) -> Option<FrameReport> {
        self.pending.as_ref()?;
        let report = self.collect(sink, Some(FINISH_TIMEOUT));
        if report.is_none() {
            warn!("abandoning frame in flight");
            self.pending = None;
        }
        report
    }

    /// Reset history, metrics, quality and transform state for a new stream.
    ///
    /// A result still outstanding from before the restart is discarded when
    /// it arrives.
    pub fn restart(&mut self) {
        info!(frames = self.state.frames_processed, "pipeline restart");
        self.pending = None;
        self.state.history.clear();
        self.state.metrics.reset();
        self.state.quality.reset();
        self.state.frame_size = None;
        self.state.output_size = None;
        self.state.frames_processed = 0;
        self.backend.reset();
        self.compositor.pool().lock().clear();
        self.started = Instant::now();
    }

    fn submit(&mut self, job: FrameJob) {
        let Err(e) = self.backend.submit(job.clone()) else {
            return;
        };
        warn!(error = %e, "backend failed, switching to inline execution");
        let mut set = self.template.clone();
        set.reset_state();
        self.backend = Box::new(InlineExecutor::new(set, self.config.parallel_transforms));
        if let Err(e) = self.backend.submit(job) {
            warn!(error = %e, "inline submit failed");
        }
    }

    /// Take the result for the frame in flight, discarding stale ones.
    fn collect(
        &mut self,
        sink: &mut dyn OutputSink,
        block: Option<Duration>,
    ) -> Option<FrameReport> {
        loop {
            let result = match block {
                Some(timeout) => self.backend.wait(timeout),
                None => self.backend.poll(),
            }?;
            match self.pending.as_ref() {
                Some(p) if p.ticket == result.ticket => {
                    let pending = self.pending.take()?;
                    return Some(self.complete(pending, result, sink));
                }
                _ => debug!(
                    ticket = result.ticket,
                    frame = result.index,
                    "discarding stale result"
                ),
            }
        }
    }

    fn complete(
        &mut self,
        pending: Pending,
        result: ProcessedFrame,
        sink: &mut dyn OutputSink,
    ) -> FrameReport {
        let compose_started = Instant::now();
        let frame = pending.frame;
        let composite = self.compositor.compose(&frame, result.effects);
        let (width, height) = composite.buffer.dimensions();
        sink.present(&composite.buffer.pixels, width, height);
        self.compositor.recycle(composite);

        // Worker results wait for the next tick; that wait is not processing time
        let duration = result.elapsed + compose_started.elapsed();
        let latency = pending.started.elapsed();
        self.state.metrics.record_frame(duration);
        self.state.quality.mark_processed(frame.index);
        self.state.output_size = Some((width, height));
        self.state.frames_processed += 1;
        trace!(
            frame = frame.index,
            ?duration,
            ?latency,
            applied = result.applied.len(),
            "frame presented"
        );

        FrameReport {
            index: frame.index,
            width,
            height,
            applied: result.applied,
            failed: result.failed,
            duration,
            latency,
        }
    }

    fn poll_metrics(&mut self, now: Instant) -> Option<MetricsSnapshot> {
        let memory = self.memory_bytes();
        let snapshot = self
            .state
            .metrics
            .poll(now, self.state.history.len(), memory)?;
        self.state.quality.evaluate(snapshot.avg_processing_time_ms);
        Some(snapshot)
    }
}

/// Counts from a scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub processed: u64,
    pub submitted: u64,
    pub skipped: u64,
    pub busy: u64,
    pub exhausted: bool,
    pub elapsed: Duration,
}

/// Tick `pipeline` at `hz` until the source is exhausted or `max_ticks` is reached.
///
/// A non-positive rate runs ticks back to back.
pub fn run_fixed_rate(
    pipeline: &mut Pipeline,
    source: &mut dyn FrameSource,
    sink: &mut dyn OutputSink,
    hz: f64,
    max_ticks: Option<u64>,
) -> RunSummary {
    let period = (hz > 0.0).then(|| Duration::from_secs_f64(1.0 / hz));
    let run_start = Instant::now();
    let processed_before = pipeline.state().frames_processed;
    let mut summary = RunSummary::default();

    loop {
        if max_ticks.is_some_and(|max| summary.ticks >= max) {
            break;
        }
        let tick_start = Instant::now();
        summary.ticks += 1;
        match pipeline.tick(source, sink, tick_start) {
            TickOutcome::Busy => summary.busy += 1,
            TickOutcome::Exhausted => {
                summary.exhausted = true;
                break;
            }
            TickOutcome::Skipped { .. } => summary.skipped += 1,
            TickOutcome::Submitted { .. } => summary.submitted += 1,
            TickOutcome::Processed(_) => {}
        }

        // Pace to the target rate
        if let Some(period) = period {
            let elapsed = tick_start.elapsed();
            if elapsed < period {
                thread::sleep(period - elapsed);
            }
        }
    }

    pipeline.finish(sink);
    // Worker results can complete on a tick that then submits another frame
    summary.processed = pipeline.state().frames_processed - processed_before;
    summary.elapsed = run_start.elapsed();
    info!(
        ticks = summary.ticks,
        processed = summary.processed,
        skipped = summary.skipped,
        busy = summary.busy,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "run finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySink, VecSource};
    use motionscope_core::Frame;
    use motionscope_effects::Transform;

    fn config(skip: u32) -> PipelineConfig {
        PipelineConfig {
            processing_quality: crate::config::ProcessingQuality::High,
            frame_skipping: Some(skip),
            adaptive_quality: false,
            transforms: vec![Transform::with_defaults(TransformKind::MotionDiff)],
            ..Default::default()
        }
    }

    fn frames(n: u64) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::solid(i, 8, 8, [(i * 40) as u8, 0, 0, 255]))
            .collect()
    }

    #[test]
    fn first_frame_is_passed_through() {
        let mut pipeline = Pipeline::new(config(1)).unwrap();
        let mut source = VecSource::new(frames(1));
        let mut sink = MemorySink::new();
        let outcome = pipeline.tick(&mut source, &mut sink, Instant::now());
        match outcome {
            TickOutcome::Processed(report) => {
                assert_eq!(report.index, 0);
                assert!(report.applied.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(sink.last_pixels(), Some(Frame::solid(0, 8, 8, [0, 0, 0, 255]).pixels()));
    }

    #[test]
    fn skip_interval_gates_frames() {
        let mut pipeline = Pipeline::new(config(2)).unwrap();
        let mut source = VecSource::new(frames(4));
        let mut sink = MemorySink::new();
        let now = Instant::now();
        let outcomes: Vec<_> = (0..4).map(|_| pipeline.tick(&mut source, &mut sink, now)).collect();
        assert!(matches!(outcomes[0], TickOutcome::Processed(_)));
        assert!(matches!(outcomes[1], TickOutcome::Skipped { index: 1 }));
        assert!(matches!(outcomes[2], TickOutcome::Processed(_)));
        assert!(matches!(outcomes[3], TickOutcome::Skipped { index: 3 }));
        assert_eq!(pipeline.state().frames_processed, 2);
    }

    #[test]
    fn redelivered_frame_is_skipped() {
        let mut pipeline = Pipeline::new(config(1)).unwrap();
        let mut source = VecSource::new(vec![
            Frame::solid(4, 8, 8, [0; 4]),
            Frame::solid(4, 8, 8, [0; 4]),
        ]);
        let mut sink = MemorySink::new();
        let now = Instant::now();
        assert!(matches!(pipeline.tick(&mut source, &mut sink, now), TickOutcome::Processed(_)));
        assert!(matches!(
            pipeline.tick(&mut source, &mut sink, now),
            TickOutcome::Skipped { index: 4 }
        ));
    }

    #[test]
    fn restart_clears_state() {
        let mut pipeline = Pipeline::new(config(1)).unwrap();
        let mut source = VecSource::new(frames(3));
        let mut sink = MemorySink::new();
        for _ in 0..3 {
            pipeline.tick(&mut source, &mut sink, Instant::now());
        }
        assert_eq!(pipeline.state().history.len(), 3);
        pipeline.restart();
        assert!(pipeline.state().history.is_empty());
        assert_eq!(pipeline.state().metrics.total_frames(), 0);
        assert_eq!(pipeline.state().quality.last_processed(), None);
    }

    #[test]
    fn resolution_change_clears_history() {
        let mut pipeline = Pipeline::new(config(1)).unwrap();
        let mut source = VecSource::new(vec![
            Frame::solid(0, 8, 8, [0; 4]),
            Frame::solid(1, 8, 8, [0; 4]),
        ]);
        let mut sink = MemorySink::new();
        pipeline.tick(&mut source, &mut sink, Instant::now());
        pipeline.tick(&mut source, &mut sink, Instant::now());
        assert_eq!(pipeline.state().history.len(), 2);

        let mut bigger = VecSource::new(vec![Frame::solid(2, 16, 16, [0; 4])]);
        pipeline.tick(&mut bigger, &mut sink, Instant::now());
        assert_eq!(pipeline.state().history.len(), 1);
        assert_eq!(sink.last_size(), Some((16, 16)));
    }

    #[test]
    fn downscale_applies_to_requested_size() {
        let config = PipelineConfig {
            processing_quality: crate::config::ProcessingQuality::Low,
            frame_skipping: Some(1),
            adaptive_quality: false,
            ..Default::default()
        };
        let mut pipeline = Pipeline::new(config).unwrap();
        let mut source = VecSource::new(vec![Frame::solid(0, 30, 12, [0; 4])]);
        let mut sink = MemorySink::new();
        pipeline.tick(&mut source, &mut sink, Instant::now());
        assert_eq!(sink.last_size(), Some((10, 4)));
    }

    #[test]
    fn fixed_rate_runs_until_exhausted() {
        let mut pipeline = Pipeline::new(config(1)).unwrap();
        let mut source = VecSource::new(frames(5));
        let mut sink = MemorySink::new();
        let summary = run_fixed_rate(&mut pipeline, &mut source, &mut sink, 0.0, None);
        assert!(summary.exhausted);
        assert_eq!(summary.processed, 5);
        assert_eq!(summary.ticks, 6);
        assert_eq!(sink.presented, 5);
    }

    #[test]
    fn max_ticks_bounds_run() {
        let mut pipeline = Pipeline::new(config(1)).unwrap();
        let mut source = VecSource::new(frames(10));
        let mut sink = MemorySink::new();
        let summary = run_fixed_rate(&mut pipeline, &mut source, &mut sink, 1000.0, Some(3));
        assert!(!summary.exhausted);
        assert_eq!(summary.ticks, 3);
    }

    #[test]
    fn toggling_transforms_updates_active_list() {
        let mut pipeline = Pipeline::new(config(1)).unwrap();
        assert_eq!(pipeline.active_transforms(), vec![TransformKind::MotionDiff]);
        assert!(pipeline.set_transform_enabled(TransformKind::MotionDiff, false));
        assert!(pipeline.active_transforms().is_empty());
        assert!(!pipeline.set_transform_enabled(TransformKind::HeatMap, true));
    }
}
