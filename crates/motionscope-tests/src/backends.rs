//! Inline and worker backends driven through the same pipeline.

use std::thread;
use std::time::{Duration, Instant};

use motionscope_core::Frame;
use motionscope_effects::{Transform, TransformKind};
use motionscope_pipeline::{
    run_fixed_rate, BackendKind, MemorySink, NullSink, Pipeline, PipelineConfig,
    ProcessingQuality, SyntheticSource, TickOutcome, VecSource,
};

fn config(backend: BackendKind) -> PipelineConfig {
    PipelineConfig {
        processing_quality: ProcessingQuality::High,
        adaptive_quality: false,
        backend,
        transforms: vec![
            Transform::with_defaults(TransformKind::MotionDiff),
            Transform::with_defaults(TransformKind::HeatMap),
            Transform::with_defaults(TransformKind::EdgeDetect),
            Transform::with_defaults(TransformKind::Amplification),
        ],
        ..Default::default()
    }
}

fn moving_stream(n: u64) -> Vec<Frame> {
    (0..n)
        .map(|i| {
            let mut pixels = Vec::with_capacity(24 * 16 * 4);
            for y in 0..16u32 {
                for x in 0..24u32 {
                    let lit = x / 4 == (i as u32 % 6) && y > 4 && y < 12;
                    let v = if lit { 240 } else { (x * 5 + y * 3) as u8 };
                    pixels.extend_from_slice(&[v, v / 2, 255 - v, 255]);
                }
            }
            Frame::new(i, i as f64 / 30.0, 24, 16, pixels).unwrap()
        })
        .collect()
}

/// Run every frame to completion, returning each presented buffer.
fn presented(backend: BackendKind, frames: Vec<Frame>) -> Vec<Vec<u8>> {
    let mut pipeline = Pipeline::new(config(backend)).unwrap();
    assert_eq!(pipeline.backend_kind(), backend);
    let mut source = VecSource::new(frames);
    let mut sink = MemorySink::new();
    let mut out = Vec::new();
    loop {
        match pipeline.tick(&mut source, &mut sink, Instant::now()) {
            TickOutcome::Exhausted => break,
            TickOutcome::Processed(_) => out.push(sink.last_pixels().unwrap().to_vec()),
            TickOutcome::Submitted { .. } => {
                pipeline.finish(&mut sink).expect("worker result");
                out.push(sink.last_pixels().unwrap().to_vec());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    out
}

#[test]
fn worker_matches_inline_output() {
    let inline = presented(BackendKind::Inline, moving_stream(10));
    let worker = presented(BackendKind::Worker, moving_stream(10));
    assert_eq!(inline.len(), 10);
    assert_eq!(inline, worker);
}

#[test]
fn result_from_before_restart_is_discarded() {
    let mut pipeline = Pipeline::new(config(BackendKind::Worker)).unwrap();
    let mut sink = MemorySink::new();

    let mut first = VecSource::new(moving_stream(2));
    pipeline.tick(&mut first, &mut sink, Instant::now());
    pipeline.restart();
    assert!(!pipeline.is_busy());

    let fresh = Frame::solid(0, 24, 16, [9, 8, 7, 255]);
    let mut second = VecSource::new(vec![fresh.clone()]);
    let report = match pipeline.tick(&mut second, &mut sink, Instant::now()) {
        TickOutcome::Processed(report) => report,
        TickOutcome::Submitted { .. } => pipeline.finish(&mut sink).expect("worker result"),
        other => panic!("unexpected {other:?}"),
    };

    assert_eq!(report.index, 0);
    assert!(report.applied.contains(&TransformKind::EdgeDetect));
    assert_eq!(pipeline.state().history.len(), 1);
    assert_eq!(pipeline.state().frames_processed, 1);
    assert!(!pipeline.is_busy());
}

#[test]
fn busy_ticks_are_counted_as_drops() {
    let mut pipeline = Pipeline::new(config(BackendKind::Worker)).unwrap();
    let mut source = VecSource::new(moving_stream(30));
    let mut sink = MemorySink::new();

    let summary = run_fixed_rate(&mut pipeline, &mut source, &mut sink, 0.0, None);
    assert!(summary.exhausted);
    assert_eq!(summary.busy, pipeline.state().metrics.total_dropped());
    assert_eq!(summary.processed, pipeline.state().frames_processed);
    assert_eq!(summary.processed, 30);
    assert!(!pipeline.is_busy());
}

#[test]
fn toggles_reach_the_worker() {
    let mut pipeline = Pipeline::new(config(BackendKind::Worker)).unwrap();
    assert!(pipeline.set_transform_enabled(TransformKind::EdgeDetect, false));
    assert!(!pipeline.active_transforms().contains(&TransformKind::EdgeDetect));

    let mut source = VecSource::new(moving_stream(1));
    let mut sink = MemorySink::new();
    let report = match pipeline.tick(&mut source, &mut sink, Instant::now()) {
        TickOutcome::Processed(report) => report,
        TickOutcome::Submitted { .. } => pipeline.finish(&mut sink).expect("worker result"),
        other => panic!("unexpected {other:?}"),
    };
    assert!(report.applied.is_empty());
}

/// Run a cheap transform at 60 Hz with adaptive quality on.
fn adaptive_light_run(backend: BackendKind) -> (u32, f64) {
    let config = PipelineConfig {
        processing_quality: ProcessingQuality::High,
        adaptive_quality: true,
        target_frame_budget_ms: 16.0,
        backend,
        transforms: vec![Transform::with_defaults(TransformKind::ColorShift)],
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(config).unwrap();
    let mut source = SyntheticSource::new(32, 32, 60.0, None);
    let mut sink = NullSink;
    run_fixed_rate(&mut pipeline, &mut source, &mut sink, 60.0, Some(150));
    let state = pipeline.state();
    (state.quality.downscale_factor(), state.metrics.average_ms())
}

#[test]
fn worker_wait_does_not_count_as_processing_time() {
    let (inline_scale, inline_ms) = adaptive_light_run(BackendKind::Inline);
    let (worker_scale, worker_ms) = adaptive_light_run(BackendKind::Worker);
    assert_eq!(inline_scale, 1);
    assert_eq!(worker_scale, inline_scale);
    assert!(inline_ms < 8.0, "inline average {inline_ms} ms");
    assert!(worker_ms < 8.0, "worker average {worker_ms} ms");
}

#[test]
fn report_separates_latency_from_processing() {
    let mut pipeline = Pipeline::new(config(BackendKind::Worker)).unwrap();
    let mut source = VecSource::new(moving_stream(1));
    let mut sink = MemorySink::new();
    let report = match pipeline.tick(&mut source, &mut sink, Instant::now()) {
        TickOutcome::Processed(report) => report,
        TickOutcome::Submitted { .. } => {
            thread::sleep(Duration::from_millis(30));
            pipeline.finish(&mut sink).expect("worker result")
        }
        other => panic!("unexpected {other:?}"),
    };
    assert!(report.latency >= Duration::from_millis(30));
    assert!(report.duration < report.latency);
}
