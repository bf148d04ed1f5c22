//! End-to-end behavior of the inline pipeline on small hand-built streams.

use std::time::Instant;

use motionscope_core::{Frame, FrameHistory};
use motionscope_effects::{
    FrameContext, HeatMapParams, TimeShiftParams, Transform, TransformKind, TransformSet,
    TransformState,
};
use motionscope_pipeline::{
    run_fixed_rate, MemorySink, Pipeline, PipelineConfig, ProcessingQuality, TickOutcome, VecSource,
};

// ── Helpers ────────────────────────────────────────────────────

fn config(transforms: Vec<Transform>) -> PipelineConfig {
    PipelineConfig {
        processing_quality: ProcessingQuality::High,
        adaptive_quality: false,
        transforms,
        ..Default::default()
    }
}

fn black(index: u64, size: u32) -> Frame {
    Frame::solid(index, size, size, [0, 0, 0, 255])
}

fn motion_diff_pipeline() -> Pipeline {
    Pipeline::new(config(vec![Transform::with_defaults(TransformKind::MotionDiff)])).unwrap()
}

fn with_white_corner(index: u64, size: u32) -> Frame {
    let mut pixels = black(index, size).into_pixels();
    pixels[..4].copy_from_slice(&[255, 255, 255, 255]);
    Frame::new(index, 0.0, size, size, pixels).unwrap()
}

fn tick_all(
    pipeline: &mut Pipeline,
    source: &mut VecSource,
    sink: &mut MemorySink,
    n: usize,
) -> Vec<TickOutcome> {
    (0..n)
        .map(|_| pipeline.tick(source, sink, Instant::now()))
        .collect()
}

// ── Motion difference ──────────────────────────────────────────

#[test]
fn identical_frames_produce_transparent_motion() {
    let mut pipeline = motion_diff_pipeline();
    let mut source = VecSource::new(vec![black(0, 64), black(1, 64)]);
    let mut sink = MemorySink::new();

    let outcomes = tick_all(&mut pipeline, &mut source, &mut sink, 2);
    let TickOutcome::Processed(report) = &outcomes[1] else {
        panic!("second frame not processed: {:?}", outcomes[1]);
    };
    assert_eq!(report.applied, vec![TransformKind::MotionDiff]);

    let pixels = sink.last_pixels().unwrap();
    assert_eq!(pixels.len(), 64 * 64 * 4);
    assert!(pixels.chunks_exact(4).all(|px| px[3] == 0));
}

#[test]
fn moving_square_lights_up_motion() {
    let mut pipeline = motion_diff_pipeline();
    let mut source = VecSource::new(vec![black(0, 16), with_white_corner(1, 16)]);
    let mut sink = MemorySink::new();
    tick_all(&mut pipeline, &mut source, &mut sink, 2);

    let pixels = sink.last_pixels().unwrap();
    assert_eq!(pixels[3], 255);
    let active = pixels.chunks_exact(4).filter(|px| px[3] > 0).count();
    assert_eq!(active, 1);
}

// ── History ────────────────────────────────────────────────────

#[test]
fn history_keeps_most_recent_frames() {
    let mut cfg = config(vec![Transform::with_defaults(TransformKind::MotionDiff)]);
    cfg.max_history_frames = Some(5);
    let mut pipeline = Pipeline::new(cfg).unwrap();
    let mut source = VecSource::new((0..8).map(|i| black(i, 8)).collect());
    let mut sink = MemorySink::new();
    tick_all(&mut pipeline, &mut source, &mut sink, 8);

    assert_eq!(pipeline.state().history.indices(), vec![3, 4, 5, 6, 7]);
    assert_eq!(pipeline.state().history.newest().unwrap().index, 7);
}

// ── Heat map ───────────────────────────────────────────────────

#[test]
fn heat_decays_once_motion_stops() {
    let params = HeatMapParams {
        decay_rate: 0.9,
        ..Default::default()
    };
    let mut set = TransformSet::new(vec![Transform::HeatMap(params)]).unwrap();
    let mut history = FrameHistory::with_capacity(10).unwrap();

    history.push(black(0, 4));
    for i in 1..=4 {
        history.push(with_white_corner(i, 4));
        let ctx = FrameContext::from_history(&history).unwrap();
        set.apply_all(&ctx, false);
    }

    let instance = set.get(TransformKind::HeatMap).unwrap();
    let TransformState::HeatMap(state) = instance.state() else {
        panic!("heat map without heat state");
    };
    assert!((state.value(0, 0) - 0.729).abs() < 1e-4);
    assert_eq!(state.value(1, 0), 0.0);
}

// ── Time shift ─────────────────────────────────────────────────

#[test]
fn time_shift_without_enough_history_passes_frame_through() {
    let params = TimeShiftParams {
        frame_offset: 5,
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(config(vec![Transform::TimeShift(params)])).unwrap();
    let frames: Vec<_> = (0..3).map(|i| Frame::test_pattern(i, 12, 6)).collect();
    let last = frames[2].clone();
    let mut source = VecSource::new(frames);
    let mut sink = MemorySink::new();

    let outcomes = tick_all(&mut pipeline, &mut source, &mut sink, 3);
    for outcome in &outcomes {
        let TickOutcome::Processed(report) = outcome else {
            panic!("unexpected {outcome:?}");
        };
        assert!(report.applied.is_empty());
    }
    assert_eq!(sink.last_pixels(), Some(last.pixels()));
}

#[test]
fn time_shift_engages_once_history_is_deep_enough() {
    let params = TimeShiftParams {
        frame_offset: 2,
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(config(vec![Transform::TimeShift(params)])).unwrap();
    let mut source = VecSource::new(vec![black(0, 4), black(1, 4), with_white_corner(2, 4)]);
    let mut sink = MemorySink::new();

    let outcomes = tick_all(&mut pipeline, &mut source, &mut sink, 3);
    let TickOutcome::Processed(report) = &outcomes[2] else {
        panic!("unexpected {:?}", outcomes[2]);
    };
    assert_eq!(report.applied, vec![TransformKind::TimeShift]);
    assert_eq!(&sink.last_pixels().unwrap()[..4], &[255, 255, 255, 255]);
}

// ── Gating and blending ────────────────────────────────────────

#[test]
fn frame_skipping_processes_every_nth_frame() {
    let mut cfg = config(vec![Transform::with_defaults(TransformKind::MotionDiff)]);
    cfg.frame_skipping = Some(3);
    let mut pipeline = Pipeline::new(cfg).unwrap();
    let mut source = VecSource::new((0..10).map(|i| black(i, 8)).collect());
    let mut sink = MemorySink::new();

    let summary = run_fixed_rate(&mut pipeline, &mut source, &mut sink, 0.0, None);
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.skipped, 6);
    assert_eq!(pipeline.state().history.indices(), vec![0, 3, 6, 9]);
}

#[test]
fn blending_disabled_shows_last_active_effect() {
    let mut cfg = config(vec![
        Transform::with_defaults(TransformKind::MotionDiff),
        Transform::with_defaults(TransformKind::ColorShift),
    ]);
    cfg.blend_multiple_effects = false;
    let mut pipeline = Pipeline::new(cfg).unwrap();
    let mut source = VecSource::new(vec![black(0, 8), black(1, 8)]);
    let mut sink = MemorySink::new();
    tick_all(&mut pipeline, &mut source, &mut sink, 2);

    // Color shift of a black frame is opaque black; motion of identical frames is transparent
    let pixels = sink.last_pixels().unwrap();
    assert!(pixels.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
}

#[test]
fn all_transforms_run_together() {
    let set = TransformSet::standard(&TransformKind::ALL);
    let mut pipeline = Pipeline::with_transform_set(config(Vec::new()), set).unwrap();
    let frames: Vec<_> = (0..12)
        .map(|i| if i % 2 == 0 { black(i, 16) } else { with_white_corner(i, 16) })
        .collect();
    let mut source = VecSource::new(frames);
    let mut sink = MemorySink::new();

    let summary = run_fixed_rate(&mut pipeline, &mut source, &mut sink, 0.0, None);
    assert_eq!(summary.processed, 12);
    assert_eq!(sink.last_size(), Some((16, 16)));
    assert_eq!(pipeline.active_transforms().len(), TransformKind::ALL.len());
}
