//! Configuration files feeding a running pipeline, and the export dump.

use std::time::Instant;

use motionscope_core::{Frame, MotionScopeError};
use motionscope_effects::{Transform, TransformKind};
use motionscope_pipeline::{
    BlendMode, ExportSnapshot, MemorySink, Pipeline, PipelineConfig, ProcessingQuality, VecSource,
};
use proptest::prelude::*;

const FULL_CONFIG: &str = r#"{
    "processingQuality": "low",
    "frameSkipping": 1,
    "maxHistoryFrames": 12,
    "blendMultipleEffects": true,
    "blendMode": "overlay",
    "adaptiveQuality": false,
    "targetFrameBudgetMs": 33.0,
    "backend": "worker",
    "transforms": [
        { "type": "heat-map", "decayRate": 0.8, "palette": "viridis" },
        { "type": "time-shift", "frameOffset": 3, "mode": "onion-skin" },
        { "type": "color-shift" }
    ]
}"#;

#[test]
fn full_config_builds_pipeline() {
    let config = PipelineConfig::from_json(FULL_CONFIG).unwrap();
    assert_eq!(config.processing_quality, ProcessingQuality::Low);
    assert_eq!(config.blend_mode, BlendMode::Overlay);
    assert_eq!(config.effective_history(), 12);

    let pipeline = Pipeline::new(config).unwrap();
    assert_eq!(
        pipeline.active_transforms(),
        vec![TransformKind::HeatMap, TransformKind::TimeShift, TransformKind::ColorShift]
    );
    assert_eq!(pipeline.state().history.capacity(), 12);
    assert_eq!(pipeline.state().quality.downscale_factor(), 3);
}

#[test]
fn unknown_blend_mode_falls_back_to_additive() {
    let config = PipelineConfig::from_json(r#"{ "blendMode": "multiply" }"#).unwrap();
    assert_eq!(config.blend_mode, BlendMode::Additive);
}

#[test]
fn invalid_parameters_are_rejected() {
    let bad = [
        r#"{ "frameSkipping": 0 }"#,
        r#"{ "maxHistoryFrames": 0 }"#,
        r#"{ "targetFrameBudgetMs": -1 }"#,
        r#"{ "transforms": [{ "type": "heat-map", "decayRate": 1.5 }] }"#,
    ];
    for text in bad {
        let err = PipelineConfig::from_json(text).unwrap_err();
        assert!(matches!(err, MotionScopeError::InvalidParameter(_)), "{text}: {err}");
    }
}

#[test]
fn unknown_transform_type_is_a_serialization_error() {
    let err =
        PipelineConfig::from_json(r#"{ "transforms": [{ "type": "sharpen" }] }"#).unwrap_err();
    assert!(matches!(err, MotionScopeError::Serialization(_)));
}

#[test]
fn export_after_a_run_describes_it() {
    let config = PipelineConfig {
        processing_quality: ProcessingQuality::High,
        adaptive_quality: false,
        transforms: vec![
            Transform::with_defaults(TransformKind::MotionDiff),
            Transform::with_defaults(TransformKind::EdgeDetect),
        ],
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(config).unwrap();
    let mut source = VecSource::new((0..4).map(|i| Frame::test_pattern(i, 10, 10)).collect());
    let mut sink = MemorySink::new();
    for _ in 0..4 {
        pipeline.tick(&mut source, &mut sink, Instant::now());
    }

    let json = ExportSnapshot::capture(&pipeline, 42).to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["timestamp"], 42);
    assert_eq!(value["input"]["framesProcessed"], 4);
    assert_eq!(value["output"]["width"], 10);
    assert_eq!(value["transformsActive"][1], "edge-detect");
    assert_eq!(value["config"]["blendMode"], "screen");
}

proptest! {
    #[test]
    fn config_json_survives_reload(
        skip in 1u32..8,
        history in 1usize..200,
        budget in 1.0f64..100.0,
        quality in 0usize..4,
    ) {
        let config = PipelineConfig {
            processing_quality: ProcessingQuality::ALL[quality],
            frame_skipping: Some(skip),
            max_history_frames: Some(history),
            target_frame_budget_ms: budget,
            ..Default::default()
        };
        let reloaded = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
        prop_assert_eq!(reloaded.effective_skip(), skip);
        prop_assert_eq!(reloaded.effective_history(), history);
        prop_assert_eq!(reloaded.processing_quality, config.processing_quality);
        prop_assert!((reloaded.target_frame_budget_ms - budget).abs() < 1e-9);
    }
}
