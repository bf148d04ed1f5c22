//! Rolling processing metrics emitted once per second.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use motionscope_core::limits::METRICS_WINDOW_SAMPLES;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Length of one reporting window.
pub const METRICS_WINDOW: Duration = Duration::from_millis(1000);

/// Metrics published at the end of a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub fps: f64,
    pub avg_processing_time_ms: f64,
    pub frames_cached: usize,
    #[serde(rename = "memoryUsageMB")]
    pub memory_usage_mb: f64,
    pub dropped_frames: u64,
}

/// Processing-time window plus frame and drop counters.
#[derive(Debug, Clone)]
pub struct ProcessingMetrics {
    samples: VecDeque<Duration>,
    total_frames: u64,
    total_dropped: u64,
    window_frames: u64,
    window_dropped: u64,
    window_start: Option<Instant>,
}

impl Default for ProcessingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingMetrics {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(METRICS_WINDOW_SAMPLES),
            total_frames: 0,
            total_dropped: 0,
            window_frames: 0,
            window_dropped: 0,
            window_start: None,
        }
    }

    /// Record the processing time of one frame.
    pub fn record_frame(&mut self, duration: Duration) {
        if self.samples.len() == METRICS_WINDOW_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(duration);
        self.total_frames += 1;
        self.window_frames += 1;
    }

    /// Count a tick dropped because a frame was still in flight.
    pub fn record_drop(&mut self) {
        self.total_dropped += 1;
        self.window_dropped += 1;
    }

    /// Average over the retained samples, in milliseconds.
    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: Duration = self.samples.iter().sum();
        total.as_secs_f64() * 1000.0 / self.samples.len() as f64
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn total_dropped(&self) -> u64 {
        self.total_dropped
    }

    /// Emit a snapshot if at least one window has elapsed since the last one.
    ///
    /// The first call only starts the window. Per-window counters reset on
    /// emission; the duration samples are kept.
    pub fn poll(
        &mut self,
        now: Instant,
        frames_cached: usize,
        memory_bytes: usize,
    ) -> Option<MetricsSnapshot> {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return None;
        };
        let elapsed = now.saturating_duration_since(start);
        if elapsed < METRICS_WINDOW {
            return None;
        }

        let snapshot = MetricsSnapshot {
            fps: self.window_frames as f64 / elapsed.as_secs_f64(),
            avg_processing_time_ms: self.average_ms(),
            frames_cached,
            memory_usage_mb: memory_bytes as f64 / (1024.0 * 1024.0),
            dropped_frames: self.window_dropped,
        };
        debug!(
            fps = snapshot.fps,
            avg_ms = snapshot.avg_processing_time_ms,
            cached = frames_cached,
            dropped = snapshot.dropped_frames,
            "metrics window"
        );
        self.window_frames = 0;
        self.window_dropped = 0;
        self.window_start = Some(now);
        Some(snapshot)
    }

    /// Clear everything; used on stream restart.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
