//! Frame sources feeding the pipeline and sinks receiving its output.

use motionscope_core::Frame;

/// Supplies raw frames at a requested size.
pub trait FrameSource {
    /// Full resolution of the source.
    fn native_size(&self) -> (u32, u32);

    /// Next frame rendered or resized to `width x height`, `None` when exhausted.
    fn next_frame(&mut self, width: u32, height: u32) -> Option<Frame>;
}

/// Receives composited buffers for display.
pub trait OutputSink {
    fn present(&mut self, pixels: &[u8], width: u32, height: u32);
}

/// Deterministic moving square over a diagonal gradient.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    width: u32,
    height: u32,
    fps: f64,
    total: Option<u64>,
    next_index: u64,
}

impl SyntheticSource {
    /// A source producing `total` frames, or frames forever if `None`.
    pub fn new(width: u32, height: u32, fps: f64, total: Option<u64>) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            fps: if fps > 0.0 { fps } else { 60.0 },
            total,
            next_index: 0,
        }
    }

    /// Rewind to the first frame.
    pub fn rewind(&mut self) {
        self.next_index = 0;
    }

    /// Render frame `index` at the given size.
    pub fn render(&self, index: u64, width: u32, height: u32) -> Frame {
        let width = width.max(1);
        let height = height.max(1);
        let side = (width.min(height) / 4).max(1);
        // Square moves two pixels per frame, bouncing off the sides
        let travel = (width - side) as u64;
        let sx = if travel == 0 {
            0
        } else {
            let step = (index * 2) % (travel * 2);
            (if step <= travel { step } else { travel * 2 - step }) as u32
        };
        let sy = (height - side) / 2;

        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                let inside = x >= sx && x < sx + side && y >= sy && y < sy + side;
                let px = if inside {
                    [255, 255, 255, 255]
                } else {
                    let g = ((x + y) * 255 / (width + height).max(1)) as u8;
                    [g / 2, g / 3, g, 255]
                };
                pixels.extend_from_slice(&px);
            }
        }
        match Frame::new(index, index as f64 / self.fps, width, height, pixels) {
            Ok(frame) => frame,
            Err(_) => Frame::solid(index, width, height, [0, 0, 0, 255]),
        }
    }
}

impl FrameSource for SyntheticSource {
    fn native_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self, width: u32, height: u32) -> Option<Frame> {
        if self.total.is_some_and(|t| self.next_index >= t) {
            return None;
        }
        let frame = self.render(self.next_index, width, height);
        self.next_index += 1;
        Some(frame)
    }
}

/// Replays a fixed list of frames, resizing each to the requested size.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    frames: Vec<Frame>,
    cursor: usize,
}

impl VecSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames, cursor: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len() - self.cursor
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

impl FrameSource for VecSource {
    fn native_size(&self) -> (u32, u32) {
        self.frames.first().map(|f| f.dimensions()).unwrap_or((1, 1))
    }

    fn next_frame(&mut self, width: u32, height: u32) -> Option<Frame> {
        let frame = self.frames.get(self.cursor)?;
        self.cursor += 1;
        if frame.dimensions() == (width, height) {
            Some(frame.clone())
        } else {
            Some(frame.resize_nearest(width, height))
        }
    }
}

/// Keeps the last presented buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub last: Option<(Vec<u8>, u32, u32)>,
    pub presented: u64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_pixels(&self) -> Option<&[u8]> {
        self.last.as_ref().map(|(p, _, _)| p.as_slice())
    }

    pub fn last_size(&self) -> Option<(u32, u32)> {
        self.last.as_ref().map(|&(_, w, h)| (w, h))
    }
}

impl OutputSink for MemorySink {
    fn present(&mut self, pixels: &[u8], width: u32, height: u32) {
        match self.last.as_mut() {
            Some((buf, w, h)) => {
                buf.clear();
                buf.extend_from_slice(pixels);
                *w = width;
                *h = height;
            }
            None => self.last = Some((pixels.to_vec(), width, height)),
        }
        self.presented += 1;
    }
}

/// Discards output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn present(&mut self, _pixels: &[u8], _width: u32, _height: u32) {}
}
