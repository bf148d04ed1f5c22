//! Frame and effect buffer types for RGBA8 video frames in CPU memory.
//!
//! All buffers are tightly packed, row-major RGBA with no row padding, so a
//! pixel at `(x, y)` lives at byte offset `(y * width + x) * 4`.

use crate::error::{MotionScopeError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Byte length of a packed RGBA8 buffer.
#[inline]
pub fn rgba_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// A decoded video frame.
///
/// Frames are immutable once produced. After being pushed into the
/// [`FrameHistory`](crate::FrameHistory) they are shared as [`SharedFrame`].
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position of this frame in the source stream.
    pub index: u64,
    /// Presentation timestamp in seconds.
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    pixels: Vec<u8>,
}

/// Arc-wrapped frame for shared, immutable ownership.
pub type SharedFrame = Arc<Frame>;

impl Frame {
    /// Create a frame from packed RGBA8 pixels.
    pub fn new(
        index: u64,
        timestamp: f64,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(MotionScopeError::InvalidParameter(format!(
                "frame dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let expected = rgba_len(width, height);
        if pixels.len() != expected {
            return Err(MotionScopeError::InvalidParameter(format!(
                "frame {index}: expected {expected} bytes for {width}x{height}, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            index,
            timestamp,
            width,
            height,
            pixels,
        })
    }

    /// A frame filled with a single opaque-or-not color.
    pub fn solid(index: u64, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity(rgba_len(width, height));
        for _ in 0..(width as usize * height as usize) {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            index,
            timestamp: 0.0,
            width,
            height,
            pixels,
        }
    }

    /// Create a test pattern frame (color bars).
    pub fn test_pattern(index: u64, width: u32, height: u32) -> Self {
        const BARS: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [255, 255, 0, 255],   // Yellow
            [0, 255, 255, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [255, 0, 0, 255],     // Red
            [0, 0, 255, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];

        let mut pixels = vec![0u8; rgba_len(width, height)];
        for y in 0..height as usize {
            for x in 0..width as usize {
                let bar = x * 8 / width.max(1) as usize;
                let i = (y * width as usize + x) * BYTES_PER_PIXEL;
                pixels[i..i + 4].copy_from_slice(&BARS[bar.min(7)]);
            }
        }
        Self {
            index,
            timestamp: 0.0,
            width,
            height,
            pixels,
        }
    }

    /// Raw RGBA bytes.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixels viewed as `[r, g, b, a]` quads.
    #[inline]
    pub fn rgba(&self) -> &[[u8; 4]] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Pixel at `(x, y)`. Panics when out of bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.rgba()[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether `other` has the same dimensions as this frame.
    #[inline]
    pub fn same_size(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Total memory usage of the pixel data in bytes.
    pub fn memory_size(&self) -> usize {
        self.pixels.len()
    }

    /// Consume the frame and return its pixel storage.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Shrink by an integer factor using a box filter.
    ///
    /// Output dimensions are `max(1, dim / factor)`; a factor of 1 returns a copy.
    pub fn downscale(&self, factor: u32) -> Frame {
        let factor = factor.max(1);
        if factor == 1 {
            return self.clone();
        }
        let dw = (self.width / factor).max(1);
        let dh = (self.height / factor).max(1);
        let src = self.rgba();
        let mut pixels = vec![0u8; rgba_len(dw, dh)];

        for y in 0..dh {
            for x in 0..dw {
                let x0 = x * factor;
                let y0 = y * factor;
                let x1 = (x0 + factor).min(self.width);
                let y1 = (y0 + factor).min(self.height);

                let mut sum = [0u32; 4];
                let mut count = 0u32;
                for sy in y0..y1 {
                    for sx in x0..x1 {
                        let p = src[(sy * self.width + sx) as usize];
                        for c in 0..4 {
                            sum[c] += p[c] as u32;
                        }
                        count += 1;
                    }
                }
                let di = ((y * dw + x) as usize) * BYTES_PER_PIXEL;
                for c in 0..4 {
                    pixels[di + c] = (sum[c] / count.max(1)) as u8;
                }
            }
        }

        Frame {
            index: self.index,
            timestamp: self.timestamp,
            width: dw,
            height: dh,
            pixels,
        }
    }

    /// Resample to an arbitrary size with nearest-neighbour sampling.
    pub fn resize_nearest(&self, width: u32, height: u32) -> Frame {
        let width = width.max(1);
        let height = height.max(1);
        if width == self.width && height == self.height {
            return self.clone();
        }
        let src = self.rgba();
        let mut pixels = vec![0u8; rgba_len(width, height)];
        for y in 0..height {
            let sy = (y as u64 * self.height as u64 / height as u64) as u32;
            for x in 0..width {
                let sx = (x as u64 * self.width as u64 / width as u64) as u32;
                let di = ((y * width + x) as usize) * BYTES_PER_PIXEL;
                pixels[di..di + 4].copy_from_slice(&src[(sy * self.width + sx) as usize]);
            }
        }
        Frame {
            index: self.index,
            timestamp: self.timestamp,
            width,
            height,
            pixels,
        }
    }
}

/// Output of a single transform: RGBA8, same size as the current frame.
///
/// The alpha channel is an activation mask; 0 means the transform has no
/// effect at that pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl EffectBuffer {
    /// A fully transparent buffer.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; rgba_len(width, height)],
        }
    }

    /// Wrap existing storage, resizing it to fit and zeroing its contents.
    pub fn from_storage(width: u32, height: u32, mut storage: Vec<u8>) -> Self {
        storage.clear();
        storage.resize(rgba_len(width, height), 0);
        Self {
            width,
            height,
            pixels: storage,
        }
    }

    /// Copy of a frame's pixels (used for passthrough output).
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            pixels: frame.pixels().to_vec(),
        }
    }

    #[inline]
    pub fn rgba(&self) -> &[[u8; 4]] {
        bytemuck::cast_slice(&self.pixels)
    }

    #[inline]
    pub fn rgba_mut(&mut self) -> &mut [[u8; 4]] {
        bytemuck::cast_slice_mut(&mut self.pixels)
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.rgba()[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let w = self.width;
        self.rgba_mut()[(y * w + x) as usize] = rgba;
    }

    /// Number of pixels with non-zero alpha.
    pub fn active_pixels(&self) -> usize {
        self.rgba().iter().filter(|p| p[3] != 0).count()
    }

    /// True when no pixel is activated.
    pub fn is_fully_transparent(&self) -> bool {
        self.rgba().iter().all(|p| p[3] == 0)
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether this buffer matches the given frame's size.
    pub fn matches(&self, frame: &Frame) -> bool {
        self.width == frame.width && self.height == frame.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        assert!(Frame::new(0, 0.0, 4, 4, vec![0; 10]).is_err());
        assert!(Frame::new(0, 0.0, 0, 4, vec![]).is_err());
        assert!(Frame::new(0, 0.0, 4, 4, vec![0; 64]).is_ok());
    }

    #[test]
    fn test_test_pattern() {
        let frame = Frame::test_pattern(3, 64, 8);
        assert_eq!(frame.index, 3);
        assert_eq!(frame.memory_size(), 64 * 8 * 4);
        // First bar white, last bar black
        assert_eq!(frame.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(frame.pixel(63, 7), [0, 0, 0, 255]);
    }

    #[test]
    fn test_downscale_averages_blocks() {
        let mut pixels = vec![0u8; rgba_len(2, 2)];
        // One white pixel in a 2x2 black block
        pixels[0..4].copy_from_slice(&[255, 255, 255, 255]);
        let frame = Frame::new(0, 0.0, 2, 2, pixels).unwrap();
        let small = frame.downscale(2);
        assert_eq!(small.dimensions(), (1, 1));
        assert_eq!(small.pixel(0, 0), [63, 63, 63, 63]);
    }

    #[test]
    fn test_downscale_never_reaches_zero() {
        let frame = Frame::solid(0, 3, 3, [10, 20, 30, 255]);
        let small = frame.downscale(4);
        assert_eq!(small.dimensions(), (1, 1));
        assert_eq!(small.pixel(0, 0), [10, 20, 30, 255]);
    }

    #[test]
    fn test_resize_nearest() {
        let frame = Frame::test_pattern(0, 16, 4);
        let resized = frame.resize_nearest(8, 2);
        assert_eq!(resized.dimensions(), (8, 2));
        assert_eq!(resized.pixel(0, 0), frame.pixel(0, 0));
        assert_eq!(resized.pixel(7, 1), frame.pixel(14, 2));
    }

    #[test]
    fn test_effect_buffer_activation() {
        let mut buf = EffectBuffer::transparent(4, 4);
        assert!(buf.is_fully_transparent());
        buf.set_pixel(1, 2, [255, 0, 0, 255]);
        assert_eq!(buf.active_pixels(), 1);
        assert_eq!(buf.pixel(1, 2), [255, 0, 0, 255]);
    }

    #[test]
    fn test_from_storage_zeroes() {
        let buf = EffectBuffer::from_storage(2, 2, vec![7u8; 100]);
        assert_eq!(buf.pixels.len(), 16);
        assert!(buf.pixels.iter().all(|&b| b == 0));
    }
}
