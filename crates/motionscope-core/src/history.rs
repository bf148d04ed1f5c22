//! Bounded FIFO history of recently processed frames.
//!
//! Indexed by "frames ago": `get(0)` is the newest frame, `get(1)` the one
//! before it. Frames are held as [`SharedFrame`] so readers can keep a
//! reference without ever observing a mutation.

use crate::error::{MotionScopeError, Result};
use crate::frame::SharedFrame;
use std::collections::VecDeque;
use tracing::trace;

/// Ring buffer of the most recent frames.
#[derive(Debug, Clone)]
pub struct FrameHistory {
    frames: VecDeque<SharedFrame>,
    capacity: usize,
}

impl FrameHistory {
    /// Create a history holding at most `capacity` frames.
    ///
    /// The ring storage is reserved up front; failing to reserve it is the
    /// one fatal error of pipeline construction.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(MotionScopeError::InvalidParameter(
                "history capacity must be at least 1".into(),
            ));
        }
        let mut frames = VecDeque::new();
        frames.try_reserve_exact(capacity).map_err(|e| {
            MotionScopeError::Allocation(format!("frame history of {capacity} slots: {e}"))
        })?;
        Ok(Self { frames, capacity })
    }

    /// Append the newest frame, evicting and returning the oldest when full.
    pub fn push(&mut self, frame: impl Into<SharedFrame>) -> Option<SharedFrame> {
        let frame = frame.into();
        let evicted = if self.frames.len() == self.capacity {
            self.frames.pop_front()
        } else {
            None
        };
        if let Some(ref old) = evicted {
            trace!(evicted = old.index, newest = frame.index, "history eviction");
        }
        self.frames.push_back(frame);
        evicted
    }

    /// Frame `offset` positions before the newest, if that far back is cached.
    pub fn get(&self, offset: usize) -> Option<&SharedFrame> {
        let len = self.frames.len();
        if offset >= len {
            return None;
        }
        self.frames.get(len - 1 - offset)
    }

    /// The newest frame.
    pub fn newest(&self) -> Option<&SharedFrame> {
        self.frames.back()
    }

    /// The oldest cached frame.
    pub fn oldest(&self) -> Option<&SharedFrame> {
        self.frames.front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every cached frame.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Change the capacity, evicting the oldest frames if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(MotionScopeError::InvalidParameter(
                "history capacity must be at least 1".into(),
            ));
        }
        while self.frames.len() > capacity {
            self.frames.pop_front();
        }
        if capacity > self.capacity {
            self.frames
                .try_reserve_exact(capacity - self.frames.len())
                .map_err(|e| {
                    MotionScopeError::Allocation(format!(
                        "frame history of {capacity} slots: {e}"
                    ))
                })?;
        }
        self.capacity = capacity;
        Ok(())
    }

    /// Frames from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &SharedFrame> {
        self.frames.iter().rev()
    }

    /// Frame indices from oldest to newest.
    pub fn indices(&self) -> Vec<u64> {
        self.frames.iter().map(|f| f.index).collect()
    }

    /// Bytes of pixel data held by the cache (`len * width * height * 4`
    /// for uniformly sized frames).
    pub fn memory_bytes(&self) -> usize {
        self.frames.iter().map(|f| f.memory_size()).sum()
    }
}
