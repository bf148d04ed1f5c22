//! Pool of reusable RGBA output buffers.
//!
//! Avoids allocating a full-frame buffer for every composite by keeping
//! buffers keyed by (width, height) with an in-use flag per buffer.

use std::collections::HashMap;
use std::sync::Arc;

use motionscope_core::{rgba_len, EffectBuffer};
use parking_lot::Mutex;
use tracing::trace;

/// Pool shared between the driver and the worker executor.
pub type SharedBufferPool = Arc<Mutex<BufferPool>>;

/// Key for pooled buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BufferKey {
    width: u32,
    height: u32,
}

#[derive(Debug)]
struct Slot {
    id: usize,
    in_use: bool,
    /// Storage while the buffer is free; `None` while it is checked out.
    storage: Option<Vec<u8>>,
}

/// A buffer checked out of the pool, or an unpooled one passed through.
#[derive(Debug, Clone, PartialEq)]
pub struct PooledBuffer {
    id: Option<usize>,
    pub buffer: EffectBuffer,
}

impl PooledBuffer {
    /// Wrap a buffer that did not come from a pool.
    pub fn unpooled(buffer: EffectBuffer) -> Self {
        Self { id: None, buffer }
    }

    pub fn id(&self) -> Option<usize> {
        self.id
    }
}

/// Pool of reusable CPU buffers.
#[derive(Debug, Default)]
pub struct BufferPool {
    slots: HashMap<BufferKey, Vec<Slot>>,
    next_id: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedBufferPool {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Acquire a zeroed buffer from the pool or allocate a new one.
    pub fn acquire(&mut self, width: u32, height: u32) -> PooledBuffer {
        let key = BufferKey { width, height };
        let slots = self.slots.entry(key).or_default();

        // Try to reuse a free one
        if let Some(slot) = slots.iter_mut().find(|s| !s.in_use) {
            slot.in_use = true;
            let storage = slot.storage.take().unwrap_or_default();
            return PooledBuffer {
                id: Some(slot.id),
                buffer: EffectBuffer::from_storage(width, height, storage),
            };
        }

        let id = self.next_id;
        self.next_id += 1;
        trace!(id, width, height, "pool allocation");
        slots.push(Slot {
            id,
            in_use: true,
            storage: None,
        });
        PooledBuffer {
            id: Some(id),
            buffer: EffectBuffer::transparent(width, height),
        }
    }

    /// Return a buffer to the pool. Unpooled buffers are dropped.
    pub fn release(&mut self, pooled: PooledBuffer) {
        let Some(id) = pooled.id else {
            return;
        };
        let key = BufferKey {
            width: pooled.buffer.width,
            height: pooled.buffer.height,
        };
        if let Some(slot) = self
            .slots
            .get_mut(&key)
            .and_then(|slots| slots.iter_mut().find(|s| s.id == id))
        {
            slot.in_use = false;
            slot.storage = Some(pooled.buffer.pixels);
        }
    }

    /// Bytes held by every pooled buffer, in use or free.
    pub fn memory_usage(&self) -> usize {
        self.slots
            .iter()
            .map(|(key, slots)| rgba_len(key.width, key.height) * slots.len())
            .sum()
    }

    /// Number of buffers in the pool.
    pub fn buffer_count(&self) -> usize {
        self.slots.values().map(|v| v.len()).sum()
    }

    /// Number of buffers currently checked out.
    pub fn in_use_count(&self) -> usize {
        self.slots
            .values()
            .flat_map(|v| v.iter())
            .filter(|s| s.in_use)
            .count()
    }

    /// Drop every free buffer. Checked-out buffers stay tracked.
    pub fn clear(&mut self) {
        for slots in self.slots.values_mut() {
            slots.retain(|s| s.in_use);
        }
        self.slots.retain(|_, v| !v.is_empty());
    }
}
