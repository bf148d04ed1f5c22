//! Merges the active transform outputs into one displayable buffer.

use motionscope_core::{EffectBuffer, Frame};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::warn;

use crate::blend::BlendMode;
use crate::buffer_pool::{PooledBuffer, SharedBufferPool};

/// Effect buffers produced for one frame; most frames carry only a few.
pub type EffectList = SmallVec<[EffectBuffer; 4]>;

/// How multiple effects are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositePolicy {
    /// When false, the last active effect wins.
    pub blend: bool,
    pub mode: BlendMode,
}

impl Default for CompositePolicy {
    fn default() -> Self {
        Self {
            blend: true,
            mode: BlendMode::Screen,
        }
    }
}

/// Compositor drawing its output buffers from a shared pool.
#[derive(Debug, Clone)]
pub struct Compositor {
    policy: CompositePolicy,
    pool: SharedBufferPool,
}

impl Compositor {
    pub fn new(policy: CompositePolicy, pool: SharedBufferPool) -> Self {
        Self { policy, pool }
    }

    pub fn policy(&self) -> CompositePolicy {
        self.policy
    }

    pub fn pool(&self) -> &SharedBufferPool {
        &self.pool
    }

    /// Combine `effects` for display over `current`.
    ///
    /// No effects yields the unmodified frame; a single effect is passed
    /// through as is. Effects whose size differs from the frame are dropped.
    pub fn compose(&self, current: &Frame, effects: EffectList) -> PooledBuffer {
        let mut effects: EffectList = effects
            .into_iter()
            .filter(|e| {
                let ok = e.matches(current);
                if !ok {
                    warn!(
                        frame = current.index,
                        effect = ?e.dimensions(),
                        expected = ?current.dimensions(),
                        "dropping effect with mismatched dimensions"
                    );
                }
                ok
            })
            .collect();

        match effects.len() {
            0 => {
                let mut out = self.pool.lock().acquire(current.width, current.height);
                out.buffer.pixels.copy_from_slice(current.pixels());
                out
            }
            1 => PooledBuffer::unpooled(effects.remove(0)),
            _ if !self.policy.blend => {
                // Length checked above
                let last = effects.pop().unwrap_or_else(|| EffectBuffer::from_frame(current));
                PooledBuffer::unpooled(last)
            }
            _ => {
                let mut out = self.pool.lock().acquire(current.width, current.height);
                blend_into(&mut out.buffer, &effects, self.policy.mode);
                out
            }
        }
    }

    /// Hand a composite back to the pool once it has been presented.
    pub fn recycle(&self, composite: PooledBuffer) {
        self.pool.lock().release(composite);
    }
}

/// Blend every effect into `out` channel by channel; alpha takes the maximum.
pub fn blend_into(out: &mut EffectBuffer, effects: &[EffectBuffer], mode: BlendMode) {
    let mut channel: SmallVec<[u8; 8]> = SmallVec::with_capacity(effects.len());
    for (i, dst) in out.rgba_mut().iter_mut().enumerate() {
        for c in 0..3 {
            channel.clear();
            channel.extend(effects.iter().map(|e| e.rgba()[i][c]));
            dst[c] = mode.combine(&channel);
        }
        dst[3] = effects.iter().map(|e| e.rgba()[i][3]).max().unwrap_or(0);
    }
}
