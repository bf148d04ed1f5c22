//! Blend modes for merging several effect buffers.
//!
//! Each mode reduces the values of one channel across all effects to a
//! single value. Alpha is always the maximum of the inputs.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Blend mode for compositing effect buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Inverse product of inverses; never darkens.
    Screen,
    /// Per-channel mean.
    Overlay,
    /// Per-channel sum clamped to 255.
    #[default]
    Additive,
}

impl BlendMode {
    /// All blend modes in display order.
    pub const ALL: [BlendMode; 3] = [Self::Screen, Self::Overlay, Self::Additive];

    /// Lowercase name used in configuration and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Overlay => "overlay",
            Self::Additive => "additive",
        }
    }

    /// Parse a mode name; unknown names fall back to additive.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
            .unwrap_or_else(|| {
                warn!(mode = name, "unknown blend mode, using additive");
                Self::Additive
            })
    }

    /// Combine one channel's values from every effect.
    pub fn combine(self, values: &[u8]) -> u8 {
        match self {
            Self::Screen => screen(values),
            Self::Overlay => mean(values),
            Self::Additive => additive(values),
        }
    }
}

impl<'de> Deserialize<'de> for BlendMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// `255 - 255 * prod((255 - c) / 255)` in exact integer arithmetic.
///
/// The product is formed before any rounding, so the result does not depend
/// on the order of `values`.
pub fn screen(values: &[u8]) -> u8 {
    let Some(n) = values.len().checked_sub(1) else {
        return 0;
    };
    // The product of all inverses must fit as well as the denominator
    let fits = u32::try_from(values.len())
        .ok()
        .and_then(|len| 255u128.checked_pow(len))
        .is_some();
    if !fits {
        // Beyond u128 range: fold in float over sorted inputs instead
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        let inverse = sorted
            .iter()
            .fold(1.0f64, |acc, &c| acc * (255 - c) as f64 / 255.0);
        return (255.0 - 255.0 * inverse).round() as u8;
    }
    let denom = 255u128.pow(n as u32);
    let product: u128 = values.iter().map(|&c| (255 - c) as u128).product();
    let inverse = (product + denom / 2) / denom;
    255 - inverse.min(255) as u8
}

/// Rounded mean.
pub fn mean(values: &[u8]) -> u8 {
    if values.is_empty() {
        return 0;
    }
    let n = values.len() as u32;
    let sum: u32 = values.iter().map(|&v| v as u32).sum();
    ((sum + n / 2) / n) as u8
}

/// Saturating sum.
pub fn additive(values: &[u8]) -> u8 {
    values
        .iter()
        .fold(0u8, |acc, &v| acc.saturating_add(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn screen_of_black_is_identity() {
        assert_eq!(screen(&[120, 0]), 120);
        assert_eq!(screen(&[0, 0, 0]), 0);
        assert_eq!(screen(&[255, 10]), 255);
    }

    #[test]
    fn screen_of_two_halves() {
        // 255 - 128 * 128 / 255 = 255 - 64.25
        assert_eq!(screen(&[127, 127]), 191);
    }

    #[test]
    fn mean_and_additive() {
        assert_eq!(mean(&[10, 20, 31]), 20);
        assert_eq!(additive(&[200, 100]), 255);
        assert_eq!(additive(&[20, 30]), 50);
    }

    #[test]
    fn names_and_fallback() {
        for mode in BlendMode::ALL {
            assert_eq!(BlendMode::from_name(mode.name()), mode);
        }
        assert_eq!(BlendMode::from_name("SCREEN"), BlendMode::Screen);
        assert_eq!(BlendMode::from_name("multiply"), BlendMode::Additive);
    }

    proptest! {
        #[test]
        fn screen_is_permutation_invariant(mut values in prop::collection::vec(any::<u8>(), 2..8)) {
            let forward = screen(&values);
            values.reverse();
            prop_assert_eq!(screen(&values), forward);
            values.rotate_left(1);
            prop_assert_eq!(screen(&values), forward);
        }

        #[test]
        fn screen_never_darkens(values in prop::collection::vec(any::<u8>(), 1..8)) {
            let max = *values.iter().max().unwrap();
            prop_assert!(screen(&values) >= max);
        }
    }
}
