//! Color ramps for heat-map rendering.

use serde::{Deserialize, Serialize};

/// Named color ramp mapping `[0, 1]` to RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    /// Black through red and yellow to white.
    #[default]
    Thermal,
    Viridis,
    Plasma,
}

const THERMAL: &[(f32, [u8; 3])] = &[
    (0.0, [0, 0, 0]),
    (0.33, [255, 0, 0]),
    (0.66, [255, 255, 0]),
    (1.0, [255, 255, 255]),
];

const VIRIDIS: &[(f32, [u8; 3])] = &[
    (0.0, [68, 1, 84]),
    (0.25, [59, 82, 139]),
    (0.5, [33, 145, 140]),
    (0.75, [94, 201, 98]),
    (1.0, [253, 231, 37]),
];

const PLASMA: &[(f32, [u8; 3])] = &[
    (0.0, [13, 8, 135]),
    (0.25, [126, 3, 168]),
    (0.5, [204, 71, 120]),
    (0.75, [248, 149, 64]),
    (1.0, [240, 249, 33]),
];

impl Palette {
    pub const ALL: [Palette; 3] = [Palette::Thermal, Palette::Viridis, Palette::Plasma];

    fn stops(self) -> &'static [(f32, [u8; 3])] {
        match self {
            Self::Thermal => THERMAL,
            Self::Viridis => VIRIDIS,
            Self::Plasma => PLASMA,
        }
    }

    /// Sample the ramp. `t` is clamped to `[0, 1]`.
    pub fn sample(self, t: f32) -> [u8; 3] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let stops = self.stops();
        for pair in stops.windows(2) {
            let (t0, c0) = pair[0];
            let (t1, c1) = pair[1];
            if t <= t1 {
                let f = (t - t0) / (t1 - t0);
                let mut out = [0u8; 3];
                for i in 0..3 {
                    out[i] = (c0[i] as f32 + (c1[i] as f32 - c0[i] as f32) * f).round() as u8;
                }
                return out;
            }
        }
        stops[stops.len() - 1].1
    }
}
