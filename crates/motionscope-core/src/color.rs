//! Color helpers shared by the transforms.

/// Linear RGBA color, components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Convert to 8-bit RGBA, rounding to nearest.
    pub fn to_rgba8(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }

    /// Opaque color from hue in degrees, saturation and value.
    ///
    /// Hue wraps, so 360 and 0 produce the same color.
    pub fn from_hsv(hue_deg: f32, saturation: f32, value: f32) -> Self {
        let s = saturation.clamp(0.0, 1.0);
        let v = value.clamp(0.0, 1.0);
        let sector = hue_deg.rem_euclid(360.0) / 60.0;
        let f = sector.fract();
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));

        let (r, g, b) = match sector as u32 % 6 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };
        Self::rgb(r, g, b)
    }
}

/// Mean of the R, G and B channels, in `[0, 255]`.
#[inline]
pub fn mean_intensity(p: [u8; 4]) -> f32 {
    (p[0] as f32 + p[1] as f32 + p[2] as f32) / 3.0
}

/// Mean absolute per-channel RGB difference between two pixels, in `[0, 255]`.
#[inline]
pub fn mean_abs_diff(a: [u8; 4], b: [u8; 4]) -> f32 {
    let dr = (a[0] as i16 - b[0] as i16).unsigned_abs();
    let dg = (a[1] as i16 - b[1] as i16).unsigned_abs();
    let db = (a[2] as i16 - b[2] as i16).unsigned_abs();
    (dr + dg + db) as f32 / 3.0
}
