//! Color hints attached to behavior edges.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const GREEN: Rgb = Rgb { r: 0.0, g: 1.0, b: 0.0 };
    pub const RED: Rgb = Rgb { r: 1.0, g: 0.0, b: 0.0 };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Linear blend towards `other`; `t` is clamped to `[0, 1]`.
    pub fn lerp(&self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        Rgb {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
        }
    }

    /// `#rrggbb`, as Graphviz expects.
    pub fn to_hex(&self) -> String {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", channel(self.r), channel(self.g), channel(self.b))
    }
}

/// Start/end colors of a call gradient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub call_start: Rgb,
    pub call_end: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            call_start: Rgb::GREEN,
            call_end: Rgb::RED,
        }
    }
}

impl Palette {
    /// Colors for the segment `[step * index, step * (index + 1)]` of the gradient.
    pub fn segment(&self, step: f32, index: usize) -> (Rgb, Rgb) {
        let from = step * index as f32;
        let to = step * (index + 1) as f32;
        (
            self.call_start.lerp(self.call_end, from),
            self.call_start.lerp(self.call_end, to),
        )
    }
}
