//! sRGB to CIE L*a*b* conversion.
//!
//! Every Lab value in this crate is computed against the D65 reference white
//! with sRGB primaries, so samples from different cohorts are comparable.

use palette::white_point::D65;
use palette::{FromColor, Lab, Srgb};
use serde::{Deserialize, Serialize};

/// A colour in CIE L*a*b* (D65).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabValue {
    /// Lightness, 0 (black) to 100 (white)
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

/// Convert an sRGB triple with channels in [0,1] to Lab.
///
/// Channels outside [0,1] are clamped first.
pub fn rgb_to_lab(rgb: [f64; 3]) -> LabValue {
    let [r, g, b] = rgb.map(|c| if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) });
    let lab: Lab<D65, f64> = Lab::from_color(Srgb::new(r, g, b));
    LabValue {
        l: lab.l,
        a: lab.a,
        b: lab.b,
    }
}

/// Convert an 8-bit sRGB triple to Lab.
pub fn rgb8_to_lab(rgb: [u8; 3]) -> LabValue {
    rgb_to_lab(normalize_rgb8(rgb))
}

/// Scale 8-bit channels to [0,1].
pub fn normalize_rgb8(rgb: [u8; 3]) -> [f64; 3] {
    rgb.map(|c| c as f64 / 255.0)
}

/// One thumbnail's selected palette colour in perceptual and display form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSample {
    /// Thumbnail the colour was taken from
    pub thumbnail: String,
    pub lab: LabValue,
    /// Display colour, channels in [0,1]
    pub rgb: [f64; 3],
}

impl ColorSample {
    pub fn from_rgb8(thumbnail: impl Into<String>, rgb: [u8; 3]) -> Self {
        let rgb = normalize_rgb8(rgb);
        Self {
            thumbnail: thumbnail.into(),
            lab: rgb_to_lab(rgb),
            rgb,
        }
    }

    /// 8-bit display colour
    pub fn rgb8(&self) -> [u8; 3] {
        self.rgb.map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8)
    }
}
