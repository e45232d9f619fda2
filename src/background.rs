//! Background erasure by global Otsu thresholding.
//!
//! Glass and slide background are brighter than stained tissue. Pixels whose
//! grey level lies above the Otsu threshold get 1.0 added to every channel and
//! are clamped, which turns them white while tissue pixels keep their colour.
//! Bright tissue above the threshold is clipped to white as well; this is an
//! accepted approximation.

use image::{DynamicImage, Rgb32FImage, RgbImage};
use log::debug;

const NUM_BUCKETS: usize = 256;

/// Luminance weights used for the greyscale conversion (ITU-R 709 as used by
/// scikit-image's `rgb2gray`).
const GREY_WEIGHTS: [f32; 3] = [0.2125, 0.7154, 0.0721];

/// Result of erasing the background of one raster.
#[derive(Debug, Clone)]
pub struct EraseOutcome {
    /// Erased raster, channels in [0,1]
    pub image: Rgb32FImage,
    /// Grey level above which pixels were treated as background
    pub threshold: f32,
    /// Fraction of pixels pushed to white
    pub background_fraction: f32,
    /// The grey histogram had no usable two-class split
    pub degenerate: bool,
}

impl EraseOutcome {
    /// Quantize to 8-bit RGB for saving or palette extraction
    pub fn to_rgb8(&self) -> RgbImage {
        let (w, h) = self.image.dimensions();
        RgbImage::from_fn(w, h, |x, y| {
            let p = self.image.get_pixel(x, y).0;
            image::Rgb(p.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
        })
    }
}

/// Grey level of one pixel with channels in [0,1]
#[inline(always)]
fn grey(rgb: [f32; 3]) -> f32 {
    GREY_WEIGHTS[0] * rgb[0] + GREY_WEIGHTS[1] * rgb[1] + GREY_WEIGHTS[2] * rgb[2]
}

/// Otsu threshold of a set of grey values.
///
/// The histogram spans `[min, max]` of the data in 256 bins; the returned
/// value is the centre of the bin that maximizes the inter-class variance.
/// Returns the common value when every sample is identical and `None` for
/// empty input.
pub fn otsu_threshold(data: &[f32]) -> Option<f32> {
    let first = *data.first()?;
    let (min, max) = data
        .iter()
        .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if max <= min {
        return Some(min);
    }

    let span = max - min;
    let mut histogram = [0u64; NUM_BUCKETS];
    for &value in data {
        let bucket = (((value - min) / span) * NUM_BUCKETS as f32) as usize;
        histogram[bucket.min(NUM_BUCKETS - 1)] += 1;
    }
    let bin_width = span / NUM_BUCKETS as f32;
    let centers: Vec<f64> = (0..NUM_BUCKETS)
        .map(|i| (min + bin_width * (i as f32 + 0.5)) as f64)
        .collect();

    // Class weights and means seen from the left (bins 0..=i) and the right (bins i..)
    let mut weight_left = [0f64; NUM_BUCKETS];
    let mut mean_left = [0f64; NUM_BUCKETS];
    let (mut count, mut moment) = (0f64, 0f64);
    for i in 0..NUM_BUCKETS {
        count += histogram[i] as f64;
        moment += histogram[i] as f64 * centers[i];
        weight_left[i] = count;
        mean_left[i] = if count > 0.0 { moment / count } else { 0.0 };
    }
    let mut weight_right = [0f64; NUM_BUCKETS];
    let mut mean_right = [0f64; NUM_BUCKETS];
    let (mut count, mut moment) = (0f64, 0f64);
    for i in (0..NUM_BUCKETS).rev() {
        count += histogram[i] as f64;
        moment += histogram[i] as f64 * centers[i];
        weight_right[i] = count;
        mean_right[i] = if count > 0.0 { moment / count } else { 0.0 };
    }

    let mut best_idx = 0usize;
    let mut best_variance = f64::NEG_INFINITY;
    for i in 0..NUM_BUCKETS - 1 {
        let diff = mean_left[i] - mean_right[i + 1];
        let variance = weight_left[i] * weight_right[i + 1] * diff * diff;
        if variance > best_variance {
            best_variance = variance;
            best_idx = i;
        }
    }

    Some(centers[best_idx] as f32)
}

/// Erase the background of a raster whose channels lie in [0,1].
///
/// `degenerate_range` is the smallest grey dynamic range considered a real
/// tissue/background split; below it the outcome is flagged as degenerate.
/// Degenerate images are still processed; reporting the flag is up to the
/// caller.
pub fn erase_background(image: &Rgb32FImage, degenerate_range: f32) -> EraseOutcome {
    let greys: Vec<f32> = image.pixels().map(|p| grey(p.0)).collect();
    let Some(threshold) = otsu_threshold(&greys) else {
        return EraseOutcome {
            image: image.clone(),
            threshold: 1.0,
            background_fraction: 0.0,
            degenerate: true,
        };
    };

    let (lo, hi) = greys
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    let mut erased = image.clone();
    let mut background = 0usize;
    for (pixel, &g) in erased.pixels_mut().zip(&greys) {
        let mask = if g > threshold { 1.0 } else { 0.0 };
        if mask > 0.0 {
            background += 1;
        }
        for c in pixel.0.iter_mut() {
            *c += mask;
            if *c > 1.0 {
                *c = 1.0;
            }
        }
    }

    let background_fraction = background as f32 / greys.len() as f32;
    let degenerate = hi - lo < degenerate_range || background == 0;
    debug!(
        "otsu threshold {threshold:.4}, grey range {:.4}, {:.1}% background",
        hi - lo,
        background_fraction * 100.0
    );

    EraseOutcome {
        image: erased,
        threshold,
        background_fraction,
        degenerate,
    }
}

/// Erase the background of an 8-bit thumbnail.
pub fn erase_background_rgb8(image: &RgbImage, degenerate_range: f32) -> EraseOutcome {
    let normalized = DynamicImage::ImageRgb8(image.clone()).into_rgb32f();
    erase_background(&normalized, degenerate_range)
}
