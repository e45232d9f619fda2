//! Dominant colour extraction.
//!
//! Pixels are sampled with a fixed stride, transparent and near-white pixels
//! are dropped (erased background must not win the vote), and the rest are
//! clustered with k-means in Lab space. Clusters are ranked by how many
//! sampled pixels they hold.

use std::collections::HashMap;
use std::path::Path;

use image::{DynamicImage, RgbImage, RgbaImage};
use kmeans_colors::get_kmeans;
use log::debug;
use palette::{IntoColor, Lab, Srgb};

use crate::config::PaletteConfig;
use crate::error::{Result, SlidePaletteError};

/// Pixels with all channels above this are treated as background.
const WHITE_CUTOFF: u8 = 250;
/// Pixels with alpha below this are ignored.
const ALPHA_CUTOFF: u8 = 125;

/// Settings for one palette extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaletteOptions {
    pub color_count: usize,
    /// Sampling stride; 1 visits every pixel
    pub quality: usize,
    pub max_iterations: usize,
    pub convergence: f32,
    pub seed: u64,
}

impl Default for PaletteOptions {
    fn default() -> Self {
        PaletteOptions::from(&PaletteConfig::default())
    }
}

impl From<&PaletteConfig> for PaletteOptions {
    fn from(config: &PaletteConfig) -> Self {
        Self {
            color_count: config.color_count,
            quality: config.quality,
            max_iterations: config.max_iterations,
            convergence: config.convergence,
            seed: config.seed,
        }
    }
}

impl PaletteOptions {
    fn validate(&self) -> Result<()> {
        if self.color_count == 0 || self.color_count > u8::MAX as usize {
            return Err(SlidePaletteError::invalid("color_count", self.color_count));
        }
        if self.quality == 0 {
            return Err(SlidePaletteError::invalid("quality", self.quality));
        }
        Ok(())
    }
}

/// Which palette entry represents a thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PaletteIndex(pub usize);

impl PaletteIndex {
    /// The most dominant colour
    pub const DOMINANT: PaletteIndex = PaletteIndex(0);
}

/// Palette entry with its share of the sampled pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Swatch {
    pub rgb: [u8; 3],
    /// Fraction of sampled pixels in this cluster (0.0-1.0)
    pub population: f32,
}

/// Dominant colours ordered from most to least dominant.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    swatches: Vec<Swatch>,
}

impl Palette {
    pub fn len(&self) -> usize {
        self.swatches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swatches.is_empty()
    }

    pub fn get(&self, index: PaletteIndex) -> Result<[u8; 3]> {
        self.swatches
            .get(index.0)
            .map(|s| s.rgb)
            .ok_or(SlidePaletteError::PaletteIndexOutOfRange {
                index: index.0,
                len: self.swatches.len(),
            })
    }
}

/// Extract the palette of a persisted thumbnail.
///
/// Files that cannot be read or decoded fail with `PaletteExtraction`
/// naming the path.
pub fn extract_palette_from_path(path: &Path, options: &PaletteOptions) -> Result<Palette> {
    let label = path.display().to_string();
    let img = image::open(path).map_err(|e| SlidePaletteError::palette(&label, e.to_string()))?;
    extract_palette_dynamic(&img, &label, options)
}

/// Extract the palette of an in-memory RGB raster.
pub fn extract_palette(image: &RgbImage, label: &str, options: &PaletteOptions) -> Result<Palette> {
    options.validate()?;
    let pixels = sample_pixels(
        image.pixels().map(|p| [p.0[0], p.0[1], p.0[2], u8::MAX]),
        options.quality,
    );
    quantize(&pixels, label, options)
}

fn extract_palette_dynamic(
    image: &DynamicImage,
    label: &str,
    options: &PaletteOptions,
) -> Result<Palette> {
    options.validate()?;
    let rgba: RgbaImage = image.to_rgba8();
    let pixels = sample_pixels(rgba.pixels().map(|p| p.0), options.quality);
    quantize(&pixels, label, options)
}

/// Every `quality`-th pixel that is opaque and not near-white
fn sample_pixels(pixels: impl Iterator<Item = [u8; 4]>, quality: usize) -> Vec<[u8; 3]> {
    pixels
        .step_by(quality)
        .filter(|p| p[3] >= ALPHA_CUTOFF)
        .filter(|p| !(p[0] > WHITE_CUTOFF && p[1] > WHITE_CUTOFF && p[2] > WHITE_CUTOFF))
        .map(|p| [p[0], p[1], p[2]])
        .collect()
}

fn quantize(pixels: &[[u8; 3]], label: &str, options: &PaletteOptions) -> Result<Palette> {
    if pixels.is_empty() {
        return Err(SlidePaletteError::palette(
            label,
            "no tissue pixels left after dropping background",
        ));
    }
    let total = pixels.len() as f32;

    let mut distinct: HashMap<[u8; 3], usize> = HashMap::new();
    for p in pixels {
        *distinct.entry(*p).or_default() += 1;
        if distinct.len() > options.color_count {
            break;
        }
    }

    // Few distinct colours: every colour is its own cluster
    if distinct.len() <= options.color_count {
        debug!("{label}: {} distinct colours, k-means skipped", distinct.len());
        let clusters = distinct
            .into_iter()
            .map(|(rgb, count)| (rgb, count, lightness(rgb)))
            .collect();
        return Ok(rank(clusters, total, label));
    }

    let lab_pixels: Vec<Lab> = pixels
        .iter()
        .map(|&[r, g, b]| Srgb::<u8>::new(r, g, b).into_linear().into_color())
        .collect();

    let kmeans = get_kmeans(
        options.color_count,
        options.max_iterations,
        options.convergence,
        false,
        &lab_pixels,
        options.seed,
    );

    let mut counts = vec![0usize; kmeans.centroids.len()];
    for &idx in &kmeans.indices {
        counts[idx as usize] += 1;
    }

    let clusters = kmeans
        .centroids
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(&lab, count)| {
            let rgb_f32: Srgb<f32> = Srgb::from_linear(lab.into_color());
            let c: Srgb<u8> = rgb_f32.into_format::<u8>();
            ([c.red, c.green, c.blue], count, lab.l)
        })
        .collect();

    debug!(
        "{label}: k-means over {} sampled pixels, score {:.3}",
        pixels.len(),
        kmeans.score
    );
    Ok(rank(clusters, total, label))
}

/// Most populous cluster first; equal populations put the darker colour first
fn rank(mut clusters: Vec<([u8; 3], usize, f32)>, total: f32, label: &str) -> Palette {
    clusters.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then(a.2.total_cmp(&b.2))
            .then(a.0.cmp(&b.0))
    });
    let swatches: Vec<Swatch> = clusters
        .into_iter()
        .map(|(rgb, count, _)| Swatch {
            rgb,
            population: count as f32 / total,
        })
        .collect();
    for (i, swatch) in swatches.iter().enumerate() {
        debug!(
            "{label}: colour {i} {:?} covers {:.1}% of sampled pixels",
            swatch.rgb,
            swatch.population * 100.0
        );
    }
    Palette { swatches }
}

fn lightness([r, g, b]: [u8; 3]) -> f32 {
    let lab: Lab = Srgb::<u8>::new(r, g, b).into_linear().into_color();
    lab.l
}
