//! Cohort aggregation: one colour sample per thumbnail, in input order.
//!
//! Aggregation does not stop at the first bad thumbnail. Every item is
//! attempted and failures are kept next to the samples in a [`CohortReport`],
//! so the caller can see exactly which thumbnails were lost before deciding
//! whether to plot. Nothing is accumulated across calls; combining cohorts is
//! an explicit [`CohortCollection::concat`].

use std::path::{Path, PathBuf};

use image::RgbImage;
use log::{debug, info, warn};

use crate::color::ColorSample;
use crate::error::{Result, SlidePaletteError, ThumbnailFailure};
use crate::quantize::{
    extract_palette, extract_palette_from_path, Palette, PaletteIndex, PaletteOptions,
};

/// A thumbnail the aggregator can pull a palette from.
pub trait ThumbnailInput {
    /// Identifier used in samples, logs and failure reports
    fn id(&self) -> String;

    fn palette(&self, options: &PaletteOptions) -> Result<Palette>;
}

impl ThumbnailInput for Path {
    fn id(&self) -> String {
        self.display().to_string()
    }

    fn palette(&self, options: &PaletteOptions) -> Result<Palette> {
        extract_palette_from_path(self, options)
    }
}

impl ThumbnailInput for PathBuf {
    fn id(&self) -> String {
        self.as_path().id()
    }

    fn palette(&self, options: &PaletteOptions) -> Result<Palette> {
        self.as_path().palette(options)
    }
}

/// A thumbnail held in memory, e.g. straight out of background erasure.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub name: String,
    pub image: RgbImage,
}

impl ThumbnailInput for Thumbnail {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn palette(&self, options: &PaletteOptions) -> Result<Palette> {
        extract_palette(&self.image, &self.name, options)
    }
}

/// Colour samples of one or more cohorts, in enumeration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortCollection {
    samples: Vec<ColorSample>,
}

impl CohortCollection {
    pub fn new(samples: Vec<ColorSample>) -> Self {
        Self { samples }
    }

    /// Concatenate collections in the given order
    pub fn concat<'a>(collections: impl IntoIterator<Item = &'a CohortCollection>) -> Self {
        Self {
            samples: collections
                .into_iter()
                .flat_map(|c| c.samples.iter().cloned())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[ColorSample] {
        &self.samples
    }

    pub fn lightness(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.lab.l).collect()
    }

    pub fn a_star(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.lab.a).collect()
    }

    pub fn b_star(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.lab.b).collect()
    }

    /// Display colours, channels in [0,1]
    pub fn rgb(&self) -> Vec<[f64; 3]> {
        self.samples.iter().map(|s| s.rgb).collect()
    }
}

/// Outcome of aggregating one cohort.
#[derive(Debug)]
pub struct CohortReport {
    pub cohort: String,
    pub collection: CohortCollection,
    pub failures: Vec<ThumbnailFailure>,
}

impl CohortReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The collection, or `AggregationPartialFailure` listing what succeeded
    /// and what failed.
    pub fn into_complete(self) -> Result<CohortCollection> {
        if self.failures.is_empty() {
            return Ok(self.collection);
        }
        Err(SlidePaletteError::AggregationPartialFailure {
            cohort: self.cohort,
            succeeded: self
                .collection
                .samples
                .into_iter()
                .map(|s| s.thumbnail)
                .collect(),
            failed: self.failures,
        })
    }

    /// The surviving samples. Every excluded thumbnail is logged.
    pub fn into_partial(self) -> (CohortCollection, Vec<ThumbnailFailure>) {
        for failure in &self.failures {
            warn!("{}: excluding {}", self.cohort, failure);
        }
        (self.collection, self.failures)
    }

    /// Apply the aggregation policy: strict unless `skip_failed`.
    pub fn resolve(self, skip_failed: bool) -> Result<(CohortCollection, Vec<ThumbnailFailure>)> {
        if skip_failed {
            Ok(self.into_partial())
        } else {
            self.into_complete().map(|c| (c, Vec::new()))
        }
    }
}

/// Colour sample of a single thumbnail
pub fn sample_thumbnail<T: ThumbnailInput + ?Sized>(
    thumbnail: &T,
    options: &PaletteOptions,
    index: PaletteIndex,
) -> Result<ColorSample> {
    let palette = thumbnail.palette(options)?;
    let rgb = palette.get(index)?;
    Ok(ColorSample::from_rgb8(thumbnail.id(), rgb))
}

/// Aggregate the thumbnails of one cohort, strictly in input order.
///
/// Errors confined to one thumbnail (see
/// [`SlidePaletteError::is_recoverable`]) are recorded in the report; any
/// other error is returned at once.
pub fn aggregate<T: ThumbnailInput>(
    cohort: &str,
    thumbnails: &[T],
    options: &PaletteOptions,
    index: PaletteIndex,
) -> Result<CohortReport> {
    let mut samples = Vec::with_capacity(thumbnails.len());
    let mut failures = Vec::new();

    for thumbnail in thumbnails {
        match sample_thumbnail(thumbnail, options, index) {
            Ok(sample) => {
                debug!(
                    "{cohort}: {} -> L*={:.2} a*={:.2} b*={:.2}",
                    sample.thumbnail, sample.lab.l, sample.lab.a, sample.lab.b
                );
                samples.push(sample);
            }
            Err(error) if error.is_recoverable() => failures.push(ThumbnailFailure {
                thumbnail: thumbnail.id(),
                error,
            }),
            Err(error) => return Err(error),
        }
    }

    info!(
        "{cohort}: {} of {} thumbnails sampled",
        samples.len(),
        thumbnails.len()
    );

    Ok(CohortReport {
        cohort: cohort.to_string(),
        collection: CohortCollection::new(samples),
        failures,
    })
}
