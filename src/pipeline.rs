//! End-to-end passes: slide → thumbnail, and thumbnails → cohort plots.

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use log::{info, warn};

use crate::background::erase_background_rgb8;
use crate::cohort::{CohortCollection, CohortReport, Thumbnail, aggregate};
use crate::config::{Config, ThumbnailConfig};
use crate::error::{Result, SlidePaletteError, ThumbnailFailure};
use crate::layout::{list_thumbnails, require_dir, thumbnail_dir, thumbnail_path};
use crate::plot::{PlotSummary, plot_cohort_distribution, plot_combined_distribution};
use crate::quantize::{PaletteIndex, PaletteOptions};
use crate::slide::{SlideSource, extract_thumbnail};

/// A thumbnail written to disk, kept in memory for direct palette extraction.
#[derive(Debug, Clone)]
pub struct SavedThumbnail {
    pub path: PathBuf,
    pub image: RgbImage,
    /// Otsu threshold used, when the background was erased
    pub threshold: Option<f32>,
    pub degenerate: bool,
}

impl SavedThumbnail {
    /// Hand the raster to the aggregator without re-reading the file
    pub fn to_thumbnail(&self) -> Thumbnail {
        Thumbnail {
            name: self.path.display().to_string(),
            image: self.image.clone(),
        }
    }
}

/// Read the thumbnail of `slide_path`, erase its background if configured
/// and save it as `<out_dir>/<slide_stem>.png`.
///
/// The slide is closed as soon as the raster is read, before any later step
/// can fail.
pub fn save_thumbnail<S: SlideSource>(
    source: &S,
    slide_path: &Path,
    out_dir: &Path,
    config: &ThumbnailConfig,
) -> Result<SavedThumbnail> {
    let out_path = thumbnail_path(out_dir, slide_path)?;
    require_dir(out_dir)?;

    let raw = {
        let slide = source.open(slide_path)?;
        extract_thumbnail(&slide, config.level)?
    };

    let (image, threshold, degenerate) = if config.erase_background {
        let outcome = erase_background_rgb8(&raw, config.degenerate_range);
        if outcome.degenerate {
            warn!(
                "{}: degenerate background threshold {:.4}, mask is not informative",
                slide_path.display(),
                outcome.threshold
            );
        }
        (outcome.to_rgb8(), Some(outcome.threshold), outcome.degenerate)
    } else {
        (raw, None, false)
    };

    image
        .save_with_format(&out_path, ImageFormat::Png)
        .map_err(|e| SlidePaletteError::output_write(&out_path, e))?;
    info!("saved thumbnail {}", out_path.display());

    Ok(SavedThumbnail {
        path: out_path,
        image,
        threshold,
        degenerate,
    })
}

/// Outcome of a batch of thumbnail saves.
#[derive(Debug, Default)]
pub struct ThumbnailBatch {
    pub saved: Vec<SavedThumbnail>,
    pub failures: Vec<ThumbnailFailure>,
}

/// Save thumbnails for many slides in order; one bad slide does not stop the batch.
pub fn save_thumbnails<S: SlideSource>(
    source: &S,
    slides: &[PathBuf],
    out_dir: &Path,
    config: &ThumbnailConfig,
) -> ThumbnailBatch {
    let mut batch = ThumbnailBatch::default();
    for slide in slides {
        match save_thumbnail(source, slide, out_dir, config) {
            Ok(saved) => batch.saved.push(saved),
            Err(error) => {
                warn!("{}: {error}", slide.display());
                batch.failures.push(ThumbnailFailure {
                    thumbnail: slide.display().to_string(),
                    error,
                });
            }
        }
    }
    batch
}

/// A named cohort and its root directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Cohort {
    pub name: String,
    pub root: PathBuf,
}

fn palette_settings(config: &Config) -> (PaletteOptions, PaletteIndex) {
    (
        PaletteOptions::from(&config.palette),
        PaletteIndex(config.palette.color_index),
    )
}

/// Aggregate every thumbnail in `dir`.
pub fn aggregate_dir(cohort: &str, dir: &Path, config: &Config) -> Result<CohortReport> {
    let thumbnails = list_thumbnails(dir)?;
    info!("{cohort}: {} thumbnails in {}", thumbnails.len(), dir.display());
    let (options, index) = palette_settings(config);
    aggregate(cohort, &thumbnails, &options, index)
}

/// Aggregate freshly saved thumbnails from memory, skipping the disk round trip.
pub fn aggregate_saved(
    cohort: &str,
    saved: &[SavedThumbnail],
    config: &Config,
) -> Result<CohortReport> {
    let thumbnails: Vec<Thumbnail> = saved.iter().map(SavedThumbnail::to_thumbnail).collect();
    let (options, index) = palette_settings(config);
    aggregate(cohort, &thumbnails, &options, index)
}

/// Collection of one cohort after applying the aggregation policy
fn resolved_collection(
    cohort: &str,
    dir: &Path,
    config: &Config,
) -> Result<(CohortCollection, Vec<ThumbnailFailure>)> {
    aggregate_dir(cohort, dir, config)?.resolve(config.aggregation.skip_failed)
}

/// Result of plotting one cohort.
#[derive(Debug)]
pub struct CohortPlot {
    pub summary: PlotSummary,
    pub excluded: Vec<ThumbnailFailure>,
}

/// Plot the thumbnails in `thumbnails_dir` as cohort `dataset_name`.
pub fn plot_cohort(
    thumbnails_dir: &Path,
    dataset_name: &str,
    stain: &str,
    config: &Config,
) -> Result<CohortPlot> {
    let (collection, excluded) = resolved_collection(dataset_name, thumbnails_dir, config)?;
    let summary = plot_cohort_distribution(&collection, dataset_name, stain, &config.plot)?;
    Ok(CohortPlot { summary, excluded })
}

/// Result of the combined pass for one stain.
#[derive(Debug)]
pub struct CombinedPlot {
    pub stain: String,
    pub summary: PlotSummary,
    /// Per-cohort plots, when requested
    pub cohorts: Vec<PlotSummary>,
    pub excluded: Vec<ThumbnailFailure>,
    /// Cohorts without a thumbnail directory for this stain; they add no points
    pub missing: Vec<Cohort>,
}

/// Aggregate every cohort for each stain, then plot the concatenation.
///
/// Each cohort is aggregated on its own and combined here, in cohort order.
/// A cohort without a `Thumbnails/<stain>` directory contributes nothing and
/// is listed in [`CombinedPlot::missing`]. With `per_cohort` the individual
/// cohort plots are written too.
pub fn plot_combined(
    cohorts: &[Cohort],
    stains: &[String],
    per_cohort: bool,
    config: &Config,
) -> Result<Vec<CombinedPlot>> {
    let mut plots = Vec::with_capacity(stains.len());
    for stain in stains {
        let mut collections = Vec::with_capacity(cohorts.len());
        let mut excluded = Vec::new();
        let mut cohort_plots = Vec::new();
        let mut missing = Vec::new();

        for cohort in cohorts {
            let dir = thumbnail_dir(&cohort.root, stain);
            if !dir.is_dir() {
                warn!(
                    "{}: no {stain} thumbnails at {}, cohort adds no points",
                    cohort.name,
                    dir.display()
                );
                missing.push(cohort.clone());
                continue;
            }
            let (collection, mut failures) = resolved_collection(&cohort.name, &dir, config)?;
            if per_cohort && collection.is_empty() {
                warn!("{}: no {stain} samples, cohort plot skipped", cohort.name);
            } else if per_cohort {
                cohort_plots.push(plot_cohort_distribution(
                    &collection,
                    &cohort.name,
                    stain,
                    &config.plot,
                )?);
            }
            excluded.append(&mut failures);
            collections.push(collection);
        }

        let summary = plot_combined_distribution(&collections, stain, &config.plot)?;
        plots.push(CombinedPlot {
            stain: stain.clone(),
            summary,
            cohorts: cohort_plots,
            excluded,
            missing,
        });
    }
    Ok(plots)
}
