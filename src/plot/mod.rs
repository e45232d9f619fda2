//! Colour distribution plots.
//!
//! Every sample becomes one marker at (a*, b*) on the horizontal plane and L*
//! on the vertical axis, painted in the sample's own RGB colour. The title and
//! the three axis labels are drawn into the image. Combined
//! plots concatenate the cohorts first, so cohort identity is not encoded;
//! only the stain is.
//!
//! File names are deterministic:
//! `<dataset>_<stain>_background_erased_LAB.png` per cohort and
//! `all_datasets_<stain>_background_erased_LAB.png` for the combined plot.
//! Stain display names (`HE` → `H&E`) only ever appear in titles.

mod render;

use std::collections::BTreeMap;
use std::path::PathBuf;

use image::{ImageError, ImageFormat};
use log::info;

pub use render::{AXIS_LABELS, AxisRange, RenderStyle, ScatterPoint, render_scatter};

use crate::cohort::CohortCollection;
use crate::config::PlotConfig;
use crate::error::{Result, SlidePaletteError};
use crate::layout::require_dir;

const FILE_SUFFIX: &str = "background_erased_LAB.png";
const COMBINED_PREFIX: &str = "all_datasets";

/// What a saved plot contains.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSummary {
    pub path: PathBuf,
    pub title: String,
    pub points: usize,
}

pub fn cohort_plot_file_name(dataset_name: &str, stain: &str) -> String {
    format!("{dataset_name}_{stain}_{FILE_SUFFIX}")
}

pub fn combined_plot_file_name(stain: &str) -> String {
    cohort_plot_file_name(COMBINED_PREFIX, stain)
}

/// Display name of a stain code, falling back to the code itself
pub fn stain_label<'a>(stain: &'a str, labels: &'a BTreeMap<String, String>) -> &'a str {
    labels.get(stain).map(String::as_str).unwrap_or(stain)
}

impl From<&PlotConfig> for RenderStyle {
    fn from(config: &PlotConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            marker_size: config.marker_size,
            alpha: config.alpha,
            azimuth: config.azimuth,
            elevation: config.elevation,
        }
    }
}

/// Scatter points of a collection, in collection order
pub fn scatter_points(collection: &CohortCollection) -> Vec<ScatterPoint> {
    collection
        .samples()
        .iter()
        .map(|s| ScatterPoint {
            a: s.lab.a,
            b: s.lab.b,
            l: s.lab.l,
            rgb: s.rgb8(),
        })
        .collect()
}

/// Plot one cohort's colours for one stain.
pub fn plot_cohort_distribution(
    collection: &CohortCollection,
    dataset_name: &str,
    stain: &str,
    config: &PlotConfig,
) -> Result<PlotSummary> {
    let path = config
        .output_dir
        .join(cohort_plot_file_name(dataset_name, stain));
    save_scatter(collection, dataset_name.to_string(), path, config)
}

/// Plot the concatenation of several cohorts' colours for one stain.
pub fn plot_combined_distribution(
    collections: &[CohortCollection],
    stain: &str,
    config: &PlotConfig,
) -> Result<PlotSummary> {
    let combined = CohortCollection::concat(collections);
    let title = format!(
        "Combined cohort {}",
        stain_label(stain, &config.stain_labels)
    );
    let path = config.output_dir.join(combined_plot_file_name(stain));
    save_scatter(&combined, title, path, config)
}

fn save_scatter(
    collection: &CohortCollection,
    title: String,
    path: PathBuf,
    config: &PlotConfig,
) -> Result<PlotSummary> {
    config.validate()?;
    if collection.is_empty() {
        return Err(SlidePaletteError::EmptyCollection { label: title });
    }
    require_dir(&config.output_dir)?;

    let points = scatter_points(collection);
    let ranges = [
        AxisRange::covering(points.iter().map(|p| p.a)),
        AxisRange::covering(points.iter().map(|p| p.b)),
        AxisRange::covering(points.iter().map(|p| p.l)),
    ];
    let canvas = render_scatter(&points, ranges, &RenderStyle::from(config), &title).map_err(
        |e| SlidePaletteError::Render {
            path: path.clone(),
            message: e.to_string(),
        },
    )?;

    canvas
        .save_with_format(&path, ImageFormat::Png)
        .map_err(|e| match e {
            ImageError::IoError(io) => SlidePaletteError::output_write(&path, io),
            other => SlidePaletteError::Render {
                path: path.clone(),
                message: other.to_string(),
            },
        })?;

    info!("saved '{title}' ({} points) to {}", points.len(), path.display());
    Ok(PlotSummary {
        path,
        title,
        points: points.len(),
    })
}
