//! # slide_palette
//!
//! Dominant staining colour of histology slides, compared across cohorts.
//!
//! 1. A thumbnail is read from a low-resolution pyramid level of each slide.
//! 2. Its background is erased with a global Otsu threshold.
//! 3. The thumbnail is reduced to a few dominant colours (k-means in Lab).
//! 4. The selected colour is converted to CIE L*a*b* (D65).
//! 5. Samples are aggregated per cohort and plotted as a 3D scatter, per
//!    cohort or for all cohorts combined.
//!
//! ```no_run
//! use slide_palette::{Config, pipeline};
//! use std::path::Path;
//!
//! let config = Config::default();
//! let plot = pipeline::plot_cohort(Path::new("prev/Thumbnails/HE"), "PREV", "HE", &config)?;
//! println!("{} points -> {}", plot.summary.points, plot.summary.path.display());
//! # Ok::<(), slide_palette::SlidePaletteError>(())
//! ```

pub mod background;
pub mod cohort;
pub mod color;
pub mod config;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod plot;
pub mod quantize;
pub mod slide;

pub use background::{EraseOutcome, erase_background, erase_background_rgb8, otsu_threshold};
pub use cohort::{CohortCollection, CohortReport, Thumbnail, ThumbnailInput, aggregate};
pub use color::{ColorSample, LabValue, rgb_to_lab};
pub use config::Config;
pub use error::{Result, SlidePaletteError, ThumbnailFailure};
pub use plot::{PlotSummary, combined_plot_file_name, cohort_plot_file_name};
pub use quantize::{Palette, PaletteIndex, PaletteOptions, extract_palette, extract_palette_from_path};
pub use slide::{ImagePyramidSource, SlideHandle, SlideSource, extract_thumbnail};
