//! Tunable parameters for every stage of the colour pipeline.
//!
//! Configuration can be loaded from a JSON file or built from defaults.
//! Missing fields fall back to their defaults, so a file only needs to list
//! what it changes:
//!
//! ```no_run
//! use slide_palette::Config;
//! use std::path::Path;
//!
//! let config = Config::from_json_file(Path::new("palette.json"))?;
//! assert!(config.palette.color_count >= 1);
//! # Ok::<(), slide_palette::SlidePaletteError>(())
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SlidePaletteError};

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thumbnail: ThumbnailConfig,
    pub palette: PaletteConfig,
    pub plot: PlotConfig,
    pub aggregation: AggregationConfig,
}

/// Thumbnail extraction and background erasure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Pyramid level to read; clamped to the deepest level a slide has
    pub level: usize,

    /// Push background pixels to white before saving
    pub erase_background: bool,

    /// Grey dynamic range below which the Otsu threshold is reported as degenerate
    pub degenerate_range: f32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            level: 5,
            erase_background: true,
            degenerate_range: 1e-3,
        }
    }
}

/// Dominant colour quantization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    /// Number of dominant colours to extract
    pub color_count: usize,

    /// Sample every n-th pixel (1 = every pixel)
    pub quality: usize,

    /// Palette entry used as the thumbnail's colour (0 = most dominant)
    pub color_index: usize,

    pub max_iterations: usize,
    pub convergence: f32,
    pub seed: u64,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            color_count: 3,
            quality: 10,
            color_index: 0,
            max_iterations: 20,
            convergence: 1e-4,
            seed: 0,
        }
    }
}

/// Scatter plot appearance and destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Directory receiving plot PNGs; must already exist
    pub output_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Marker radius in pixels
    pub marker_size: u32,
    pub alpha: f32,
    /// Rotation around the vertical (L*) axis, degrees
    pub azimuth: f32,
    /// Tilt of the viewing direction above the a*/b* plane, degrees
    pub elevation: f32,
    /// Display names substituted for stain codes in titles
    pub stain_labels: BTreeMap<String, String>,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("plots"),
            width: 1350,
            height: 1350,
            marker_size: 4,
            alpha: 0.9,
            azimuth: -60.0,
            elevation: 30.0,
            stain_labels: BTreeMap::from([("HE".to_string(), "H&E".to_string())]),
        }
    }
}

impl PlotConfig {
    /// Reject canvases too small to hold the axes and title
    pub fn validate(&self) -> Result<()> {
        if self.width < 64 || self.height < 64 {
            return Err(SlidePaletteError::invalid(
                "plot.size",
                format!("{}x{}", self.width, self.height),
            ));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(SlidePaletteError::invalid("plot.alpha", self.alpha));
        }
        Ok(())
    }
}

/// Cohort aggregation policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Plot the surviving samples when some thumbnails fail, logging every
    /// exclusion. When false a single failure aborts the cohort.
    pub skip_failed: bool,
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| SlidePaletteError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Config =
            serde_json::from_str(&text).map_err(|e| SlidePaletteError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(|e| SlidePaletteError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, text).map_err(|e| SlidePaletteError::output_write(path, e))
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        let p = &self.palette;
        if p.color_count == 0 || p.color_count > 255 {
            return Err(SlidePaletteError::invalid("palette.color_count", p.color_count));
        }
        if p.quality == 0 {
            return Err(SlidePaletteError::invalid("palette.quality", p.quality));
        }
        if p.color_index >= p.color_count {
            return Err(SlidePaletteError::invalid("palette.color_index", p.color_index));
        }
        if p.max_iterations == 0 {
            return Err(SlidePaletteError::invalid("palette.max_iterations", p.max_iterations));
        }
        self.plot.validate()?;
        if !(0.0..1.0).contains(&self.thumbnail.degenerate_range) {
            return Err(SlidePaletteError::invalid(
                "thumbnail.degenerate_range",
                self.thumbnail.degenerate_range,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.palette.color_count, 3);
        assert_eq!(config.palette.quality, 10);
        assert_eq!(config.thumbnail.level, 5);
        assert_eq!(config.plot.output_dir, PathBuf::from("plots"));
        assert_eq!(config.plot.stain_labels.get("HE").map(String::as_str), Some("H&E"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "palette": { "quality": 1 } }"#).unwrap();
        assert_eq!(config.palette.quality, 1);
        assert_eq!(config.palette.color_count, 3);
        assert!(config.thumbnail.erase_background);
    }

    #[test]
    fn rejects_index_beyond_palette() {
        let mut config = Config::default();
        config.palette.color_index = 3;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SlidePaletteError::InvalidParameter { .. }));
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::default();
        config.aggregation.skip_failed = true;
        config.to_json_file(&path).unwrap();
        assert_eq!(Config::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Config::from_json_file(&path),
            Err(SlidePaletteError::Config { .. })
        ));
    }
}
