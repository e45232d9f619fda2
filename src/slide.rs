//! Slide access and thumbnail extraction.
//!
//! Whole-slide readers are external collaborators; the pipeline only needs to
//! open a slide, list its pyramid levels and read one level as RGB. Handles
//! are plain owned values, so they are closed when dropped.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, RgbImage, imageops::FilterType};
use log::debug;

use crate::error::{Result, SlidePaletteError};

/// An open slide.
pub trait SlideHandle {
    /// Pixel dimensions of every pyramid level, level 0 (full resolution) first
    fn level_dimensions(&self) -> Vec<(u32, u32)>;

    /// Read a whole level as 8-bit RGB
    fn read_level(&self, level: usize) -> Result<RgbImage>;
}

/// Something that can open slides.
pub trait SlideSource {
    type Handle: SlideHandle;

    fn open(&self, path: &Path) -> Result<Self::Handle>;
}

/// Treats any raster the `image` crate can decode as a pyramidal slide:
/// the file is level 0 and every further level halves both dimensions.
#[derive(Debug, Clone, Copy)]
pub struct ImagePyramidSource {
    /// Number of levels synthesised below the full-resolution image
    pub max_levels: usize,
    /// Resampling filter used to build lower levels
    pub filter: FilterType,
}

impl Default for ImagePyramidSource {
    fn default() -> Self {
        Self {
            max_levels: 9,
            filter: FilterType::Triangle,
        }
    }
}

impl SlideSource for ImagePyramidSource {
    type Handle = ImagePyramid;

    fn open(&self, path: &Path) -> Result<ImagePyramid> {
        let base = image::open(path)
            .map_err(|e| SlidePaletteError::slide_open(path, "cannot decode slide", e))?;
        Ok(ImagePyramid::new(path, base, self.max_levels).with_filter(self.filter))
    }
}

/// An in-memory image exposed as a slide pyramid.
#[derive(Debug)]
pub struct ImagePyramid {
    path: PathBuf,
    base: DynamicImage,
    levels: Vec<(u32, u32)>,
    filter: FilterType,
}

impl ImagePyramid {
    pub fn new(path: impl Into<PathBuf>, base: DynamicImage, max_levels: usize) -> Self {
        let (mut w, mut h) = base.dimensions();
        let mut levels = vec![(w, h)];
        while levels.len() <= max_levels && (w > 1 || h > 1) {
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            levels.push((w, h));
        }
        Self {
            path: path.into(),
            base,
            levels,
            filter: FilterType::Triangle,
        }
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }
}

impl SlideHandle for ImagePyramid {
    fn level_dimensions(&self) -> Vec<(u32, u32)> {
        self.levels.clone()
    }

    fn read_level(&self, level: usize) -> Result<RgbImage> {
        let &(w, h) = self.levels.get(level).ok_or_else(|| {
            SlidePaletteError::invalid("level", format!("{level} of {}", self.path.display()))
        })?;
        if level == 0 {
            return Ok(self.base.to_rgb8());
        }
        Ok(self.base.resize_exact(w, h, self.filter).to_rgb8())
    }
}

/// Read the thumbnail of a slide at `level`, clamped to its deepest level.
pub fn extract_thumbnail<H: SlideHandle>(slide: &H, level: usize) -> Result<RgbImage> {
    let levels = slide.level_dimensions();
    let Some(deepest) = levels.len().checked_sub(1) else {
        return Err(SlidePaletteError::invalid("level", "slide has no levels"));
    };
    let chosen = level.min(deepest);
    if chosen != level {
        debug!("level {level} unavailable, using deepest level {chosen}");
    }
    let (w, h) = levels[chosen];
    debug!("reading level {chosen} ({w}x{h})");
    slide.read_level(chosen)
}
