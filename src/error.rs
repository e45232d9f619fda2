//! Error types for slide_palette

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for slide_palette operations
pub type Result<T> = std::result::Result<T, SlidePaletteError>;

/// One thumbnail that could not contribute a colour sample.
#[derive(Debug)]
pub struct ThumbnailFailure {
    /// Identifier of the thumbnail (file path or in-memory name)
    pub thumbnail: String,
    pub error: SlidePaletteError,
}

impl std::fmt::Display for ThumbnailFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.thumbnail, self.error)
    }
}

#[derive(Error, Debug)]
pub enum SlidePaletteError {
    /// Slide file is missing, corrupt or in an unsupported format
    #[error("Failed to open slide {}: {message}", .path.display())]
    SlideOpen {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Dominant colours could not be computed for a thumbnail
    #[error("Palette extraction failed for {thumbnail}: {reason}")]
    PaletteExtraction { thumbnail: String, reason: String },

    /// The requested palette colour does not exist
    #[error("Palette index {index} out of range (palette has {len} colours)")]
    PaletteIndexOutOfRange { index: usize, len: usize },

    /// At least one thumbnail of a cohort failed
    #[error(
        "Cohort {cohort}: {} thumbnail(s) failed, {} succeeded",
        .failed.len(),
        .succeeded.len()
    )]
    AggregationPartialFailure {
        cohort: String,
        succeeded: Vec<String>,
        failed: Vec<ThumbnailFailure>,
    },

    /// Thumbnail directory could not be listed
    #[error("Cannot list thumbnails in {}", .path.display())]
    ThumbnailListing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Destination directory absent or unwritable
    #[error("Cannot write {}: {reason}", .path.display())]
    OutputWrite { path: PathBuf, reason: String },

    /// Nothing to plot
    #[error("No colour samples to plot for {label}")]
    EmptyCollection { label: String },

    /// Plot rendering failed
    #[error("Rendering {} failed: {message}", .path.display())]
    Render { path: PathBuf, message: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// Configuration file could not be read or parsed
    #[error("Configuration error in {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

impl SlidePaletteError {
    /// Create a slide open error with its underlying cause
    pub fn slide_open<E>(path: impl Into<PathBuf>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::SlideOpen {
            path: path.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn palette(thumbnail: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PaletteExtraction {
            thumbnail: thumbnail.into(),
            reason: reason.into(),
        }
    }

    pub fn output_write(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::OutputWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid(parameter: impl Into<String>, value: impl std::fmt::Display) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Check if this error only concerns a single thumbnail, so a cohort pass
    /// may exclude the item and carry on
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SlidePaletteError::PaletteExtraction { .. }
                | SlidePaletteError::PaletteIndexOutOfRange { .. }
                | SlidePaletteError::SlideOpen { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_message_counts_both_sides() {
        let err = SlidePaletteError::AggregationPartialFailure {
            cohort: "PREV".into(),
            succeeded: vec!["a.png".into(), "b.png".into()],
            failed: vec![ThumbnailFailure {
                thumbnail: "c.png".into(),
                error: SlidePaletteError::palette("c.png", "no tissue pixels"),
            }],
        };
        assert_eq!(
            err.to_string(),
            "Cohort PREV: 1 thumbnail(s) failed, 2 succeeded"
        );
        assert!(!err.is_recoverable());
    }

    #[test]
    fn palette_errors_name_the_thumbnail() {
        let err = SlidePaletteError::palette("slides/x.png", "decode error");
        assert!(err.to_string().contains("slides/x.png"));
        assert!(err.is_recoverable());
    }
}
