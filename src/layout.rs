//! On-disk layout of thumbnails: `<cohort_root>/Thumbnails/<stain>/<slide_stem>.png`.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Result, SlidePaletteError};

pub const THUMBNAIL_DIR: &str = "Thumbnails";

/// Directory holding the thumbnails of one stain in one cohort
pub fn thumbnail_dir(cohort_root: &Path, stain: &str) -> PathBuf {
    cohort_root.join(THUMBNAIL_DIR).join(stain)
}

/// Where the thumbnail of `slide_path` is stored inside `dir`
pub fn thumbnail_path(dir: &Path, slide_path: &Path) -> Result<PathBuf> {
    let stem = slide_path
        .file_stem()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SlidePaletteError::invalid("slide_path", slide_path.display()))?;
    let mut name = stem.to_os_string();
    name.push(".png");
    Ok(dir.join(name))
}

/// Create the thumbnail directories of every cohort/stain pair.
pub fn prepare(cohort_roots: &[PathBuf], stains: &[String]) -> Result<Vec<PathBuf>> {
    let mut created = Vec::with_capacity(cohort_roots.len() * stains.len());
    for root in cohort_roots {
        for stain in stains {
            let dir = thumbnail_dir(root, stain);
            fs::create_dir_all(&dir).map_err(|e| SlidePaletteError::output_write(&dir, e))?;
            info!("thumbnail directory ready: {}", dir.display());
            created.push(dir);
        }
    }
    Ok(created)
}

/// PNG thumbnails in `dir`, sorted by file name so every run sees the same order.
pub fn list_thumbnails(dir: &Path) -> Result<Vec<PathBuf>> {
    let listing_error = |source| SlidePaletteError::ThumbnailListing {
        path: dir.to_path_buf(),
        source,
    };
    let mut thumbnails = Vec::new();
    for entry in fs::read_dir(dir).map_err(listing_error)? {
        let path = entry.map_err(listing_error)?.path();
        let is_png = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if is_png && path.is_file() {
            thumbnails.push(path);
        }
    }
    thumbnails.sort();
    Ok(thumbnails)
}

/// Fail with `OutputWrite` unless `dir` is an existing directory
pub fn require_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(SlidePaletteError::output_write(dir, "directory does not exist"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let dir = thumbnail_dir(Path::new("/data/prev"), "HE");
        assert_eq!(dir, PathBuf::from("/data/prev/Thumbnails/HE"));
        let thumb = thumbnail_path(&dir, Path::new("/slides/case_01.svs")).unwrap();
        assert_eq!(thumb, PathBuf::from("/data/prev/Thumbnails/HE/case_01.png"));
    }

    #[test]
    fn listing_is_sorted_and_png_only() {
        let root = tempfile::tempdir().unwrap();
        let dirs = prepare(&[root.path().to_path_buf()], &["HE".to_string()]).unwrap();
        let dir = &dirs[0];
        for name in ["c.png", "a.PNG", "b.png", "notes.txt"] {
            fs::write(dir.join(name), b"").unwrap();
        }
        let names: Vec<String> = list_thumbnails(dir)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.PNG", "b.png", "c.png"]);
    }

    #[test]
    fn missing_directory_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");
        assert!(matches!(
            list_thumbnails(&missing),
            Err(SlidePaletteError::ThumbnailListing { .. })
        ));
        assert!(matches!(
            require_dir(&missing),
            Err(SlidePaletteError::OutputWrite { .. })
        ));
    }
}
