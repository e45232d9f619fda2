//! End-to-end passes over synthetic cohorts: slides are written as plain PNG
//! pyramids, turned into erased thumbnails and plotted.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use slide_palette::pipeline::{self, Cohort};
use slide_palette::{
    CohortCollection, Config, ImagePyramidSource, PaletteIndex, PaletteOptions, SlidePaletteError,
    aggregate, layout,
};

/// Nearest-neighbour pyramid so block edges stay crisp in the thumbnail
fn source() -> ImagePyramidSource {
    ImagePyramidSource {
        filter: FilterType::Nearest,
        ..ImagePyramidSource::default()
    }
}

/// Slide with a stained block on bright glass
fn synthetic_slide(stain: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(256, 192, |x, y| {
        if (48..208).contains(&x) && (32..160).contains(&y) {
            Rgb(stain)
        } else {
            Rgb([236, 236, 238])
        }
    })
}

fn write_slides(dir: &Path, stains: &[[u8; 3]]) -> Vec<PathBuf> {
    stains
        .iter()
        .enumerate()
        .map(|(i, &stain)| {
            let path = dir.join(format!("slide_{i:02}.png"));
            synthetic_slide(stain).save(&path).unwrap();
            path
        })
        .collect()
}

fn test_config(plot_dir: &Path) -> Config {
    let mut config = Config::default();
    config.thumbnail.level = 2;
    config.palette.quality = 1;
    config.plot.output_dir = plot_dir.to_path_buf();
    config.plot.width = 320;
    config.plot.height = 320;
    config
}

/// Cohort root with `Thumbnails/HE` filled from synthetic slides
fn build_cohort(base: &Path, name: &str, stains: &[[u8; 3]], config: &Config) -> Cohort {
    let root = base.join(name);
    let slides_dir = root.join("slides");
    fs::create_dir_all(&slides_dir).unwrap();
    layout::prepare(&[root.clone()], &["HE".to_string()]).unwrap();

    let slides = write_slides(&slides_dir, stains);
    let out = layout::thumbnail_dir(&root, "HE");
    let batch = pipeline::save_thumbnails(
        &source(),
        &slides,
        &out,
        &config.thumbnail,
    );
    assert!(batch.failures.is_empty());
    assert_eq!(batch.saved.len(), stains.len());

    Cohort {
        name: name.to_string(),
        root,
    }
}

#[test]
fn thumbnail_is_saved_erased_and_named_after_slide() {
    let base = tempfile::tempdir().unwrap();
    let config = test_config(base.path());
    let slides = write_slides(base.path(), &[[150, 60, 110]]);
    let out = base.path().join("Thumbnails").join("HE");
    fs::create_dir_all(&out).unwrap();

    let saved = pipeline::save_thumbnail(
        &source(),
        &slides[0],
        &out,
        &config.thumbnail,
    )
    .unwrap();

    assert_eq!(saved.path, out.join("slide_00.png"));
    assert!(saved.threshold.is_some());
    let on_disk = image::open(&saved.path).unwrap().to_rgb8();
    assert_eq!(on_disk.dimensions(), (64, 48));
    assert_eq!(on_disk.get_pixel(0, 0).0, [255, 255, 255]);
    assert_eq!(on_disk.get_pixel(32, 24).0, [150, 60, 110]);
    assert_eq!(on_disk, saved.image);
}

#[test]
fn thumbnail_dir_must_exist() {
    let base = tempfile::tempdir().unwrap();
    let config = test_config(base.path());
    let slides = write_slides(base.path(), &[[150, 60, 110]]);
    let err = pipeline::save_thumbnail(
        &source(),
        &slides[0],
        &base.path().join("missing"),
        &config.thumbnail,
    )
    .unwrap_err();
    assert!(matches!(err, SlidePaletteError::OutputWrite { .. }));
}

#[test]
fn unreadable_slide_does_not_stop_the_batch() {
    let base = tempfile::tempdir().unwrap();
    let config = test_config(base.path());
    let mut slides = write_slides(base.path(), &[[150, 60, 110]]);
    let broken = base.path().join("broken.svs");
    fs::write(&broken, b"garbage").unwrap();
    slides.insert(0, broken.clone());

    let batch = pipeline::save_thumbnails(
        &source(),
        &slides,
        base.path(),
        &config.thumbnail,
    );
    assert_eq!(batch.saved.len(), 1);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].thumbnail, broken.display().to_string());
    assert!(matches!(
        batch.failures[0].error,
        SlidePaletteError::SlideOpen { .. }
    ));
}

#[test]
fn two_cohorts_combine_into_one_plot() {
    let base = tempfile::tempdir().unwrap();
    let plots = base.path().join("plots");
    fs::create_dir_all(&plots).unwrap();
    let config = test_config(&plots);

    let prev = build_cohort(
        base.path(),
        "PREV",
        &[[200, 100, 150], [190, 90, 160], [210, 110, 140]],
        &config,
    );
    let calm = build_cohort(base.path(), "CALM", &[[120, 50, 130], [130, 60, 120]], &config);

    let results =
        pipeline::plot_combined(&[prev.clone(), calm.clone()], &["HE".to_string()], true, &config)
            .unwrap();
    assert_eq!(results.len(), 1);
    let combined = &results[0];

    assert_eq!(combined.summary.points, 5);
    assert_eq!(combined.summary.title, "Combined cohort H&E");
    assert_eq!(
        combined.summary.path,
        plots.join("all_datasets_HE_background_erased_LAB.png")
    );
    assert!(combined.summary.path.is_file());

    let per_cohort: Vec<(String, usize)> = combined
        .cohorts
        .iter()
        .map(|p| {
            (
                p.path.file_name().unwrap().to_string_lossy().into_owned(),
                p.points,
            )
        })
        .collect();
    assert_eq!(
        per_cohort,
        [
            ("PREV_HE_background_erased_LAB.png".to_string(), 3),
            ("CALM_HE_background_erased_LAB.png".to_string(), 2),
        ]
    );

    let single = pipeline::plot_cohort(
        &layout::thumbnail_dir(&prev.root, "HE"),
        "PREV",
        "HE",
        &config,
    )
    .unwrap();
    assert_eq!(single.summary.points, 3);
    assert!(single.excluded.is_empty());
    assert!(combined.missing.is_empty());
}

#[test]
fn cohort_without_stain_directory_adds_no_points() {
    let base = tempfile::tempdir().unwrap();
    let plots = base.path().join("plots");
    fs::create_dir_all(&plots).unwrap();
    let config = test_config(&plots);

    let prev = build_cohort(base.path(), "PREV", &[[200, 100, 150], [190, 90, 160]], &config);
    let calm_root = base.path().join("CALM");
    layout::prepare(&[calm_root.clone()], &["PSR".to_string()]).unwrap();
    let calm = Cohort {
        name: "CALM".to_string(),
        root: calm_root,
    };

    let results =
        pipeline::plot_combined(&[calm.clone(), prev], &["HE".to_string()], true, &config)
            .unwrap();
    let combined = &results[0];
    assert_eq!(combined.summary.points, 2);
    assert_eq!(combined.missing, [calm]);
    assert_eq!(combined.cohorts.len(), 1);
    assert!(combined.summary.path.is_file());
}

/// Two stain colours plus a minor third, so the palette has three entries
fn three_tone_thumbnail() -> RgbImage {
    RgbImage::from_fn(10, 10, |x, _| match x {
        0..=4 => Rgb([200, 100, 150]),
        5..=7 => Rgb([90, 40, 120]),
        _ => Rgb([150, 60, 60]),
    })
}

#[test]
fn short_palettes_fail_a_late_colour_index() {
    let base = tempfile::tempdir().unwrap();
    let plots = base.path().join("plots");
    fs::create_dir_all(&plots).unwrap();
    let mut config = test_config(&plots);
    config.palette.color_index = 2;
    config.validate().unwrap();

    let cohort = build_cohort(base.path(), "HepaT1ca", &[[200, 100, 150], [150, 70, 140]], &config);
    let dir = layout::thumbnail_dir(&cohort.root, "HE");
    three_tone_thumbnail().save(dir.join("tri.png")).unwrap();

    match pipeline::plot_cohort(&dir, "HepaT1ca", "HE", &config).unwrap_err() {
        SlidePaletteError::AggregationPartialFailure {
            succeeded, failed, ..
        } => {
            assert_eq!(succeeded.len(), 1);
            assert!(succeeded[0].ends_with("tri.png"));
            assert_eq!(failed.len(), 2);
            for failure in &failed {
                assert!(matches!(
                    failure.error,
                    SlidePaletteError::PaletteIndexOutOfRange { index: 2, len: 1 }
                ));
            }
        }
        other => panic!("unexpected error {other:?}"),
    }

    config.aggregation.skip_failed = true;
    let plot = pipeline::plot_cohort(&dir, "HepaT1ca", "HE", &config).unwrap();
    assert_eq!(plot.summary.points, 1);
    assert_eq!(plot.excluded.len(), 2);
}

#[test]
fn combined_collection_is_concatenation_of_cohorts() {
    let base = tempfile::tempdir().unwrap();
    let config = test_config(base.path());
    let prev = build_cohort(base.path(), "PREV", &[[200, 100, 150], [190, 90, 160]], &config);
    let calm = build_cohort(base.path(), "CALM", &[[120, 50, 130]], &config);

    let options = PaletteOptions::from(&config.palette);
    let per_cohort: Vec<CohortCollection> = [&prev, &calm]
        .iter()
        .map(|c| {
            let thumbs = layout::list_thumbnails(&layout::thumbnail_dir(&c.root, "HE")).unwrap();
            aggregate(&c.name, &thumbs, &options, PaletteIndex::DOMINANT)
                .unwrap()
                .into_complete()
                .unwrap()
        })
        .collect();

    let mut all_thumbs = layout::list_thumbnails(&layout::thumbnail_dir(&prev.root, "HE")).unwrap();
    all_thumbs.extend(layout::list_thumbnails(&layout::thumbnail_dir(&calm.root, "HE")).unwrap());
    let joint = aggregate("all", &all_thumbs, &options, PaletteIndex::DOMINANT)
        .unwrap()
        .into_complete()
        .unwrap();

    assert_eq!(CohortCollection::concat(&per_cohort), joint);
    assert_eq!(joint.lightness().len(), 3);
    assert_eq!(joint.samples()[2].rgb8(), [120, 50, 130]);
}

#[test]
fn blank_thumbnail_aborts_unless_skipping() {
    let base = tempfile::tempdir().unwrap();
    let plots = base.path().join("plots");
    fs::create_dir_all(&plots).unwrap();
    let mut config = test_config(&plots);
    let cohort = build_cohort(base.path(), "UK-AIH", &[[200, 100, 150], [150, 70, 140]], &config);
    let dir = layout::thumbnail_dir(&cohort.root, "HE");
    RgbImage::from_pixel(16, 16, Rgb([255, 255, 255]))
        .save(dir.join("blank.png"))
        .unwrap();

    let err = pipeline::plot_cohort(&dir, "UK-AIH", "HE", &config).unwrap_err();
    match err {
        SlidePaletteError::AggregationPartialFailure {
            succeeded, failed, ..
        } => {
            assert_eq!(succeeded.len(), 2);
            assert_eq!(failed.len(), 1);
            assert!(failed[0].thumbnail.ends_with("blank.png"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!plots.join("UK-AIH_HE_background_erased_LAB.png").exists());

    config.aggregation.skip_failed = true;
    let plot = pipeline::plot_cohort(&dir, "UK-AIH", "HE", &config).unwrap();
    assert_eq!(plot.summary.points, 2);
    assert_eq!(plot.excluded.len(), 1);
}

#[test]
fn in_memory_handoff_matches_disk() {
    let base = tempfile::tempdir().unwrap();
    let config = test_config(base.path());
    let slides = write_slides(base.path(), &[[170, 80, 120], [100, 40, 90]]);
    let out = base.path().join("thumbs");
    fs::create_dir_all(&out).unwrap();
    let batch = pipeline::save_thumbnails(
        &source(),
        &slides,
        &out,
        &config.thumbnail,
    );

    let from_memory = pipeline::aggregate_saved("mem", &batch.saved, &config)
        .unwrap()
        .into_complete()
        .unwrap();
    let from_disk = pipeline::aggregate_dir("disk", &out, &config)
        .unwrap()
        .into_complete()
        .unwrap();
    assert_eq!(from_memory, from_disk);
}
