use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use slide_palette::pipeline::{self, Cohort};
use slide_palette::{Config, ImagePyramidSource, ThumbnailFailure, layout};

/// Dominant stain colour of histology slides, compared across cohorts.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON configuration file; flags below override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory receiving plots (must exist)
    #[arg(long, global = true)]
    plot_dir: Option<PathBuf>,

    /// Plot the remaining samples when some thumbnails fail
    #[arg(long, global = true)]
    skip_failed: bool,

    /// Palette entry used per thumbnail (0 = most dominant)
    #[arg(long, global = true)]
    color_index: Option<usize>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create `<cohort_root>/Thumbnails/<stain>` directories
    Init {
        #[arg(long = "cohort-root", required = true)]
        cohort_roots: Vec<PathBuf>,
        #[arg(long = "stain", required = true)]
        stains: Vec<String>,
    },

    /// Save background-erased thumbnails of slides
    Thumbnails {
        /// One or more slide paths
        #[arg(required = true)]
        slides: Vec<PathBuf>,

        /// Output directory, usually `<cohort_root>/Thumbnails/<stain>`
        #[arg(short, long)]
        out: PathBuf,

        /// Pyramid level to read
        #[arg(short, long)]
        level: Option<usize>,

        /// Keep the slide background
        #[arg(long)]
        no_erase: bool,
    },

    /// Plot the colour distribution of one cohort and stain
    PlotCohort {
        /// Directory of PNG thumbnails
        #[arg(short, long)]
        thumbnails: PathBuf,

        /// Dataset name used in title and file name
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        stain: String,
    },

    /// Plot the combined colour distribution of several cohorts per stain
    PlotCombined {
        #[arg(long = "cohort-root", required = true)]
        cohort_roots: Vec<PathBuf>,

        /// Cohort names, one per root (defaults to the directory names)
        #[arg(long = "name")]
        names: Vec<String>,

        #[arg(long = "stain", required = true)]
        stains: Vec<String>,

        /// Also save one plot per cohort
        #[arg(long)]
        per_cohort: bool,
    },
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(dir) = &args.plot_dir {
        config.plot.output_dir = dir.clone();
    }
    if let Some(index) = args.color_index {
        config.palette.color_index = index;
    }
    config.aggregation.skip_failed |= args.skip_failed;
    config.validate()?;
    Ok(config)
}

fn report_failures(failures: &[ThumbnailFailure]) {
    for failure in failures {
        println!("  excluded {failure}");
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut config = load_config(&args)?;

    match args.command {
        Command::Init {
            cohort_roots,
            stains,
        } => {
            for dir in layout::prepare(&cohort_roots, &stains)? {
                println!("Ready → {}", dir.display());
            }
        }

        Command::Thumbnails {
            slides,
            out,
            level,
            no_erase,
        } => {
            if let Some(level) = level {
                config.thumbnail.level = level;
            }
            config.thumbnail.erase_background &= !no_erase;

            let batch = pipeline::save_thumbnails(
                &ImagePyramidSource::default(),
                &slides,
                &out,
                &config.thumbnail,
            );
            for saved in &batch.saved {
                println!("Saved → {}", saved.path.display());
            }

            let report = pipeline::aggregate_saved("thumbnails", &batch.saved, &config)
                .context("palette extraction failed")?;
            for sample in report.collection.samples() {
                println!(
                    "  {}: L*={:.2} a*={:.2} b*={:.2}",
                    sample.thumbnail, sample.lab.l, sample.lab.a, sample.lab.b
                );
            }
            report_failures(&report.failures);

            if !batch.failures.is_empty() {
                report_failures(&batch.failures);
                bail!(
                    "{} of {} slides failed",
                    batch.failures.len(),
                    slides.len()
                );
            }
        }

        Command::PlotCohort {
            thumbnails,
            name,
            stain,
        } => {
            let plot = pipeline::plot_cohort(&thumbnails, &name, &stain, &config)
                .context("cohort plot failed")?;
            println!(
                "Saved → {} ({} points)",
                plot.summary.path.display(),
                plot.summary.points
            );
            report_failures(&plot.excluded);
        }

        Command::PlotCombined {
            cohort_roots,
            names,
            stains,
            per_cohort,
        } => {
            if !names.is_empty() && names.len() != cohort_roots.len() {
                bail!(
                    "{} names given for {} cohort roots",
                    names.len(),
                    cohort_roots.len()
                );
            }
            let cohorts: Vec<Cohort> = cohort_roots
                .iter()
                .enumerate()
                .map(|(i, root)| Cohort {
                    name: names.get(i).cloned().unwrap_or_else(|| {
                        root.file_name()
                            .unwrap_or_default()
                            .to_string_lossy()
                            .into_owned()
                    }),
                    root: root.clone(),
                })
                .collect();

            let plots = pipeline::plot_combined(&cohorts, &stains, per_cohort, &config)
                .context("combined plot failed")?;
            for plot in plots {
                for cohort in &plot.cohorts {
                    println!("Saved → {} ({} points)", cohort.path.display(), cohort.points);
                }
                println!(
                    "Saved → {} ({} points)",
                    plot.summary.path.display(),
                    plot.summary.points
                );
                report_failures(&plot.excluded);
                for cohort in &plot.missing {
                    println!("  {}: no {} thumbnails", cohort.name, plot.stain);
                }
            }
        }
    }

    Ok(())
}
