//! `render-ssim` CLI - score candidate renders against a reference image.
//!
//! Prints one line per candidate, in input order:
//!
//! ```text
//! mode:  <candidate-path> SSIM: <score>
//! ```
//!
//! A candidate that fails to load or mismatches the reference shape is
//! logged and skipped; the remaining candidates are still scored and the
//! process exits nonzero at the end.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::ProgressBar;
use render_ssim::{FloatImage, Ssim, SsimConfig, SsimReference};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Score candidate renders against a reference image with windowed SSIM.
#[derive(Parser, Debug)]
#[command(name = "render-ssim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Reference image path (e.g. the ray-traced ground truth).
    #[arg(value_name = "REFERENCE")]
    reference: PathBuf,

    /// Candidate image paths, scored in input order.
    #[arg(value_name = "CANDIDATE", required = true)]
    candidates: Vec<PathBuf>,

    /// Override the data range. Defaults to the reference sample span
    /// (max - min); required when the reference is flat.
    #[arg(long, value_name = "FLOAT")]
    data_range: Option<f32>,

    /// Use the 11x11 Gaussian comparison window instead of the 7x7 uniform one.
    #[arg(long)]
    gaussian: bool,

    /// Write a normalized difference map per candidate into this directory.
    #[arg(long, value_name = "DIR")]
    diff_map: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("render_ssim={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    let reference = FloatImage::open(&args.reference)?;

    let data_range = match args.data_range {
        Some(range) => range,
        None => reference.data_range(),
    };
    tracing::debug!(
        "reference {} ({}x{}, {} channels), data range {}",
        args.reference.display(),
        reference.width(),
        reference.height(),
        reference.channels(),
        data_range
    );

    let config = if args.gaussian {
        SsimConfig::gaussian(data_range)
    } else {
        SsimConfig::new(data_range)
    };
    let reference = SsimReference::new(&reference, config)?;

    if let Some(dir) = &args.diff_map {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let progress = ProgressBar::new(args.candidates.len() as u64);
    let mut failed = 0usize;
    for path in &args.candidates {
        match score_candidate(&reference, path, args.diff_map.as_deref()) {
            Ok(score) => progress.println(format!("mode:  {} SSIM: {}", path.display(), score)),
            Err(err) => {
                failed += 1;
                progress.suspend(|| tracing::error!("{}: {err:#}", path.display()));
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    if failed > 0 {
        anyhow::bail!(
            "{failed} of {} candidates could not be scored",
            args.candidates.len()
        );
    }
    Ok(())
}

/// Load and score a single candidate, optionally writing its difference map.
fn score_candidate(
    reference: &SsimReference,
    path: &Path,
    diff_dir: Option<&Path>,
) -> Result<f64> {
    let candidate = FloatImage::open(path)?;
    match diff_dir {
        Some(dir) => {
            let ssim = reference.compare_map(&candidate)?;
            write_diff_map(dir, path, &ssim)?;
            Ok(ssim.score)
        }
        None => Ok(reference.compare(&candidate)?),
    }
}

/// Write the min-max normalized dissimilarity map as an 8-bit PNG.
fn write_diff_map(dir: &Path, candidate: &Path, ssim: &Ssim) -> Result<PathBuf> {
    let map = ssim.dissimilarity_map().normalized();
    let out = diff_map_path(dir, candidate);
    let width = map.width() as u32;
    let height = map.height() as u32;

    if map.channels() >= 3 {
        let mut pixels = Vec::with_capacity(map.width() * map.height() * 3);
        for i in 0..map.width() * map.height() {
            pixels.push(to_u8(map.plane(0)[i]));
            pixels.push(to_u8(map.plane(1)[i]));
            pixels.push(to_u8(map.plane(2)[i]));
        }
        image::RgbImage::from_raw(width, height, pixels)
            .context("difference map buffer has the wrong size")?
            .save(&out)
            .with_context(|| format!("failed to write {}", out.display()))?;
    } else {
        let pixels: Vec<u8> = map.plane(0).iter().map(|&v| to_u8(v)).collect();
        image::GrayImage::from_raw(width, height, pixels)
            .context("difference map buffer has the wrong size")?
            .save(&out)
            .with_context(|| format!("failed to write {}", out.display()))?;
    }

    tracing::debug!("wrote difference map {}", out.display());
    Ok(out)
}

fn diff_map_path(dir: &Path, candidate: &Path) -> PathBuf {
    let stem = candidate
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("candidate");
    dir.join(format!("{stem}_ssim_diff.png"))
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
