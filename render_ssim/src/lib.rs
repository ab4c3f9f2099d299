//! Windowed structural similarity (SSIM) for comparing rendered images.
//!
//! Computes the classic single-scale SSIM index (Wang et al., 2004) between a
//! reference image and a candidate of identical shape: local luminance,
//! contrast and structure statistics over a sliding window, combined into a
//! per-pixel map and averaged into a global score in -1.0..=1.0 (higher is
//! more similar). The intended use is scoring approximate render outputs
//! (filtered reflections, hybrid passes) against a ray-traced ground truth,
//! but any same-shaped pair works.
//!
//! The default window is the 7x7 uniform window with sample covariance
//! normalization; an 11x11 Gaussian window (`sigma = 1.5`) is available via
//! [`SsimConfig::gaussian`]. `data_range` is an explicit input: derive it
//! from the reference image's sample span ([`FloatImage::data_range`]) rather
//! than hardcoding it, or the stabilizing constants will not match the data.
//!
//! # Example
//!
//! ```
//! use render_ssim::{compute_ssim, FloatImage, SsimConfig};
//!
//! let reference = FloatImage::from_planes(vec![vec![0.5; 16 * 16]], 16, 16)?;
//! let candidate = FloatImage::from_planes(vec![vec![0.6; 16 * 16]], 16, 16)?;
//!
//! let score = compute_ssim(&reference, &candidate, SsimConfig::new(1.0))?;
//! assert!(score > 0.9 && score < 1.0);
//! # Ok::<(), render_ssim::SsimError>(())
//! ```
//!
//! When scoring several candidates against one reference, use
//! [`SsimReference`] to compute the reference-side statistics once.

mod input;
mod precompute;
mod window;

pub use input::FloatImage;
pub use precompute::SsimReference;
pub use window::WindowKind;

pub(crate) use window::Window;

#[cfg(feature = "image")]
use std::path::PathBuf;

use thiserror::Error;

/// Luminance stabilizer factor; `C1 = (K1 * data_range)^2`.
pub const K1: f32 = 0.01;
/// Contrast stabilizer factor; `C2 = (K2 * data_range)^2`.
pub const K2: f32 = 0.03;
/// Side length of the default uniform comparison window.
pub const DEFAULT_WINDOW_SIZE: usize = 7;
/// Standard deviation of the Gaussian window selected by [`SsimConfig::gaussian`].
pub const GAUSSIAN_SIGMA: f32 = 1.5;

/// Errors that can occur while preparing images or computing scores.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SsimError {
    /// Failed to read or decode an image file.
    #[cfg(feature = "image")]
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        /// Path that could not be loaded.
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Reference and candidate shapes differ; no resizing or alignment is
    /// attempted.
    #[error("shape mismatch: reference is {reference:?}, candidate is {candidate:?} (width, height, channels)")]
    ShapeMismatch {
        /// Reference `(width, height, channels)`.
        reference: (usize, usize, usize),
        /// Candidate `(width, height, channels)`.
        candidate: (usize, usize, usize),
    },

    /// The image is smaller than the comparison window.
    #[error("image {width}x{height} is smaller than the {window}x{window} comparison window")]
    ImageTooSmall {
        width: usize,
        height: usize,
        window: usize,
    },

    /// `data_range` must be positive and finite. A zero range means the
    /// reference image is flat; pass an explicit range in that case.
    #[error("data range must be positive and finite, got {0}")]
    InvalidDataRange(f32),

    /// Uniform window sizes must be odd so the window has a center pixel.
    #[error("window size {0} must be odd and at least 3")]
    InvalidWindowSize(usize),

    /// Gaussian window sigma must be positive and finite.
    #[error("window sigma must be positive and finite, got {0}")]
    InvalidWindowSigma(f32),

    /// An image needs at least one channel.
    #[error("image must have at least one channel")]
    NoChannels,

    /// A plane's length does not match the image dimensions.
    #[error("plane length {actual} does not match {width}x{height}")]
    PlaneSizeMismatch {
        width: usize,
        height: usize,
        actual: usize,
    },

    /// An interleaved sample buffer has the wrong length.
    #[error("sample buffer length {actual} does not match expected {expected}")]
    SampleCountMismatch { expected: usize, actual: usize },
}

/// Configuration for an SSIM comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SsimConfig {
    /// Shape of the local comparison window.
    pub window: WindowKind,
    /// Span of the sample values (`max - min` of the reference).
    pub data_range: f32,
    /// Normalize windowed variances by `N/(N-1)` (sample covariance) rather
    /// than `1`. On by default, matching the reference implementation.
    pub sample_covariance: bool,
}

impl SsimConfig {
    /// Default configuration: 7x7 uniform window, sample covariance.
    #[must_use]
    pub fn new(data_range: f32) -> Self {
        Self {
            window: WindowKind::Uniform {
                size: DEFAULT_WINDOW_SIZE,
            },
            data_range,
            sample_covariance: true,
        }
    }

    /// Gaussian-window configuration (`sigma = 1.5`, 11x11).
    #[must_use]
    pub fn gaussian(data_range: f32) -> Self {
        Self {
            window: WindowKind::Gaussian {
                sigma: GAUSSIAN_SIGMA,
            },
            ..Self::new(data_range)
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SsimError> {
        if !(self.data_range.is_finite() && self.data_range > 0.0) {
            return Err(SsimError::InvalidDataRange(self.data_range));
        }
        match self.window {
            WindowKind::Uniform { size } if size < 3 || size % 2 == 0 => {
                Err(SsimError::InvalidWindowSize(size))
            }
            WindowKind::Gaussian { sigma } if !(sigma.is_finite() && sigma > 0.0) => {
                Err(SsimError::InvalidWindowSigma(sigma))
            }
            _ => Ok(()),
        }
    }

    /// Stabilizing constants `(C1, C2)` for this data range.
    pub(crate) fn stabilizers(&self) -> (f32, f32) {
        let c1 = (K1 * self.data_range).powi(2);
        let c2 = (K2 * self.data_range).powi(2);
        (c1, c2)
    }

    /// Variance normalization factor: `N/(N-1)` over the window samples, or
    /// `1` when `sample_covariance` is off.
    pub(crate) fn covariance_norm(&self) -> f32 {
        if self.sample_covariance {
            let n = self.window.size();
            let n = (n * n) as f32;
            n / (n - 1.0)
        } else {
            1.0
        }
    }
}

/// Result of a full SSIM comparison.
#[derive(Debug, Clone)]
pub struct Ssim {
    /// Global score: mean of the per-channel scores.
    pub score: f64,
    /// Mean local SSIM per channel, in plane order.
    pub channel_scores: Vec<f64>,
    /// Per-pixel local SSIM map, same shape as the inputs.
    pub map: FloatImage,
}

impl Ssim {
    /// Per-pixel dissimilarity (`1 - SSIM`), uniformly zero for identical
    /// inputs. This is the "difference map" to visualize or write to disk
    /// (see [`FloatImage::normalized`] for display scaling).
    #[must_use]
    pub fn dissimilarity_map(&self) -> FloatImage {
        self.map.map_samples(|v| 1.0 - v)
    }
}

/// Compute the global SSIM score between a reference and a candidate.
///
/// Equivalent to [`SsimReference::new`] followed by
/// [`compare`][SsimReference::compare]; prefer building the reference once
/// when scoring multiple candidates.
///
/// # Errors
/// - [`SsimError::ShapeMismatch`] if the shapes differ
/// - [`SsimError::ImageTooSmall`] if either dimension is smaller than the window
/// - [`SsimError::InvalidDataRange`] / window validation errors from the config
pub fn compute_ssim(
    reference: &FloatImage,
    candidate: &FloatImage,
    config: SsimConfig,
) -> Result<f64, SsimError> {
    SsimReference::new(reference, config)?.compare(candidate)
}

/// Compute the global score plus the per-pixel local SSIM map.
///
/// # Errors
/// Same conditions as [`compute_ssim`].
pub fn compute_ssim_map(
    reference: &FloatImage,
    candidate: &FloatImage,
    config: SsimConfig,
) -> Result<Ssim, SsimError> {
    SsimReference::new(reference, config)?.compare_map(candidate)
}

// =============================================================================
// Core windowed statistics
// =============================================================================

/// Windowed moments of a single plane: `f(x)` and `f(x*x)`.
#[derive(Debug, Clone)]
pub(crate) struct PlaneStats {
    pub mu: Vec<f32>,
    pub raw_sq: Vec<f32>,
}

pub(crate) fn plane_stats(plane: &[f32], window: &mut Window) -> PlaneStats {
    let mu = window.filter(plane);
    let squared: Vec<f32> = plane.iter().map(|&v| v * v).collect();
    let raw_sq = window.filter(&squared);
    PlaneStats { mu, raw_sq }
}

/// Per-pixel local SSIM of one plane pair from precomputed moments.
///
/// `v = cov_norm * (f(x*x) - mu^2)` turns the raw second moments into
/// (co)variances; the map value is the product of the luminance and
/// contrast/structure terms.
pub(crate) fn ssim_plane_map(
    x: &[f32],
    x_stats: &PlaneStats,
    y: &[f32],
    y_stats: &PlaneStats,
    window: &mut Window,
    c1: f32,
    c2: f32,
    cov_norm: f32,
) -> Vec<f32> {
    let cross: Vec<f32> = x.iter().zip(y).map(|(&a, &b)| a * b).collect();
    let raw_xy = window.filter(&cross);

    (0..x.len())
        .map(|i| {
            let mu_x = x_stats.mu[i];
            let mu_y = y_stats.mu[i];
            let v_x = cov_norm * (x_stats.raw_sq[i] - mu_x * mu_x);
            let v_y = cov_norm * (y_stats.raw_sq[i] - mu_y * mu_y);
            let v_xy = cov_norm * (raw_xy[i] - mu_x * mu_y);

            let a1 = 2.0 * mu_x * mu_y + c1;
            let a2 = 2.0 * v_xy + c2;
            let b1 = mu_x * mu_x + mu_y * mu_y + c1;
            let b2 = v_x + v_y + c2;
            (a1 * a2) / (b1 * b2)
        })
        .collect()
}

/// Mean over the interior of the map, cropping `pad` pixels from each border
/// where the window overlaps reflected samples. Accumulates in f64.
pub(crate) fn crop_mean(map: &[f32], width: usize, height: usize, pad: usize) -> f64 {
    debug_assert!(width > 2 * pad && height > 2 * pad);
    let mut sum = 0.0f64;
    for row in map.chunks_exact(width).skip(pad).take(height - 2 * pad) {
        for &v in &row[pad..width - pad] {
            sum += f64::from(v);
        }
    }
    let count = (width - 2 * pad) * (height - 2 * pad);
    sum / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SsimConfig::new(1.0);
        assert_eq!(config.window, WindowKind::Uniform { size: 7 });
        assert!(config.sample_covariance);
        assert!(config.validate().is_ok());

        let gaussian = SsimConfig::gaussian(1.0);
        assert_eq!(gaussian.window, WindowKind::Gaussian { sigma: 1.5 });
        assert_eq!(gaussian.window.size(), 11);
    }

    #[test]
    fn test_config_validation() {
        assert!(matches!(
            SsimConfig::new(0.0).validate(),
            Err(SsimError::InvalidDataRange(_))
        ));
        assert!(matches!(
            SsimConfig::new(-1.0).validate(),
            Err(SsimError::InvalidDataRange(_))
        ));
        assert!(matches!(
            SsimConfig::new(f32::NAN).validate(),
            Err(SsimError::InvalidDataRange(_))
        ));

        let mut config = SsimConfig::new(1.0);
        config.window = WindowKind::Uniform { size: 8 };
        assert!(matches!(
            config.validate(),
            Err(SsimError::InvalidWindowSize(8))
        ));
        config.window = WindowKind::Gaussian { sigma: 0.0 };
        assert!(matches!(
            config.validate(),
            Err(SsimError::InvalidWindowSigma(_))
        ));
    }

    #[test]
    fn test_stabilizers_scale_with_data_range() {
        let (c1, c2) = SsimConfig::new(1.0).stabilizers();
        assert!((c1 - 1e-4).abs() < 1e-9);
        assert!((c2 - 9e-4).abs() < 1e-9);

        let (c1_wide, _) = SsimConfig::new(2.0).stabilizers();
        assert!((c1_wide - 4e-4).abs() < 1e-9);
    }

    #[test]
    fn test_covariance_norm() {
        let config = SsimConfig::new(1.0);
        assert!((config.covariance_norm() - 49.0 / 48.0).abs() < 1e-6);

        let mut population = config;
        population.sample_covariance = false;
        assert_eq!(population.covariance_norm(), 1.0);
    }

    #[test]
    fn test_crop_mean_interior_only() {
        // 4x4 map with a hot border; pad 1 leaves the 2x2 interior.
        #[rustfmt::skip]
        let map = [
            9.0f32, 9.0, 9.0, 9.0,
            9.0,    1.0, 3.0, 9.0,
            9.0,    5.0, 7.0, 9.0,
            9.0,    9.0, 9.0, 9.0,
        ];
        let mean = crop_mean(&map, 4, 4, 1);
        assert!((mean - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_crop_mean_no_pad() {
        let map = [1.0f32, 2.0, 3.0, 4.0];
        assert!((crop_mean(&map, 2, 2, 0) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_dissimilarity_map_inverts() {
        let map = FloatImage::from_planes(vec![vec![1.0, 0.75, 0.0, 0.5]], 2, 2).unwrap();
        let ssim = Ssim {
            score: 0.5625,
            channel_scores: vec![0.5625],
            map,
        };
        let diff = ssim.dissimilarity_map();
        assert_eq!(diff.plane(0), &[0.0, 0.25, 1.0, 0.5][..]);
    }
}
