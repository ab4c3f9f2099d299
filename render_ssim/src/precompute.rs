//! Precomputed reference statistics for scoring many candidates.
//!
//! The evaluator's shape is one reference image against an ordered batch of
//! candidates. The reference-side windowed moments (`f(x)` and `f(x*x)`) do
//! not depend on the candidate, so they are computed once here and reused;
//! each comparison then only filters the candidate and the cross term.
//!
//! # Example
//!
//! ```
//! use render_ssim::{FloatImage, SsimConfig, SsimReference};
//!
//! let reference = FloatImage::from_planes(vec![vec![0.5; 32 * 32]], 32, 32)?;
//! let prepared = SsimReference::new(&reference, SsimConfig::new(1.0))?;
//!
//! for value in [0.45f32, 0.55, 0.8] {
//!     let candidate = FloatImage::from_planes(vec![vec![value; 32 * 32]], 32, 32)?;
//!     let score = prepared.compare(&candidate)?;
//!     assert!(score <= 1.0);
//! }
//! # Ok::<(), render_ssim::SsimError>(())
//! ```

use crate::input::FloatImage;
use crate::window::Window;
use crate::{crop_mean, plane_stats, ssim_plane_map, PlaneStats, Ssim, SsimConfig, SsimError};

/// Reference-side data for a single plane.
#[derive(Debug, Clone)]
struct PlaneData {
    /// Reference samples, kept for the cross term `f(x*y)`.
    samples: Vec<f32>,
    /// Windowed moments of the reference plane.
    stats: PlaneStats,
}

/// Precomputed reference statistics for repeated SSIM comparisons.
///
/// Stores the reference planes together with their windowed moments, so
/// scoring a batch of candidates against the same reference skips the
/// reference-side filtering each time.
#[derive(Debug, Clone)]
pub struct SsimReference {
    planes: Vec<PlaneData>,
    width: usize,
    height: usize,
    config: SsimConfig,
}

impl SsimReference {
    /// Precompute reference statistics for the given image.
    ///
    /// # Errors
    /// - If the config is invalid (non-positive `data_range`, bad window)
    /// - [`SsimError::ImageTooSmall`] if either dimension is smaller than the window
    pub fn new(reference: &FloatImage, config: SsimConfig) -> Result<Self, SsimError> {
        config.validate()?;

        let window_size = config.window.size();
        if reference.width() < window_size || reference.height() < window_size {
            return Err(SsimError::ImageTooSmall {
                width: reference.width(),
                height: reference.height(),
                window: window_size,
            });
        }

        let mut window = Window::new(config.window, reference.width(), reference.height());
        let planes = reference
            .planes()
            .iter()
            .map(|plane| PlaneData {
                samples: plane.clone(),
                stats: plane_stats(plane, &mut window),
            })
            .collect();

        Ok(Self {
            planes,
            width: reference.width(),
            height: reference.height(),
            config,
        })
    }

    /// Compare a candidate against the reference and return the global score.
    ///
    /// # Errors
    /// [`SsimError::ShapeMismatch`] if the candidate shape differs from the
    /// reference.
    pub fn compare(&self, candidate: &FloatImage) -> Result<f64, SsimError> {
        Ok(self.compare_map(candidate)?.score)
    }

    /// Compare a candidate and return the score plus the local SSIM map.
    ///
    /// # Errors
    /// Same conditions as [`compare`][Self::compare].
    pub fn compare_map(&self, candidate: &FloatImage) -> Result<Ssim, SsimError> {
        self.check_shape(candidate)?;

        let results = self.plane_results(candidate);
        let channel_scores: Vec<f64> = results.iter().map(|(score, _)| *score).collect();
        let score = channel_scores.iter().sum::<f64>() / channel_scores.len() as f64;
        let maps: Vec<Vec<f32>> = results.into_iter().map(|(_, map)| map).collect();
        let map = FloatImage::from_planes(maps, self.width, self.height)
            .expect("map planes match the reference dimensions");

        Ok(Ssim {
            score,
            channel_scores,
            map,
        })
    }

    fn check_shape(&self, candidate: &FloatImage) -> Result<(), SsimError> {
        let reference = (self.width, self.height, self.planes.len());
        if candidate.dimensions() != reference {
            return Err(SsimError::ShapeMismatch {
                reference,
                candidate: candidate.dimensions(),
            });
        }
        Ok(())
    }

    fn plane_results(&self, candidate: &FloatImage) -> Vec<(f64, Vec<f32>)> {
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            self.planes
                .par_iter()
                .zip(candidate.planes().par_iter())
                .map(|(data, cand)| {
                    let mut window = Window::new(self.config.window, self.width, self.height);
                    self.score_plane(data, cand, &mut window)
                })
                .collect()
        }
        #[cfg(not(feature = "rayon"))]
        {
            let mut window = Window::new(self.config.window, self.width, self.height);
            self.planes
                .iter()
                .zip(candidate.planes())
                .map(|(data, cand)| self.score_plane(data, cand, &mut window))
                .collect()
        }
    }

    fn score_plane(
        &self,
        data: &PlaneData,
        candidate: &[f32],
        window: &mut Window,
    ) -> (f64, Vec<f32>) {
        let (c1, c2) = self.config.stabilizers();
        let cov_norm = self.config.covariance_norm();

        let cand_stats = plane_stats(candidate, window);
        let map = ssim_plane_map(
            &data.samples,
            &data.stats,
            candidate,
            &cand_stats,
            window,
            c1,
            c2,
            cov_norm,
        );
        let score = crop_mean(&map, self.width, self.height, self.config.window.radius());
        (score, map)
    }

    /// Width of the reference image.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height of the reference image.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of channels in the reference image.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// The configuration this reference was prepared with.
    #[must_use]
    pub fn config(&self) -> SsimConfig {
        self.config
    }
}
