//! Sliding-window filtering for local image statistics.
//!
//! SSIM compares local luminance, contrast and structure, all of which are
//! windowed moments: `f(x)`, `f(x*x)` and `f(x*y)` for a window filter `f`.
//! This module provides that filter as a separable 2-D correlation with
//! half-sample-symmetric ("reflect") boundary handling, so a constant image
//! stays constant all the way to the edges.

/// Shape of the comparison window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowKind {
    /// Uniform (moving-average) window with the given odd side length.
    Uniform {
        /// Side length in pixels; must be odd and at least 3.
        size: usize,
    },
    /// Gaussian-weighted window with the given standard deviation.
    ///
    /// The radius is `floor(3.5 * sigma + 0.5)`, so the conventional
    /// `sigma = 1.5` yields an 11x11 window.
    Gaussian {
        /// Standard deviation of the weights; must be positive.
        sigma: f32,
    },
}

/// Kernels are cut off at this many standard deviations.
const GAUSSIAN_TRUNCATE: f32 = 3.5;

impl WindowKind {
    /// Number of pixels on each side of the window center.
    #[must_use]
    pub fn radius(self) -> usize {
        match self {
            WindowKind::Uniform { size } => size / 2,
            WindowKind::Gaussian { sigma } => (GAUSSIAN_TRUNCATE * sigma + 0.5) as usize,
        }
    }

    /// Side length of the window in pixels.
    #[must_use]
    pub fn size(self) -> usize {
        2 * self.radius() + 1
    }
}

/// Structure handling windowed filtering of image planes.
///
/// Holds the normalized window weights and a scratch buffer for the
/// intermediate horizontal pass, so repeated [`filter`][Self::filter] calls
/// on same-sized planes reuse the allocation.
pub(crate) struct Window {
    weights: Vec<f32>,
    radius: usize,
    temp: Vec<f32>,
    width: usize,
    height: usize,
}

impl Window {
    /// Create a new [Window] for planes of the given width and height.
    /// This pre-allocates the scratch buffer.
    pub fn new(kind: WindowKind, width: usize, height: usize) -> Self {
        let radius = kind.radius();
        let weights = match kind {
            WindowKind::Uniform { .. } => {
                let len = 2 * radius + 1;
                vec![1.0 / len as f32; len]
            }
            WindowKind::Gaussian { sigma } => gaussian_weights(sigma, radius),
        };
        debug_assert_eq!(weights.len(), 2 * radius + 1);
        Window {
            weights,
            radius,
            temp: vec![0.0f32; width * height],
            width,
            height,
        }
    }

    /// Correlate the plane with the window in both dimensions.
    pub fn filter(&mut self, plane: &[f32]) -> Vec<f32> {
        debug_assert_eq!(plane.len(), self.width * self.height);
        let mut out = vec![0.0f32; plane.len()];
        self.horizontal_pass(plane);
        self.vertical_pass(&mut out);
        out
    }

    fn horizontal_pass(&mut self, src: &[f32]) {
        let radius = self.radius as isize;
        for (src_row, dst_row) in src
            .chunks_exact(self.width)
            .zip(self.temp.chunks_exact_mut(self.width))
        {
            for (x, dst) in dst_row.iter_mut().enumerate() {
                let mut acc = 0.0f32;
                for (k, &w) in self.weights.iter().enumerate() {
                    let sx = reflect(x as isize + k as isize - radius, self.width);
                    acc += w * src_row[sx];
                }
                *dst = acc;
            }
        }
    }

    fn vertical_pass(&self, dst: &mut [f32]) {
        let radius = self.radius as isize;
        for (y, dst_row) in dst.chunks_exact_mut(self.width).enumerate() {
            for (k, &w) in self.weights.iter().enumerate() {
                let sy = reflect(y as isize + k as isize - radius, self.height);
                let src_row = &self.temp[sy * self.width..(sy + 1) * self.width];
                for (d, &s) in dst_row.iter_mut().zip(src_row) {
                    *d += w * s;
                }
            }
        }
    }
}

/// Normalized Gaussian weights for the given sigma.
fn gaussian_weights(sigma: f32, radius: usize) -> Vec<f32> {
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let d = i as f32 - radius as f32;
            (-d * d / denom).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Map an out-of-bounds index back into `0..len` by reflecting about the
/// edges, repeating the edge sample (`-1 -> 0`, `len -> len - 1`).
#[inline]
fn reflect(idx: isize, len: usize) -> usize {
    let len = len as isize;
    let mut i = idx;
    while i < 0 || i >= len {
        if i < 0 {
            i = -i - 1;
        } else {
            i = 2 * len - i - 1;
        }
    }
    i as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect_indexing() {
        assert_eq!(reflect(0, 4), 0);
        assert_eq!(reflect(3, 4), 3);
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
    }

    #[test]
    fn test_window_sizes() {
        assert_eq!(WindowKind::Uniform { size: 7 }.radius(), 3);
        assert_eq!(WindowKind::Uniform { size: 7 }.size(), 7);
        assert_eq!(WindowKind::Gaussian { sigma: 1.5 }.radius(), 5);
        assert_eq!(WindowKind::Gaussian { sigma: 1.5 }.size(), 11);
    }

    #[test]
    fn test_gaussian_weights_normalized_and_symmetric() {
        let weights = gaussian_weights(1.5, 5);
        assert_eq!(weights.len(), 11);
        let sum: f32 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        for i in 0..5 {
            assert!((weights[i] - weights[10 - i]).abs() < 1e-7);
        }
        // Center weight is the largest
        assert!(weights[5] > weights[4]);
    }

    #[test]
    fn test_constant_plane_is_preserved() {
        for kind in [
            WindowKind::Uniform { size: 7 },
            WindowKind::Gaussian { sigma: 1.5 },
        ] {
            let mut window = Window::new(kind, 16, 12);
            let plane = vec![0.25f32; 16 * 12];
            let filtered = window.filter(&plane);
            for &v in &filtered {
                assert!((v - 0.25).abs() < 1e-5, "{kind:?} produced {v}");
            }
        }
    }

    #[test]
    fn test_uniform_filter_averages_neighborhood() {
        // A single bright pixel in the middle of a 9x9 zero plane spreads
        // into a 3x3 patch of 1/9 after filtering with a 3x3 uniform window.
        let mut plane = vec![0.0f32; 9 * 9];
        plane[4 * 9 + 4] = 1.0;
        let mut window = Window::new(WindowKind::Uniform { size: 3 }, 9, 9);
        let filtered = window.filter(&plane);
        for y in 0..9 {
            for x in 0..9 {
                let expected = if (3..=5).contains(&x) && (3..=5).contains(&y) {
                    1.0 / 9.0
                } else {
                    0.0
                };
                assert!((filtered[y * 9 + x] - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_filter_reuses_scratch_across_calls() {
        let mut window = Window::new(WindowKind::Uniform { size: 3 }, 8, 8);
        let a = window.filter(&vec![0.5f32; 64]);
        let b = window.filter(&vec![0.5f32; 64]);
        assert_eq!(a, b);
    }
}
