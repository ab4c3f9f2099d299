//! Input image representation and sample normalization.
//!
//! Comparisons run on [`FloatImage`]: one `f32` plane per channel, with
//! integer samples normalized by the type maximum so that u8 and u16 sources
//! land in the 0.0-1.0 range. Float sources pass through unchanged; they are
//! assumed to already be in the working range.
//!
//! ## Supported sources (with the `image` feature)
//!
//! | Type | Planes | Conversion |
//! |------|--------|------------|
//! | `Luma8` / `Luma16` | 1 | `/255` resp. `/65535` |
//! | `Rgb8` / `Rgb16` | 3 | `/255` resp. `/65535` |
//! | `Rgb32F` | 3 | none |
//! | anything else (alpha, ...) | 3 | converted to RGB8, alpha dropped |
//!
//! No transfer-function handling is applied; samples are compared in the
//! encoding they were stored in.

use num_traits::{NumCast, PrimInt};

use crate::SsimError;

/// A planar floating-point image.
///
/// Stores `channels` planes of `width * height` samples each. Immutable
/// after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    planes: Vec<Vec<f32>>,
    width: usize,
    height: usize,
}

impl FloatImage {
    /// Creates an image from per-channel planes.
    ///
    /// # Errors
    /// - [`SsimError::NoChannels`] if `planes` is empty
    /// - [`SsimError::PlaneSizeMismatch`] if any plane is not `width * height` long
    pub fn from_planes(
        planes: Vec<Vec<f32>>,
        width: usize,
        height: usize,
    ) -> Result<Self, SsimError> {
        if planes.is_empty() {
            return Err(SsimError::NoChannels);
        }
        for plane in &planes {
            if plane.len() != width * height {
                return Err(SsimError::PlaneSizeMismatch {
                    width,
                    height,
                    actual: plane.len(),
                });
            }
        }
        Ok(Self {
            planes,
            width,
            height,
        })
    }

    /// Creates an image from interleaved integer samples, normalizing each by
    /// the sample type's maximum (u8 by 255, u16 by 65535).
    ///
    /// # Errors
    /// - [`SsimError::NoChannels`] if `channels` is zero
    /// - [`SsimError::SampleCountMismatch`] if `data` is not `width * height * channels` long
    pub fn from_interleaved_int<T>(
        data: &[T],
        width: usize,
        height: usize,
        channels: usize,
    ) -> Result<Self, SsimError>
    where
        T: PrimInt + NumCast,
    {
        let max =
            <f32 as NumCast>::from(T::max_value()).expect("integer sample maximum fits in f32");
        let inv = 1.0 / max;
        Self::from_interleaved_with(data, width, height, channels, |v| {
            <f32 as NumCast>::from(v).expect("integer sample fits in f32") * inv
        })
    }

    /// Creates an image from interleaved float samples, taken as-is.
    ///
    /// # Errors
    /// Same conditions as [`from_interleaved_int`][Self::from_interleaved_int].
    pub fn from_interleaved_f32(
        data: &[f32],
        width: usize,
        height: usize,
        channels: usize,
    ) -> Result<Self, SsimError> {
        Self::from_interleaved_with(data, width, height, channels, |v| v)
    }

    fn from_interleaved_with<T: Copy>(
        data: &[T],
        width: usize,
        height: usize,
        channels: usize,
        f: impl Fn(T) -> f32,
    ) -> Result<Self, SsimError> {
        if channels == 0 {
            return Err(SsimError::NoChannels);
        }
        let expected = width * height * channels;
        if data.len() != expected {
            return Err(SsimError::SampleCountMismatch {
                expected,
                actual: data.len(),
            });
        }
        let mut planes: Vec<Vec<f32>> = (0..channels)
            .map(|_| Vec::with_capacity(width * height))
            .collect();
        for px in data.chunks_exact(channels) {
            for (plane, &v) in planes.iter_mut().zip(px) {
                plane.push(f(v));
            }
        }
        Ok(Self {
            planes,
            width,
            height,
        })
    }

    /// Returns the image width.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the number of channels.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// Returns `(width, height, channels)`.
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.planes.len())
    }

    /// Returns all planes.
    #[must_use]
    pub fn planes(&self) -> &[Vec<f32>] {
        &self.planes
    }

    /// Returns the samples of one channel.
    ///
    /// # Panics
    /// Panics if `channel >= self.channels()`.
    #[must_use]
    pub fn plane(&self, channel: usize) -> &[f32] {
        &self.planes[channel]
    }

    /// Minimum and maximum sample value across all planes.
    #[must_use]
    pub fn sample_range(&self) -> (f32, f32) {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for plane in &self.planes {
            for &v in plane {
                min = min.min(v);
                max = max.max(v);
            }
        }
        (min, max)
    }

    /// Span of the sample values (`max - min`).
    ///
    /// This is the value to pass as `data_range` when comparing candidates
    /// against this image as the reference.
    #[must_use]
    pub fn data_range(&self) -> f32 {
        let (min, max) = self.sample_range();
        max - min
    }

    /// Min-max normalizes all samples into 0.0-1.0.
    ///
    /// A flat image (zero span) maps to all zeros.
    #[must_use]
    pub fn normalized(&self) -> FloatImage {
        let (min, max) = self.sample_range();
        let span = max - min;
        if span <= 0.0 {
            return self.map_samples(|_| 0.0);
        }
        self.map_samples(|v| (v - min) / span)
    }

    pub(crate) fn map_samples(&self, f: impl Fn(f32) -> f32) -> FloatImage {
        FloatImage {
            planes: self
                .planes
                .iter()
                .map(|plane| plane.iter().map(|&v| f(v)).collect())
                .collect(),
            width: self.width,
            height: self.height,
        }
    }
}

// =============================================================================
// image crate integration
// =============================================================================

#[cfg(feature = "image")]
mod decode {
    use std::path::Path;

    use image::{DynamicImage, GenericImageView};

    use super::FloatImage;
    use crate::SsimError;

    impl FloatImage {
        /// Decodes an image file into a normalized float image.
        ///
        /// Grayscale sources produce one plane; everything else produces
        /// three RGB planes (alpha is dropped).
        ///
        /// # Errors
        /// [`SsimError::ImageLoad`] if the path cannot be read or decoded.
        pub fn open<P: AsRef<Path>>(path: P) -> Result<FloatImage, SsimError> {
            let path = path.as_ref();
            let img = image::open(path).map_err(|source| SsimError::ImageLoad {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(FloatImage::from(&img))
        }
    }

    impl From<&DynamicImage> for FloatImage {
        fn from(img: &DynamicImage) -> Self {
            let width = img.width() as usize;
            let height = img.height() as usize;
            match img {
                DynamicImage::ImageLuma8(buf) => {
                    FloatImage::from_interleaved_int(buf.as_raw(), width, height, 1)
                }
                DynamicImage::ImageLuma16(buf) => {
                    FloatImage::from_interleaved_int(buf.as_raw(), width, height, 1)
                }
                DynamicImage::ImageRgb8(buf) => {
                    FloatImage::from_interleaved_int(buf.as_raw(), width, height, 3)
                }
                DynamicImage::ImageRgb16(buf) => {
                    FloatImage::from_interleaved_int(buf.as_raw(), width, height, 3)
                }
                DynamicImage::ImageRgb32F(buf) => {
                    FloatImage::from_interleaved_f32(buf.as_raw(), width, height, 3)
                }
                other => {
                    let rgb = other.to_rgb8();
                    FloatImage::from_interleaved_int(rgb.as_raw(), width, height, 3)
                }
            }
            .expect("decoded image dimensions are always consistent")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_normalization() {
        let img = FloatImage::from_interleaved_int(&[0u8, 128, 255], 3, 1, 1).unwrap();
        let plane = img.plane(0);
        assert!((plane[0] - 0.0).abs() < 1e-6);
        assert!((plane[1] - 128.0 / 255.0).abs() < 1e-6);
        assert!((plane[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_u16_normalization() {
        let img = FloatImage::from_interleaved_int(&[0u16, u16::MAX], 2, 1, 1).unwrap();
        assert!((img.plane(0)[0] - 0.0).abs() < 1e-6);
        assert!((img.plane(0)[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_deinterleave() {
        // 2x1 RGB: red pixel then green pixel
        let data = [255u8, 0, 0, 0, 255, 0];
        let img = FloatImage::from_interleaved_int(&data, 2, 1, 3).unwrap();
        assert_eq!(img.dimensions(), (2, 1, 3));
        assert!((img.plane(0)[0] - 1.0).abs() < 1e-6);
        assert!((img.plane(0)[1] - 0.0).abs() < 1e-6);
        assert!((img.plane(1)[1] - 1.0).abs() < 1e-6);
        assert!((img.plane(2)[0] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_f32_passthrough() {
        let data = [0.5f32, -0.25, 2.0];
        let img = FloatImage::from_interleaved_f32(&data, 3, 1, 1).unwrap();
        assert_eq!(img.plane(0), &data[..]);
    }

    #[test]
    fn test_from_planes_validation() {
        assert!(matches!(
            FloatImage::from_planes(vec![], 2, 2),
            Err(SsimError::NoChannels)
        ));
        assert!(matches!(
            FloatImage::from_planes(vec![vec![0.0; 3]], 2, 2),
            Err(SsimError::PlaneSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_sample_count_validation() {
        assert!(matches!(
            FloatImage::from_interleaved_int(&[0u8; 5], 2, 1, 3),
            Err(SsimError::SampleCountMismatch {
                expected: 6,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_sample_range_spans_planes() {
        let img =
            FloatImage::from_planes(vec![vec![0.2, 0.4], vec![0.1, 0.9]], 2, 1).unwrap();
        assert_eq!(img.sample_range(), (0.1, 0.9));
        assert!((img.data_range() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalized_spans_unit_range() {
        let img = FloatImage::from_planes(vec![vec![0.2, 0.4, 0.6, 1.0]], 2, 2).unwrap();
        let norm = img.normalized();
        assert!((norm.plane(0)[0] - 0.0).abs() < 1e-6);
        assert!((norm.plane(0)[3] - 1.0).abs() < 1e-6);
        assert!((norm.plane(0)[1] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_normalized_flat_image_is_zero() {
        let img = FloatImage::from_planes(vec![vec![0.7; 4]], 2, 2).unwrap();
        let norm = img.normalized();
        assert!(norm.plane(0).iter().all(|&v| v == 0.0));
    }
}
