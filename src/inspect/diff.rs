//! Pixel-level comparison between a screenshot and its baseline image.

use std::path::Path;

use image::GenericImageView;

/// Per-channel difference threshold as a fraction of full scale.
/// Channels closer than this count as equal, absorbing compression noise.
pub const PIXEL_CHANNEL_THRESHOLD: f64 = 0.1;

/// Maximum percentage of differing pixels for a comparison to pass
pub const MAX_DIFF_PERCENT: f64 = 5.0;

/// Result type for diff operations
pub type DiffResult<T> = Result<T, DiffError>;

/// Errors that can occur while comparing images
#[derive(Debug)]
pub enum DiffError {
    /// Image dimensions do not match; comparison is refused rather than
    /// silently resampled
    DimensionMismatch {
        baseline: (u32, u32),
        actual: (u32, u32),
    },
    /// Failed to decode an image
    Image(image::ImageError),
    /// IO error
    Io(std::io::Error),
}

impl std::fmt::Display for DiffError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffError::DimensionMismatch { baseline, actual } => write!(
                f,
                "Image dimensions do not match: baseline is {}x{}, screenshot is {}x{}",
                baseline.0, baseline.1, actual.0, actual.1
            ),
            DiffError::Image(e) => write!(f, "Image error: {}", e),
            DiffError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for DiffError {}

impl From<image::ImageError> for DiffError {
    fn from(e: image::ImageError) -> Self {
        DiffError::Image(e)
    }
}

impl From<std::io::Error> for DiffError {
    fn from(e: std::io::Error) -> Self {
        DiffError::Io(e)
    }
}

/// Outcome of comparing two same-sized images
#[derive(Debug, Clone, Copy)]
pub struct DiffOutcome {
    /// Number of pixels that differ beyond the channel threshold
    pub diff_pixels: u64,
    /// Total pixels compared
    pub total_pixels: u64,
    /// Percentage of differing pixels (0.0 - 100.0)
    pub diff_percent: f64,
}

impl DiffOutcome {
    /// Whether the difference is within the acceptable band
    pub fn passes(&self) -> bool {
        self.diff_percent < MAX_DIFF_PERCENT
    }

    /// Similarity confidence (100 minus the difference percentage)
    pub fn confidence(&self) -> f64 {
        100.0 - self.diff_percent
    }
}

/// Compare a screenshot against its baseline, pixel by pixel.
///
/// A pixel counts as different when any RGBA channel differs by more than
/// `PIXEL_CHANNEL_THRESHOLD` of full scale.
pub fn compare_images(baseline_path: &Path, actual_path: &Path) -> DiffResult<DiffOutcome> {
    let baseline = image::open(baseline_path)?;
    let actual = image::open(actual_path)?;

    if baseline.dimensions() != actual.dimensions() {
        return Err(DiffError::DimensionMismatch {
            baseline: baseline.dimensions(),
            actual: actual.dimensions(),
        });
    }

    let baseline = baseline.to_rgba8();
    let actual = actual.to_rgba8();

    let channel_threshold = (PIXEL_CHANNEL_THRESHOLD * 255.0) as i16;
    let mut diff_pixels: u64 = 0;

    for (a, b) in baseline.pixels().zip(actual.pixels()) {
        let differs = a
            .0
            .iter()
            .zip(b.0.iter())
            .any(|(&ca, &cb)| (ca as i16 - cb as i16).abs() > channel_threshold);
        if differs {
            diff_pixels += 1;
        }
    }

    let total_pixels = (baseline.width() as u64) * (baseline.height() as u64);
    let diff_percent = if total_pixels == 0 {
        0.0
    } else {
        (diff_pixels as f64 / total_pixels as f64) * 100.0
    };

    Ok(DiffOutcome {
        diff_pixels,
        total_pixels,
        diff_percent,
    })
}
