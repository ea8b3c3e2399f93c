use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while computing bounds or preparing frames.
///
/// All of them are local to one call; the caller decides whether to skip the
/// offending file, retry with other parameters, or abort.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("{field} must be positive and finite, got {value}")]
    InvalidResolution { field: &'static str, value: f64 },

    #[error("{field} must be finite, got {value}")]
    NonFiniteParameter { field: &'static str, value: f64 },

    #[error("cannot decode MJD timestamp from file name {name:?}: {reason}")]
    MalformedTimestamp { name: String, reason: String },

    #[error("bound should be either 'threshold' or 'snr', got {0:?}")]
    UnrecognizedBoundMode(String),

    #[error("pointing index {index} is out of range for a cadence of {len} files")]
    PointingOutOfRange { index: usize, len: usize },

    #[error("cadence contains no files")]
    EmptyCadence,

    #[error("expected metadata for {expected} files, got {found}")]
    MetadataCountMismatch { expected: usize, found: usize },

    #[error("cadence order {order:?} does not match {frames} frames")]
    OrderMismatch { order: String, frames: usize },

    #[error("cadence order {0:?} must be a non-empty run of letters")]
    InvalidOrder(String),

    #[error("computed bounds are empty: f_start {f_start} MHz >= f_stop {f_stop} MHz")]
    DegenerateBounds { f_start: f64, f_stop: f64 },

    #[error("frame shapes differ: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("channel slice [{l}, {r}) is out of range for {fchans} channels")]
    SliceOutOfRange { l: usize, r: usize, fchans: usize },

    #[error("spectrum is empty")]
    EmptySpectrum,

    #[error("invalid filterbank header in {path}: {reason}")]
    InvalidHeader { path: PathBuf, reason: String },

    #[error("unsupported data format for {0}")]
    UnsupportedFormat(PathBuf),

    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Checks that a resolution value is strictly positive and finite.
pub(crate) fn ensure_positive(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(FrameError::InvalidResolution { field, value })
    }
}

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FrameError::NonFiniteParameter { field, value })
    }
}

pub(crate) fn ensure_nonzero(field: &'static str, value: usize) -> Result<usize> {
    if value == 0 {
        Err(FrameError::InvalidResolution {
            field,
            value: 0.0,
        })
    } else {
        Ok(value)
    }
}
