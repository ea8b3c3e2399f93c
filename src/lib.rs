//! Frequency windows for centring linearly drifting narrowband signals inside
//! spectrogram frames and multi-file cadences, plus the frame handling that
//! surrounds them (filterbank header lookup, background normalisation and
//! time-series extraction).

pub mod bounds;
pub mod cadence;
pub mod error;
pub mod extract;
pub mod filterbank;
pub mod frame;
#[cfg(feature = "hdf5")]
pub mod h5;
pub mod metadata;
pub mod normalize;
pub mod plan;

pub use bounds::{
    centered_frame_bounds, compute_offset_bounds, compute_single_frame_bounds, DriftRequest,
    FrequencyBounds,
};
pub use cadence::{
    compute_cadence_bounds, mjd_to_unix, parse_unix_time, CadenceMetadata, CadenceOrder,
    CadenceTiming,
};
pub use error::{FrameError, Result};
pub use extract::{extract_ts, BoundMode};
pub use filterbank::FilterbankHeaderSource;
pub use frame::Frame;
pub use metadata::{FrameMetadata, MetadataOverrides, MetadataSource};
pub use normalize::tnorm;
