//! Frequency windows that keep a linearly drifting narrowband signal inside
//! an extracted frame.
//!
//! Frequencies are in MHz, channel widths in Hz and drift rates in Hz/s, so
//! every Hz quantity is divided by `1e6` before it meets a centre frequency.

use crate::error::{ensure_finite, ensure_nonzero, ensure_positive, FrameError, Result};
use crate::metadata::FrameMetadata;

const HZ_PER_MHZ: f64 = 1e6;

/// Desired window: centre frequency (MHz), drift rate (Hz/s), channel count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftRequest {
    pub center_freq: f64,
    pub drift_rate: f64,
    pub fchans: usize,
}

impl DriftRequest {
    pub fn new(center_freq: f64, drift_rate: f64, fchans: usize) -> Result<Self> {
        let request = Self {
            center_freq,
            drift_rate,
            fchans,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_nonzero("fchans", self.fchans)?;
        ensure_finite("center_freq", self.center_freq)?;
        ensure_finite("drift_rate", self.drift_rate)?;
        Ok(())
    }
}

/// Absolute frequency interval to extract, in MHz. Always `f_stop > f_start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyBounds {
    pub f_start: f64,
    pub f_stop: f64,
}

impl FrequencyBounds {
    fn checked(f_start: f64, f_stop: f64) -> Result<Self> {
        if f_stop > f_start {
            Ok(Self { f_start, f_stop })
        } else {
            Err(FrameError::DegenerateBounds { f_start, f_stop })
        }
    }

    pub fn width_mhz(&self) -> f64 {
        self.f_stop - self.f_start
    }

    pub fn center(&self) -> f64 {
        0.5 * (self.f_start + self.f_stop)
    }

    /// Window width expressed in channels of `df` Hz.
    pub fn width_channels(&self, df: f64) -> f64 {
        self.width_mhz() * HZ_PER_MHZ / df
    }
}

// Whole channels crossed by a signal drifting for `tchans` steps, signed like
// `tchans`. The fractional channel is dropped (truncation toward zero), so
// the window can be up to one channel short of the true excursion.
fn channel_excursion(drift_rate: f64, tchans: f64, df: f64, dt: f64) -> i64 {
    (drift_rate.abs() * tchans * dt / df).trunc() as i64
}

// Orders (pad for the backward span, pad for the forward span) into
// (low side, high side) according to the drift direction.
fn pad_by_sign(drift_rate: f64, backward: i64, forward: i64) -> (i64, i64) {
    if drift_rate >= 0.0 {
        (backward, forward)
    } else {
        (forward, backward)
    }
}

fn padded_window(
    center_freq: f64,
    fchans: usize,
    df: f64,
    pad_low: i64,
    pad_high: i64,
) -> Result<FrequencyBounds> {
    let half = fchans as f64 / 2.0;
    let f_start = center_freq - (half + pad_low as f64) * df / HZ_PER_MHZ;
    let f_stop = center_freq + (half + pad_high as f64) * df / HZ_PER_MHZ;
    FrequencyBounds::checked(f_start, f_stop)
}

/// Window for a single frame of `tchans` steps.
///
/// The centre moves to where the signal sits at the frame's temporal
/// midpoint and the window grows on the side the signal drifts toward by the
/// number of whole channels it crosses during the frame.
pub fn compute_single_frame_bounds(
    center_freq: f64,
    drift_rate: f64,
    fchans: usize,
    tchans: usize,
    df: f64,
    dt: f64,
) -> Result<FrequencyBounds> {
    ensure_nonzero("fchans", fchans)?;
    ensure_nonzero("tchans", tchans)?;
    ensure_positive("df", df)?;
    ensure_positive("dt", dt)?;

    let adj_center_freq = center_freq + drift_rate / HZ_PER_MHZ * tchans as f64 / 2.0;
    let max_offset = channel_excursion(drift_rate, tchans as f64, df, dt);
    let (pad_low, pad_high) = pad_by_sign(drift_rate, 0, max_offset);
    padded_window(adj_center_freq, fchans, df, pad_low, pad_high)
}

/// [`compute_single_frame_bounds`] with typed request and metadata.
pub fn centered_frame_bounds(
    request: &DriftRequest,
    metadata: &FrameMetadata,
) -> Result<FrequencyBounds> {
    request.validate()?;
    metadata.validate()?;
    compute_single_frame_bounds(
        request.center_freq,
        request.drift_rate,
        request.fchans,
        metadata.tchans,
        metadata.df,
        metadata.dt,
    )
}

/// Window shared by every file of a cadence.
///
/// `tchans1` is the signed number of time steps from the reference file's
/// start back to the first file's start (zero or negative), `tchans2` the
/// number of steps forward to the last file's end. The centre is not moved;
/// the drift is absorbed entirely by the two channel offsets.
pub fn compute_offset_bounds(
    center_freq: f64,
    drift_rate: f64,
    fchans: usize,
    tchans1: f64,
    tchans2: f64,
    df: f64,
    dt: f64,
) -> Result<FrequencyBounds> {
    ensure_nonzero("fchans", fchans)?;
    ensure_positive("df", df)?;
    ensure_positive("dt", dt)?;

    let offset1 = -channel_excursion(drift_rate, tchans1, df, dt);
    let offset2 = channel_excursion(drift_rate, tchans2, df, dt);
    log::debug!(
        "Cadence offsets: tchans1={tchans1}, tchans2={tchans2} -> offset1={offset1}, offset2={offset2} channels"
    );
    let (pad_low, pad_high) = pad_by_sign(drift_rate, offset1, offset2);
    padded_window(center_freq, fchans, df, pad_low, pad_high)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::{
        centered_frame_bounds, compute_offset_bounds, compute_single_frame_bounds, DriftRequest,
    };
    use crate::error::FrameError;
    use crate::metadata::FrameMetadata;

    const DF: f64 = 2.7939677238464355;

    #[test]
    fn zero_drift_is_symmetric_around_center() {
        let bounds = compute_single_frame_bounds(1420.0, 0.0, 1024, 16, DF, 1.0).unwrap();
        assert_abs_diff_eq!(bounds.f_start, 1420.0 - 512.0 * DF / 1e6, epsilon = 1e-9);
        assert_abs_diff_eq!(bounds.f_stop, 1420.0 + 512.0 * DF / 1e6, epsilon = 1e-9);
        assert_abs_diff_eq!(bounds.center(), 1420.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_drift_width_ignores_time_resolution() {
        for &(tchans, dt) in &[(1usize, 0.5), (16, 18.253611008), (279, 1.07)] {
            let bounds = compute_single_frame_bounds(8000.0, 0.0, 256, tchans, DF, dt).unwrap();
            assert_abs_diff_eq!(bounds.width_mhz(), 256.0 * DF / 1e6, epsilon = 1e-9);
        }
    }

    #[test]
    fn positive_drift_pads_high_side_only() {
        // 2 Hz/s over 16 x 10 s is 320 Hz, i.e. 114 whole channels of DF.
        let bounds = compute_single_frame_bounds(1420.0, 2.0, 64, 16, DF, 10.0).unwrap();
        let adj_center = 1420.0 + 2.0 / 1e6 * 16.0 / 2.0;
        assert_abs_diff_eq!(bounds.f_start, adj_center - 32.0 * DF / 1e6, epsilon = 1e-9);
        assert_abs_diff_eq!(
            bounds.f_stop,
            adj_center + (32.0 + 114.0) * DF / 1e6,
            epsilon = 1e-9
        );
    }

    #[test]
    fn window_never_narrower_than_requested_channels() {
        for &rate in &[-4.5, -0.3, 0.0, 0.01, 0.7, 3.2] {
            let bounds = compute_single_frame_bounds(1500.0, rate, 512, 16, DF, 18.25).unwrap();
            assert!(bounds.width_mhz() >= 512.0 * DF / 1e6 - 1e-12);
            assert!(bounds.f_stop > bounds.f_start);
        }
    }

    #[test]
    fn opposite_drifts_mirror_around_adjusted_center() {
        let up = compute_single_frame_bounds(1420.0, 1.5, 128, 16, DF, 18.25).unwrap();
        let down = compute_single_frame_bounds(1420.0, -1.5, 128, 16, DF, 18.25).unwrap();
        let up_center = 1420.0 + 1.5 / 1e6 * 8.0;
        let down_center = 1420.0 - 1.5 / 1e6 * 8.0;

        assert_abs_diff_eq!(up.width_mhz(), down.width_mhz(), epsilon = 1e-9);
        assert_abs_diff_eq!(
            up.f_stop - up_center,
            down_center - down.f_start,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            up_center - up.f_start,
            down.f_stop - down_center,
            epsilon = 1e-9
        );
    }

    #[test]
    fn excursion_truncates_partial_channels() {
        // 0.9 channel of drift over the frame rounds down to no padding.
        let dt = 0.9 * DF / 16.0;
        let bounds = compute_single_frame_bounds(1420.0, 1.0, 32, 16, DF, dt).unwrap();
        let adj_center = 1420.0 + 1.0 / 1e6 * 8.0;
        assert_abs_diff_eq!(bounds.f_stop, adj_center + 16.0 * DF / 1e6, epsilon = 1e-12);
    }

    #[test]
    fn rejects_non_positive_resolution() {
        assert!(matches!(
            compute_single_frame_bounds(1420.0, 0.0, 1024, 16, 0.0, 1.0),
            Err(FrameError::InvalidResolution { field: "df", .. })
        ));
        assert!(matches!(
            compute_single_frame_bounds(1420.0, 0.0, 1024, 16, DF, -1.0),
            Err(FrameError::InvalidResolution { field: "dt", .. })
        ));
        assert!(matches!(
            compute_single_frame_bounds(1420.0, 0.0, 0, 16, DF, 1.0),
            Err(FrameError::InvalidResolution { field: "fchans", .. })
        ));
        assert!(matches!(
            compute_single_frame_bounds(1420.0, 0.0, 1024, 0, DF, 1.0),
            Err(FrameError::InvalidResolution { field: "tchans", .. })
        ));
    }

    #[test]
    fn request_rejects_non_finite_values() {
        assert!(matches!(
            DriftRequest::new(1420.0, f64::NAN, 256),
            Err(FrameError::NonFiniteParameter { field: "drift_rate", .. })
        ));
        let err = DriftRequest::new(f64::INFINITY, 0.5, 256).unwrap_err();
        assert!(matches!(err, FrameError::NonFiniteParameter { field: "center_freq", .. }));
        assert_eq!(err.to_string(), "center_freq must be finite, got inf");
        // Negative drift rates are valid.
        assert!(DriftRequest::new(1420.0, -3.0, 256).is_ok());
    }

    #[test]
    fn typed_entry_point_matches_positional_one() {
        let request = DriftRequest::new(1420.0, -0.75, 256).unwrap();
        let metadata = FrameMetadata::new(16, DF, 18.25).unwrap();
        let typed = centered_frame_bounds(&request, &metadata).unwrap();
        let positional = compute_single_frame_bounds(1420.0, -0.75, 256, 16, DF, 18.25).unwrap();
        assert_eq!(typed, positional);
    }

    #[test]
    fn offsets_with_reference_first_do_not_widen_low_side() {
        let bounds = compute_offset_bounds(1420.0, 1.0, 64, 0.0, 32.0, DF, 10.0).unwrap();
        // Low side stays at exactly half the requested channels.
        assert_abs_diff_eq!(bounds.f_start, 1420.0 - 32.0 * DF / 1e6, epsilon = 1e-12);
        let offset2 = (1.0f64 * 32.0 * 10.0 / DF).trunc();
        assert_abs_diff_eq!(
            bounds.f_stop,
            1420.0 + (32.0 + offset2) * DF / 1e6,
            epsilon = 1e-12
        );
    }

    #[test]
    fn offsets_with_reference_in_middle_pad_both_sides() {
        // Reference file starts 16 steps after the first file.
        let up = compute_offset_bounds(1420.0, 1.0, 64, -16.0, 32.0, DF, 10.0).unwrap();
        let offset1 = (16.0 * 10.0 / DF).trunc();
        let offset2 = (32.0 * 10.0 / DF).trunc();
        assert_abs_diff_eq!(up.f_start, 1420.0 - (32.0 + offset1) * DF / 1e6, epsilon = 1e-12);
        assert_abs_diff_eq!(up.f_stop, 1420.0 + (32.0 + offset2) * DF / 1e6, epsilon = 1e-12);

        let down = compute_offset_bounds(1420.0, -1.0, 64, -16.0, 32.0, DF, 10.0).unwrap();
        assert_abs_diff_eq!(down.f_start, 1420.0 - (32.0 + offset2) * DF / 1e6, epsilon = 1e-12);
        assert_abs_diff_eq!(down.f_stop, 1420.0 + (32.0 + offset1) * DF / 1e6, epsilon = 1e-12);
    }

    #[test]
    fn offsets_reject_inverted_window() {
        // A forward span far behind the reference collapses the window.
        let result = compute_offset_bounds(1420.0, 1.0, 4, 0.0, -100.0, DF, 10.0);
        assert!(matches!(result, Err(FrameError::DegenerateBounds { .. })));
    }
}
