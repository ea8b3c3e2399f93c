//! Signal bounds within a centred frame and the intensity time series
//! integrated over them.

use std::fmt;
use std::str::FromStr;

use crate::error::{FrameError, Result};
use crate::frame::{Frame, IntegrationAxis};
use crate::normalize::{sigma_clipped_stats, tnorm, DEFAULT_CLIP_MAXITERS, DEFAULT_CLIP_SIGMA};

pub const DEFAULT_HALF_WIDTH: f64 = 3.0;
pub const DEFAULT_SNR: f64 = 5.0;

/// Strategy used to choose signal channel bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundMode {
    Threshold,
    Snr,
}

impl FromStr for BoundMode {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "threshold" => Ok(BoundMode::Threshold),
            "snr" => Ok(BoundMode::Snr),
            _ => Err(FrameError::UnrecognizedBoundMode(s.to_string())),
        }
    }
}

impl fmt::Display for BoundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundMode::Threshold => write!(f, "threshold"),
            BoundMode::Snr => write!(f, "snr"),
        }
    }
}

/// Half-open channel range `l..r`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelBounds {
    pub l: usize,
    pub r: usize,
}

impl ChannelBounds {
    pub fn width(&self) -> usize {
        self.r - self.l
    }
}

// Baseline-subtracted spectrum, its peak index and the clipped noise std.
fn baseline_subtract(spec: &[f64]) -> Result<(Vec<f64>, usize, f64)> {
    if spec.is_empty() {
        return Err(FrameError::EmptySpectrum);
    }
    let stats = sigma_clipped_stats(spec, DEFAULT_CLIP_SIGMA, DEFAULT_CLIP_MAXITERS)?;
    let adjusted: Vec<f64> = spec.iter().map(|v| v - stats.mean).collect();
    let peak = adjusted
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(idx, _)| idx)
        .ok_or(FrameError::EmptySpectrum)?;
    Ok((adjusted, peak, stats.std))
}

// Grows outward from `peak` while neighbours stay above `threshold`.
fn grow_from_peak(adjusted: &[f64], peak: usize, threshold: f64) -> ChannelBounds {
    let mut l = peak;
    while l > 0 && adjusted[l - 1] > threshold {
        l -= 1;
    }
    let mut r = peak + 1;
    while r < adjusted.len() && adjusted[r] > threshold {
        r += 1;
    }
    ChannelBounds { l, r }
}

/// Bounds where the baseline-subtracted intensity falls below the level an
/// ideal Gaussian profile reaches `half_width` standard deviations from its
/// peak.
pub fn threshold_baseline_bounds(spec: &[f64], half_width: f64) -> Result<ChannelBounds> {
    let (adjusted, peak, _) = baseline_subtract(spec)?;
    let peak_value = adjusted[peak];
    if peak_value <= 0.0 {
        return Ok(ChannelBounds { l: peak, r: peak + 1 });
    }
    let threshold = peak_value * (-half_width * half_width / 2.0).exp();
    Ok(grow_from_peak(&adjusted, peak, threshold))
}

/// Bounds where the baseline-subtracted intensity drops below `snr` times
/// the clipped noise deviation.
pub fn snr_bounds(spec: &[f64], snr: f64) -> Result<ChannelBounds> {
    let (adjusted, peak, std) = baseline_subtract(spec)?;
    Ok(grow_from_peak(&adjusted, peak, snr * std))
}

pub fn bounds_for(spec: &[f64], mode: BoundMode) -> Result<ChannelBounds> {
    match mode {
        BoundMode::Threshold => threshold_baseline_bounds(spec, DEFAULT_HALF_WIDTH),
        BoundMode::Snr => snr_bounds(spec, DEFAULT_SNR),
    }
}

/// Normalised intensity over time inside the signal bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    pub values: Vec<f64>,
    pub dt: f64,
    pub bounds: ChannelBounds,
}

/// Extracts the time series of a dedrifted frame whose signal sits near the
/// centre: find channel bounds on the time-averaged spectrum, remove the
/// background, then average the bounded channels and scale to unit mean.
pub fn extract_ts(
    frame: &Frame,
    mode: BoundMode,
    divide_std: bool,
    as_data: Option<&Frame>,
) -> Result<TimeSeries> {
    let spec = frame.integrate(IntegrationAxis::Time)?.to_vec();
    let bounds = bounds_for(&spec, mode)?;
    log::debug!(
        "{mode} bounds: channels {}..{} of {}",
        bounds.l,
        bounds.r,
        frame.fchans()
    );

    let normed = tnorm(frame, divide_std, as_data)?;
    let sliced = normed.get_slice(bounds.l, bounds.r)?;
    let mut values = sliced.integrate(IntegrationAxis::Frequency)?.to_vec();

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean.is_finite() && mean != 0.0 {
        for v in values.iter_mut() {
            *v /= mean;
        }
    } else {
        log::warn!("Time series mean is {mean}; leaving it unscaled");
    }

    Ok(TimeSeries {
        values,
        dt: frame.dt(),
        bounds,
    })
}
