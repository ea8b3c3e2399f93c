//! Background removal for spectrogram frames using sigma-clipped statistics.

use ndarray::{Array2, ArrayView1, Axis};
use rayon::prelude::*;

use crate::error::{FrameError, Result};
use crate::frame::Frame;

pub const DEFAULT_CLIP_SIGMA: f64 = 3.0;
pub const DEFAULT_CLIP_MAXITERS: usize = 5;

/// Mean and population standard deviation of the values that survived
/// clipping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClippedStats {
    pub mean: f64,
    pub std: f64,
    pub kept: usize,
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Iteratively rejects values further than `sigma` standard deviations from
/// the median until nothing more is rejected or `maxiters` passes have run.
/// Non-finite inputs are ignored.
pub fn sigma_clipped_stats(values: &[f64], sigma: f64, maxiters: usize) -> Result<ClippedStats> {
    let mut kept: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if kept.is_empty() {
        return Err(FrameError::EmptySpectrum);
    }
    kept.sort_by(|a, b| a.total_cmp(b));

    for _ in 0..maxiters {
        let center = median(&kept);
        let (_, std) = mean_std(&kept);
        let limit = sigma * std;
        let before = kept.len();
        kept.retain(|v| (v - center).abs() <= limit);
        if kept.len() == before || kept.is_empty() {
            break;
        }
    }
    if kept.is_empty() {
        return Err(FrameError::EmptySpectrum);
    }

    let (mean, std) = mean_std(&kept);
    Ok(ClippedStats {
        mean,
        std,
        kept: kept.len(),
    })
}

fn row_stats(row: ArrayView1<'_, f64>) -> Result<ClippedStats> {
    match row.as_slice() {
        Some(slice) => sigma_clipped_stats(slice, DEFAULT_CLIP_SIGMA, DEFAULT_CLIP_MAXITERS),
        None => sigma_clipped_stats(&row.to_vec(), DEFAULT_CLIP_SIGMA, DEFAULT_CLIP_MAXITERS),
    }
}

/// Removes the noise background of every spectrum (time row).
///
/// Statistics come from the matching row of `as_data` when given, which lets
/// a wider or quieter region of the band define the background. With
/// `divide_std` each row is also scaled to unit clipped deviation; rows whose
/// clipped deviation is zero are only centred.
pub fn tnorm(frame: &Frame, divide_std: bool, as_data: Option<&Frame>) -> Result<Frame> {
    let source = as_data.unwrap_or(frame);
    if source.tchans() != frame.tchans() {
        return Err(FrameError::ShapeMismatch {
            left: frame.shape(),
            right: source.shape(),
        });
    }

    let stats: Vec<ClippedStats> = source
        .data()
        .axis_iter(Axis(0))
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(row_stats)
        .collect::<Result<Vec<_>>>()?;

    let mut data: Array2<f64> = frame.data().to_owned();
    for (mut row, row_stats) in data.axis_iter_mut(Axis(0)).zip(stats.iter()) {
        row -= row_stats.mean;
        if divide_std {
            if row_stats.std > 0.0 {
                row /= row_stats.std;
            } else {
                log::debug!("Skipping std division for a row with zero clipped deviation");
            }
        }
    }
    frame.with_data(data)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    use super::{sigma_clipped_stats, tnorm};
    use crate::error::FrameError;
    use crate::frame::Frame;

    #[test]
    fn clipping_rejects_single_outlier() {
        let mut values: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        values[10] = 1000.0;
        let stats = sigma_clipped_stats(&values, 3.0, 5).unwrap();
        assert_eq!(stats.kept, 99);
        assert!(stats.mean.abs() < 0.05);
        assert_abs_diff_eq!(stats.std, 1.0, epsilon = 0.01);
    }

    #[test]
    fn constant_values_are_kept() {
        let stats = sigma_clipped_stats(&[4.0; 8], 3.0, 5).unwrap();
        assert_eq!(stats.kept, 8);
        assert_eq!(stats.mean, 4.0);
        assert_eq!(stats.std, 0.0);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            sigma_clipped_stats(&[f64::NAN], 3.0, 5),
            Err(FrameError::EmptySpectrum)
        ));
    }

    #[test]
    fn tnorm_centres_each_row() {
        let data = array![[10.0, 12.0, 10.0, 12.0], [0.0, 2.0, 0.0, 2.0]];
        let frame = Frame::new(data, 1420.0, 1e-6, 1.0).unwrap();
        let normed = tnorm(&frame, false, None).unwrap();
        assert_eq!(normed.data(), &array![[-1.0, 1.0, -1.0, 1.0], [-1.0, 1.0, -1.0, 1.0]]);

        let scaled = tnorm(&frame, true, None).unwrap();
        assert_eq!(scaled.data(), normed.data());
    }

    #[test]
    fn tnorm_uses_alternate_statistics_frame() {
        let frame = Frame::new(Array2::from_elem((2, 3), 5.0), 1420.0, 1e-6, 1.0).unwrap();
        let quiet = Frame::new(Array2::from_elem((2, 6), 2.0), 1420.0, 1e-6, 1.0).unwrap();
        let normed = tnorm(&frame, true, Some(&quiet)).unwrap();
        assert!(normed.data().iter().all(|&v| v == 3.0));

        let wrong = Frame::new(Array2::from_elem((3, 3), 2.0), 1420.0, 1e-6, 1.0).unwrap();
        assert!(matches!(
            tnorm(&frame, false, Some(&wrong)),
            Err(FrameError::ShapeMismatch { .. })
        ));
    }
}
