//! Multi-file cadences: start times decoded from file names, the signed time
//! span around the reference pointing, and the shared frequency window.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::bounds::{compute_offset_bounds, DriftRequest, FrequencyBounds};
use crate::error::{FrameError, Result};
use crate::metadata::FrameMetadata;

/// The Unix epoch (1970-01-01) expressed in MJD.
pub const UNIX_EPOCH_MJD: i64 = 40587;
pub const SECONDS_PER_DAY: i64 = 86400;
pub const DEFAULT_ORDER: &str = "ABAB";

pub fn mjd_to_unix(mjd: i64, seconds_of_day: i64) -> i64 {
    (mjd - UNIX_EPOCH_MJD) * SECONDS_PER_DAY + seconds_of_day
}

/// Decodes the start time of an observation from its file name.
///
/// Names look like `blc00_guppi_59000_43200_HIP1234_0011.gpuspec.0000.fil`:
/// the stem before the first `.` is split on `_` and fields 2 and 3 hold the
/// MJD day and the seconds of that day.
pub fn parse_unix_time(path: &Path) -> Result<i64> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FrameError::MalformedTimestamp {
            name: path.display().to_string(),
            reason: "file name is not valid UTF-8".to_string(),
        })?;
    let malformed = |reason: String| FrameError::MalformedTimestamp {
        name: name.to_string(),
        reason,
    };

    let stem = name.split('.').next().unwrap_or("");
    let fields: Vec<&str> = stem.split('_').collect();
    if fields.len() < 4 {
        return Err(malformed(format!(
            "expected at least 4 '_'-separated fields, found {}",
            fields.len()
        )));
    }
    let mjd = fields[2]
        .parse::<i64>()
        .map_err(|e| malformed(format!("MJD field {:?}: {e}", fields[2])))?;
    let seconds = fields[3]
        .parse::<i64>()
        .map_err(|e| malformed(format!("seconds field {:?}: {e}", fields[3])))?;
    Ok(mjd_to_unix(mjd, seconds))
}

/// Start times of every file of a cadence plus the reference file index.
#[derive(Debug, Clone, PartialEq)]
pub struct CadenceTiming {
    start_times: Vec<i64>,
    pointing: usize,
}

impl CadenceTiming {
    pub fn new(start_times: Vec<i64>, pointing: usize) -> Result<Self> {
        if start_times.is_empty() {
            return Err(FrameError::EmptyCadence);
        }
        if pointing >= start_times.len() {
            return Err(FrameError::PointingOutOfRange {
                index: pointing,
                len: start_times.len(),
            });
        }
        Ok(Self {
            start_times,
            pointing,
        })
    }

    pub fn from_paths<P: AsRef<Path>>(paths: &[P], pointing: usize) -> Result<Self> {
        let start_times = paths
            .iter()
            .map(|p| parse_unix_time(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(start_times, pointing)
    }

    pub fn start_times(&self) -> &[i64] {
        &self.start_times
    }

    pub fn pointing(&self) -> usize {
        self.pointing
    }

    pub fn len(&self) -> usize {
        self.start_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.start_times.is_empty()
    }

    /// Signed time-step counts from the reference file's start back to the
    /// first file's start and forward to the end of the last file (which
    /// lasts `last_tchans` steps of `dt` seconds).
    pub fn time_offsets(&self, last_tchans: usize, dt: f64) -> (f64, f64) {
        let reference = self.start_times[self.pointing] as f64;
        let first = self.start_times[0] as f64;
        let last = self.start_times[self.start_times.len() - 1] as f64;
        let tchans1 = (first - reference) / dt;
        let tchans2 = (last + last_tchans as f64 * dt - reference) / dt;
        (tchans1, tchans2)
    }
}

/// Resolution of the files in a cadence.
#[derive(Debug, Clone, PartialEq)]
pub enum CadenceMetadata {
    /// One resolution applies to every file.
    Shared(FrameMetadata),
    /// One entry per file, in cadence order.
    PerFile(Vec<FrameMetadata>),
}

impl CadenceMetadata {
    // (reference df/dt source, tchans of the final file)
    fn resolve(&self, timing: &CadenceTiming) -> Result<(FrameMetadata, usize)> {
        match self {
            CadenceMetadata::Shared(metadata) => {
                metadata.validate()?;
                Ok((*metadata, metadata.tchans))
            }
            CadenceMetadata::PerFile(per_file) => {
                if per_file.len() != timing.len() {
                    return Err(FrameError::MetadataCountMismatch {
                        expected: timing.len(),
                        found: per_file.len(),
                    });
                }
                for metadata in per_file {
                    metadata.validate()?;
                }
                let reference = per_file[timing.pointing()];
                let last = per_file[per_file.len() - 1];
                Ok((reference, last.tchans))
            }
        }
    }
}

/// Frequency window that keeps the drifting signal inside every file of the
/// cadence, relative to the reference pointing.
pub fn compute_cadence_bounds(
    metadata: &CadenceMetadata,
    timing: &CadenceTiming,
    request: &DriftRequest,
) -> Result<FrequencyBounds> {
    request.validate()?;
    let (reference, last_tchans) = metadata.resolve(timing)?;
    let (tchans1, tchans2) = timing.time_offsets(last_tchans, reference.dt);
    compute_offset_bounds(
        request.center_freq,
        request.drift_rate,
        request.fchans,
        tchans1,
        tchans2,
        reference.df,
        reference.dt,
    )
}

/// Labels of the files in a cadence, e.g. `ABAB` or `ABACAD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CadenceOrder(Vec<char>);

impl CadenceOrder {
    pub fn labels(&self) -> &[char] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn check_frames(&self, frames: usize) -> Result<()> {
        if self.0.len() != frames {
            return Err(FrameError::OrderMismatch {
                order: self.to_string(),
                frames,
            });
        }
        Ok(())
    }

    /// Indices of the files carrying `label`.
    pub fn indices_of(&self, label: char) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == label)
            .map(|(idx, _)| idx)
            .collect()
    }
}

impl Default for CadenceOrder {
    fn default() -> Self {
        Self(DEFAULT_ORDER.chars().collect())
    }
}

impl FromStr for CadenceOrder {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        let labels: Vec<char> = s.trim().chars().collect();
        if labels.is_empty() || labels.iter().any(|c| !c.is_ascii_alphabetic()) {
            return Err(FrameError::InvalidOrder(s.to_string()));
        }
        Ok(Self(labels.iter().map(|c| c.to_ascii_uppercase()).collect()))
    }
}

impl fmt::Display for CadenceOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.0 {
            write!(f, "{label}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use approx::assert_abs_diff_eq;

    use super::{
        compute_cadence_bounds, mjd_to_unix, parse_unix_time, CadenceMetadata, CadenceOrder,
        CadenceTiming,
    };
    use crate::bounds::DriftRequest;
    use crate::error::FrameError;
    use crate::metadata::FrameMetadata;

    const DF: f64 = 2.7939677238464355;

    #[test]
    fn one_day_past_epoch() {
        assert_eq!(mjd_to_unix(40588, 0), 86400);
        assert_eq!(mjd_to_unix(40587, 0), 0);
    }

    #[test]
    fn parses_guppi_style_names() {
        let t = parse_unix_time(Path::new(
            "/data/blc00_guppi_59000_43200_HIP1234_0011.gpuspec.0000.fil",
        ))
        .unwrap();
        assert_eq!(t, (59000 - 40587) * 86400 + 43200);

        let t = parse_unix_time(Path::new("spliced_blc_40588_00000_x.h5")).unwrap();
        assert_eq!(t, 86400);
    }

    #[test]
    fn rejects_malformed_names() {
        for name in ["short_name.fil", "blc00_guppi_day_43200_x.fil", "a_b_59000_noon_c.fil"] {
            assert!(
                matches!(
                    parse_unix_time(Path::new(name)),
                    Err(FrameError::MalformedTimestamp { .. })
                ),
                "{name} should not parse"
            );
        }
    }

    #[test]
    fn timing_validates_pointing() {
        assert!(matches!(
            CadenceTiming::new(vec![], 0),
            Err(FrameError::EmptyCadence)
        ));
        assert!(matches!(
            CadenceTiming::new(vec![0, 300], 2),
            Err(FrameError::PointingOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn time_offsets_relative_to_pointing() {
        let timing = CadenceTiming::new(vec![1000, 1300, 1600], 1).unwrap();
        let (tchans1, tchans2) = timing.time_offsets(16, 10.0);
        assert_abs_diff_eq!(tchans1, -30.0, epsilon = 1e-12);
        assert_abs_diff_eq!(tchans2, 46.0, epsilon = 1e-12);
    }

    #[test]
    fn reference_first_has_no_backward_offset() {
        let timing = CadenceTiming::new(vec![1000, 1300], 0).unwrap();
        let metadata = CadenceMetadata::Shared(FrameMetadata::new(16, DF, 10.0).unwrap());
        let request = DriftRequest::new(1420.0, 0.5, 64).unwrap();
        let bounds = compute_cadence_bounds(&metadata, &timing, &request).unwrap();

        let (tchans1, tchans2) = timing.time_offsets(16, 10.0);
        assert_eq!(tchans1, 0.0);
        let offset2 = (0.5 * tchans2 * 10.0 / DF).trunc();
        assert_abs_diff_eq!(bounds.f_start, 1420.0 - 32.0 * DF / 1e6, epsilon = 1e-12);
        assert_abs_diff_eq!(
            bounds.f_stop,
            1420.0 + (32.0 + offset2) * DF / 1e6,
            epsilon = 1e-12
        );
    }

    #[test]
    fn per_file_metadata_uses_last_file_duration() {
        let timing = CadenceTiming::new(vec![0, 100], 0).unwrap();
        let request = DriftRequest::new(1420.0, 0.1, 32).unwrap();
        let short = FrameMetadata::new(10, 1.0, 1.0).unwrap();
        let long = FrameMetadata::new(50, 1.0, 1.0).unwrap();

        let per_file = CadenceMetadata::PerFile(vec![short, long]);
        let bounds = compute_cadence_bounds(&per_file, &timing, &request).unwrap();
        // 0.1 Hz/s over 150 s is 15 channels of 1 Hz.
        assert_abs_diff_eq!(bounds.f_stop, 1420.0 + (16.0 + 15.0) / 1e6, epsilon = 1e-12);

        let mismatched = CadenceMetadata::PerFile(vec![short]);
        assert!(matches!(
            compute_cadence_bounds(&mismatched, &timing, &request),
            Err(FrameError::MetadataCountMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn cadence_order_parsing() {
        let order: CadenceOrder = "abac".parse().unwrap();
        assert_eq!(order.to_string(), "ABAC");
        assert_eq!(order.indices_of('A'), vec![0, 2]);
        assert!(order.check_frames(4).is_ok());
        assert!(matches!(
            order.check_frames(6),
            Err(FrameError::OrderMismatch { frames: 6, .. })
        ));
        assert!(matches!(
            "AB1".parse::<CadenceOrder>(),
            Err(FrameError::InvalidOrder(order)) if order == "AB1"
        ));
        assert!(matches!("  ".parse::<CadenceOrder>(), Err(FrameError::InvalidOrder(_))));
        assert_eq!(CadenceOrder::default().to_string(), "ABAB");
    }
}
