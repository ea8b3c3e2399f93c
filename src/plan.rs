//! Centred frame and cadence plans: which file to read, over which frequency
//! window, and what to tag each resulting frame with.

use std::path::{Path, PathBuf};

use crate::bounds::{centered_frame_bounds, DriftRequest, FrequencyBounds};
use crate::cadence::{compute_cadence_bounds, CadenceMetadata, CadenceOrder, CadenceTiming};
use crate::error::{FrameError, Result};
use crate::extract::{extract_ts, BoundMode, TimeSeries};
use crate::filterbank::read_frame;
use crate::frame::Frame;
use crate::metadata::{FrameMetadata, MetadataOverrides, MetadataSource};

/// One file to be framed with the shared window.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFrame {
    pub path: PathBuf,
    pub label: Option<char>,
    pub start_unix: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub request: DriftRequest,
    pub metadata: FrameMetadata,
    pub bounds: FrequencyBounds,
    pub frame: PlannedFrame,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CadencePlan {
    pub request: DriftRequest,
    pub metadata: FrameMetadata,
    pub timing: CadenceTiming,
    pub order: CadenceOrder,
    pub bounds: FrequencyBounds,
    pub frames: Vec<PlannedFrame>,
}

impl CadencePlan {
    /// Planned frames carrying `label`, in cadence order.
    pub fn frames_labelled(&self, label: char) -> impl Iterator<Item = &PlannedFrame> {
        self.frames.iter().filter(move |f| f.label == Some(label))
    }
}

fn resolve_metadata<S: MetadataSource + ?Sized>(
    path: &Path,
    overrides: &MetadataOverrides,
    source: &S,
) -> Result<FrameMetadata> {
    overrides.resolve(|| source.metadata(path))
}

/// Plans a single frame centred on a drifting signal in `path`.
pub fn centered_frame<S: MetadataSource + ?Sized>(
    path: &Path,
    request: &DriftRequest,
    overrides: &MetadataOverrides,
    source: &S,
) -> Result<FramePlan> {
    let metadata = resolve_metadata(path, overrides, source)?;
    let bounds = centered_frame_bounds(request, &metadata)?;
    Ok(FramePlan {
        request: *request,
        metadata,
        bounds,
        frame: PlannedFrame {
            path: path.to_path_buf(),
            label: None,
            start_unix: None,
        },
    })
}

/// Plans every frame of a cadence with one window that follows the signal
/// across the whole observation, relative to the file at `pointing`.
pub fn centered_cadence<S: MetadataSource + ?Sized>(
    paths: &[PathBuf],
    pointing: usize,
    request: &DriftRequest,
    overrides: &MetadataOverrides,
    source: &S,
    order: &CadenceOrder,
) -> Result<CadencePlan> {
    let first = paths.first().ok_or(FrameError::EmptyCadence)?;
    order.check_frames(paths.len())?;
    let timing = CadenceTiming::from_paths(paths, pointing)?;
    let metadata = resolve_metadata(first, overrides, source)?;
    let bounds = compute_cadence_bounds(&CadenceMetadata::Shared(metadata), &timing, request)?;

    let frames = paths
        .iter()
        .zip(order.labels())
        .zip(timing.start_times())
        .map(|((path, &label), &start)| PlannedFrame {
            path: path.clone(),
            label: Some(label),
            start_unix: Some(start),
        })
        .collect();

    Ok(CadencePlan {
        request: *request,
        metadata,
        timing,
        order: order.clone(),
        bounds,
        frames,
    })
}

/// Reads a planned frame and tags it with the request it was centred on.
pub fn load_frame(
    planned: &PlannedFrame,
    bounds: &FrequencyBounds,
    request: &DriftRequest,
) -> Result<Frame> {
    let mut frame = read_frame(&planned.path, bounds)?;
    frame.add_metadata("drift_rate", request.drift_rate);
    frame.add_metadata("center_freq", request.center_freq);
    Ok(frame)
}

/// Loads a planned frame and extracts its normalised time series.
pub fn extract_planned(
    planned: &PlannedFrame,
    bounds: &FrequencyBounds,
    request: &DriftRequest,
    mode: BoundMode,
) -> Result<TimeSeries> {
    let frame = load_frame(planned, bounds, request)?;
    extract_ts(&frame, mode, true, None)
}
