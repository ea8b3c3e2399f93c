use std::collections::BTreeMap;

use ndarray::{s, Array1, Array2, Axis};

use crate::error::{ensure_positive, FrameError, Result};

/// Axis along which a frame is averaged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegrationAxis {
    /// Average over time steps, giving a spectrum of `fchans` values.
    Time,
    /// Average over channels, giving a time series of `tchans` values.
    Frequency,
}

/// Time-frequency intensity matrix (`tchans` rows by `fchans` columns).
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Array2<f64>,
    /// Centre frequency of column 0 in MHz.
    fch1: f64,
    /// Signed channel spacing in MHz (negative for descending bands).
    foff: f64,
    /// Time step in seconds.
    dt: f64,
    metadata: BTreeMap<String, f64>,
}

impl Frame {
    pub fn new(data: Array2<f64>, fch1: f64, foff: f64, dt: f64) -> Result<Self> {
        ensure_positive("foff", foff.abs())?;
        ensure_positive("dt", dt)?;
        Ok(Self {
            data,
            fch1,
            foff,
            dt,
            metadata: BTreeMap::new(),
        })
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn tchans(&self) -> usize {
        self.data.nrows()
    }

    pub fn fchans(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn fch1(&self) -> f64 {
        self.fch1
    }

    pub fn foff(&self) -> f64 {
        self.foff
    }

    /// Channel width in Hz.
    pub fn df(&self) -> f64 {
        self.foff.abs() * 1e6
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn freq_at(&self, channel: usize) -> f64 {
        self.fch1 + channel as f64 * self.foff
    }

    /// Copy of this frame with `data` replaced; shapes must agree.
    pub fn with_data(&self, data: Array2<f64>) -> Result<Self> {
        if data.dim() != self.data.dim() {
            return Err(FrameError::ShapeMismatch {
                left: self.data.dim(),
                right: data.dim(),
            });
        }
        Ok(Self {
            data,
            ..self.clone()
        })
    }

    /// Channels `l..r` of every time step.
    pub fn get_slice(&self, l: usize, r: usize) -> Result<Self> {
        if l >= r || r > self.fchans() {
            return Err(FrameError::SliceOutOfRange {
                l,
                r,
                fchans: self.fchans(),
            });
        }
        Ok(Self {
            data: self.data.slice(s![.., l..r]).to_owned(),
            fch1: self.freq_at(l),
            foff: self.foff,
            dt: self.dt,
            metadata: self.metadata.clone(),
        })
    }

    pub fn integrate(&self, axis: IntegrationAxis) -> Result<Array1<f64>> {
        let axis = match axis {
            IntegrationAxis::Time => Axis(0),
            IntegrationAxis::Frequency => Axis(1),
        };
        self.data.mean_axis(axis).ok_or(FrameError::EmptySpectrum)
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: f64) {
        self.metadata.insert(key.into(), value);
    }

    pub fn metadata(&self) -> &BTreeMap<String, f64> {
        &self.metadata
    }
}
