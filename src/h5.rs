//! HDF5 filterbank products (`.h5`), as written by the Breakthrough Listen
//! pipeline: a `data` dataset shaped `(tchans, nifs, nchans)` whose
//! attributes carry the SIGPROC header fields.

use std::path::Path;

use hdf5::{Dataset, File};
use ndarray::{s, Axis, Ix3};

use crate::bounds::FrequencyBounds;
use crate::error::{FrameError, Result};
use crate::filterbank::channel_window;
use crate::frame::Frame;
use crate::metadata::FrameMetadata;

const DATA: &str = "data";

/// Header fields of an HDF5 filterbank product.
#[derive(Debug, Clone, PartialEq)]
pub struct Hdf5Header {
    pub tchans: usize,
    pub nifs: usize,
    pub nchans: usize,
    /// Centre frequency of the first channel in MHz.
    pub fch1: f64,
    /// Signed channel spacing in MHz.
    pub foff: f64,
    /// Sample time in seconds.
    pub tsamp: f64,
    /// Start time in MJD, when recorded.
    pub tstart: Option<f64>,
}

impl Hdf5Header {
    pub fn frame_metadata(&self) -> Result<FrameMetadata> {
        FrameMetadata::new(self.tchans, self.foff.abs() * 1e6, self.tsamp)
    }
}

fn attr_f64(data: &Dataset, name: &str) -> Result<f64> {
    Ok(data.attr(name)?.read_scalar::<f64>()?)
}

fn header_of(path: &Path, data: &Dataset) -> Result<Hdf5Header> {
    let shape = data.shape();
    let &[tchans, nifs, nchans] = shape.as_slice() else {
        return Err(FrameError::InvalidHeader {
            path: path.to_path_buf(),
            reason: format!("expected a (tchans, nifs, nchans) dataset, got shape {shape:?}"),
        });
    };
    let header = Hdf5Header {
        tchans,
        nifs,
        nchans,
        fch1: attr_f64(data, "fch1")?,
        foff: attr_f64(data, "foff")?,
        tsamp: attr_f64(data, "tsamp")?,
        tstart: attr_f64(data, "tstart").ok(),
    };
    log::debug!(
        "{}: nchans={}, nifs={}, fch1={} MHz, foff={} MHz, tsamp={} s, tchans={}",
        path.display(),
        header.nchans,
        header.nifs,
        header.fch1,
        header.foff,
        header.tsamp,
        header.tchans
    );
    Ok(header)
}

/// Reads the header attributes of `path` without touching the data.
pub fn read_header(path: &Path) -> Result<Hdf5Header> {
    let file = File::open(path)?;
    let data = file.dataset(DATA)?;
    header_of(path, &data)
}

/// Loads every time step of the channels inside `bounds`. Only the selected
/// hyperslab is read from the file.
pub fn read_frame(path: &Path, bounds: &FrequencyBounds) -> Result<Frame> {
    let file = File::open(path)?;
    let data = file.dataset(DATA)?;
    let header = header_of(path, &data)?;
    if header.nifs != 1 {
        return Err(FrameError::InvalidHeader {
            path: path.to_path_buf(),
            reason: format!("only single-IF data can be framed (nifs={})", header.nifs),
        });
    }
    let (l, r) = channel_window(header.fch1, header.foff, header.nchans, bounds)?;

    let slab = data.read_slice::<f64, _, Ix3>(s![.., 0..1, l..r])?;
    let values = slab.index_axis_move(Axis(1), 0);

    let fch1 = header.fch1 + l as f64 * header.foff;
    let mut frame = Frame::new(values, fch1, header.foff, header.tsamp)?;
    if let Some(tstart) = header.tstart {
        frame.add_metadata("tstart", tstart);
    }
    log::info!(
        "Loaded {} x {} frame from {} (channels {l}..{r})",
        frame.tchans(),
        frame.fchans(),
        path.display()
    );
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    use super::{read_frame, read_header};
    use crate::bounds::FrequencyBounds;
    use crate::error::FrameError;
    use crate::filterbank::FilterbankHeaderSource;
    use crate::metadata::MetadataSource;

    // Sample (t, i, c) holds `t * 1000 + c`; channel c sits at
    // 1420 - c * 1e-6 MHz.
    fn write_h5(dir: &Path, name: &str, shape: (usize, usize, usize)) -> PathBuf {
        let path = dir.join(name);
        let file = hdf5::File::create(&path).unwrap();
        let values = Array3::from_shape_fn(shape, |(t, _, c)| (t * 1000 + c) as f32);
        let data = file
            .new_dataset_builder()
            .with_data(&values)
            .create("data")
            .unwrap();
        for (key, value) in [
            ("fch1", 1420.0),
            ("foff", -1e-6),
            ("tsamp", 18.25),
            ("tstart", 59000.5),
        ] {
            data.new_attr::<f64>()
                .shape(())
                .create(key)
                .unwrap()
                .write_scalar(&value)
                .unwrap();
        }
        path
    }

    fn channels_5_to_13() -> FrequencyBounds {
        FrequencyBounds {
            f_start: 1420.0 - 12.5e-6,
            f_stop: 1420.0 - 4.5e-6,
        }
    }

    #[test]
    fn header_gives_frame_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_h5(dir.path(), "spliced_blc_59000_0_x.h5", (16, 1, 64));
        let header = read_header(&path).unwrap();
        assert_eq!((header.tchans, header.nifs, header.nchans), (16, 1, 64));
        assert_eq!(header.tstart, Some(59000.5));

        let metadata = FilterbankHeaderSource.metadata(&path).unwrap();
        assert_eq!(metadata.tchans, 16);
        assert_abs_diff_eq!(metadata.df, 1.0, epsilon = 1e-9);
        assert_eq!(metadata.dt, 18.25);
    }

    #[test]
    fn frame_holds_channels_inside_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_h5(dir.path(), "a.h5", (4, 1, 32));
        let frame = crate::filterbank::read_frame(&path, &channels_5_to_13()).unwrap();
        assert_eq!(frame.shape(), (4, 8));
        assert_eq!(frame.data()[[0, 0]], 5.0);
        assert_eq!(frame.data()[[3, 7]], 3012.0);
        assert_abs_diff_eq!(frame.fch1(), 1420.0 - 5e-6, epsilon = 1e-12);
        assert_eq!(frame.metadata().get("tstart"), Some(&59000.5));
    }

    #[test]
    fn multi_if_products_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_h5(dir.path(), "iquv.h5", (4, 2, 32));
        assert!(matches!(
            read_frame(&path, &channels_5_to_13()),
            Err(FrameError::InvalidHeader { .. })
        ));
    }
}
