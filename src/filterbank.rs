//! Filterbank access: header-only resolution lookup and extraction of the
//! channels inside a frequency window. SIGPROC `.fil` files are read here;
//! HDF5 `.h5` products go through [`crate::h5`] when the `hdf5` feature is on.
//!
//! The header is a sequence of little-endian, length-prefixed keyword strings
//! between `HEADER_START` and `HEADER_END`, each followed by its value.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use ndarray::Array2;

use crate::bounds::FrequencyBounds;
use crate::error::{FrameError, Result};
use crate::frame::Frame;
use crate::metadata::{FrameMetadata, MetadataSource};

const HEADER_START: &str = "HEADER_START";
const HEADER_END: &str = "HEADER_END";
const MAX_KEYWORD_LEN: usize = 80;
const MAX_STRING_LEN: usize = 1024;

enum ValueKind {
    Int,
    Double,
    Text,
}

fn keyword_kind(keyword: &str) -> Option<ValueKind> {
    match keyword {
        "telescope_id" | "machine_id" | "data_type" | "barycentric" | "pulsarcentric"
        | "nbits" | "nsamples" | "nchans" | "nifs" | "nbeams" | "ibeam" => Some(ValueKind::Int),
        "az_start" | "za_start" | "src_raj" | "src_dej" | "tstart" | "tsamp" | "fch1"
        | "foff" | "refdm" | "period" => Some(ValueKind::Double),
        "source_name" | "rawdatafile" => Some(ValueKind::Text),
        _ => None,
    }
}

/// Fields of a filterbank header needed to locate data in time and frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterbankHeader {
    pub source_name: Option<String>,
    pub nchans: usize,
    pub nifs: usize,
    pub nbits: usize,
    /// Centre frequency of the first channel in MHz.
    pub fch1: f64,
    /// Signed channel spacing in MHz.
    pub foff: f64,
    /// Start time in MJD.
    pub tstart: f64,
    /// Sample time in seconds.
    pub tsamp: f64,
    pub header_len: u64,
    pub data_len: u64,
}

impl FilterbankHeader {
    /// Number of complete spectra in the data section.
    pub fn tchans(&self) -> usize {
        let bits_per_spectrum = (self.nchans * self.nifs * self.nbits) as u64;
        (self.data_len * 8 / bits_per_spectrum) as usize
    }

    pub fn frame_metadata(&self) -> Result<FrameMetadata> {
        FrameMetadata::new(self.tchans(), self.foff.abs() * 1e6, self.tsamp)
    }

    /// Channel range `l..r` whose centre frequencies fall inside `bounds`.
    pub fn channel_range(&self, bounds: &FrequencyBounds) -> Result<(usize, usize)> {
        channel_window(self.fch1, self.foff, self.nchans, bounds)
    }
}

/// Channels `l..r` of a band starting at `fch1` with spacing `foff` (MHz)
/// whose centre frequencies fall inside `bounds`.
pub(crate) fn channel_window(
    fch1: f64,
    foff: f64,
    nchans: usize,
    bounds: &FrequencyBounds,
) -> Result<(usize, usize)> {
    let a = (bounds.f_start - fch1) / foff;
    let b = (bounds.f_stop - fch1) / foff;
    let lo = a.min(b).ceil().max(0.0);
    let hi = (a.max(b).floor() + 1.0).min(nchans as f64);
    if lo.is_nan() || hi.is_nan() || lo >= hi {
        return Err(FrameError::SliceOutOfRange {
            l: lo.max(0.0) as usize,
            r: hi.max(0.0) as usize,
            fchans: nchans,
        });
    }
    Ok((lo as usize, hi as usize))
}

struct HeaderReader<R> {
    inner: R,
    consumed: u64,
    path: PathBuf,
}

impl<R: Read> HeaderReader<R> {
    fn invalid(&self, reason: impl Into<String>) -> FrameError {
        FrameError::InvalidHeader {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => {
                self.consumed += N as u64;
                Ok(buf)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(self.invalid("header ends before HEADER_END"))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_bytes::<4>()?))
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_bytes::<8>()?))
    }

    fn read_string(&mut self, max_len: usize) -> Result<String> {
        let len = self.read_i32()?;
        if len <= 0 || len as usize > max_len {
            return Err(self.invalid(format!("implausible string length {len}")));
        }
        let mut buf = vec![0u8; len as usize];
        if let Err(e) = self.inner.read_exact(&mut buf) {
            return if e.kind() == io::ErrorKind::UnexpectedEof {
                Err(self.invalid("header ends inside a string"))
            } else {
                Err(e.into())
            };
        }
        self.consumed += len as u64;
        String::from_utf8(buf).map_err(|_| self.invalid("keyword is not valid UTF-8"))
    }

    fn read_positive_int(&mut self, keyword: &str) -> Result<usize> {
        let value = self.read_i32()?;
        if value <= 0 {
            return Err(self.invalid(format!("{keyword} must be positive, got {value}")));
        }
        Ok(value as usize)
    }
}

/// Parses the header of `path` without reading the data section.
pub fn read_header(path: &Path) -> Result<FilterbankHeader> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = HeaderReader {
        inner: BufReader::new(file),
        consumed: 0,
        path: path.to_path_buf(),
    };

    if reader.read_string(MAX_KEYWORD_LEN)? != HEADER_START {
        return Err(reader.invalid("missing HEADER_START"));
    }

    let mut source_name = None;
    let mut nchans = None;
    let mut nifs = 1usize;
    let mut nbits = None;
    let mut fch1 = None;
    let mut foff = None;
    let mut tstart = 0.0;
    let mut tsamp = None;

    loop {
        let keyword = reader.read_string(MAX_KEYWORD_LEN)?;
        if keyword == HEADER_END {
            break;
        }
        match keyword_kind(&keyword) {
            Some(ValueKind::Int) => match keyword.as_str() {
                "nchans" => nchans = Some(reader.read_positive_int("nchans")?),
                "nifs" => nifs = reader.read_positive_int("nifs")?,
                "nbits" => nbits = Some(reader.read_positive_int("nbits")?),
                _ => {
                    reader.read_i32()?;
                }
            },
            Some(ValueKind::Double) => {
                let value = reader.read_f64()?;
                match keyword.as_str() {
                    "fch1" => fch1 = Some(value),
                    "foff" => foff = Some(value),
                    "tsamp" => tsamp = Some(value),
                    "tstart" => tstart = value,
                    _ => {}
                }
            }
            Some(ValueKind::Text) => {
                let value = reader.read_string(MAX_STRING_LEN)?;
                if keyword == "source_name" {
                    source_name = Some(value);
                }
            }
            None => return Err(reader.invalid(format!("unknown keyword {keyword:?}"))),
        }
    }

    let header_len = reader.consumed;
    let header = FilterbankHeader {
        source_name,
        nchans: nchans.ok_or_else(|| reader.invalid("nchans missing"))?,
        nifs,
        nbits: nbits.ok_or_else(|| reader.invalid("nbits missing"))?,
        fch1: fch1.ok_or_else(|| reader.invalid("fch1 missing"))?,
        foff: foff.ok_or_else(|| reader.invalid("foff missing"))?,
        tstart,
        tsamp: tsamp.ok_or_else(|| reader.invalid("tsamp missing"))?,
        header_len,
        data_len: file_len.saturating_sub(header_len),
    };
    log::debug!(
        "{}: nchans={}, nifs={}, nbits={}, fch1={} MHz, foff={} MHz, tsamp={} s, tchans={}",
        path.display(),
        header.nchans,
        header.nifs,
        header.nbits,
        header.fch1,
        header.foff,
        header.tsamp,
        header.tchans()
    );
    Ok(header)
}

/// Sample encodings that can be framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleFormat {
    U8,
    F32,
}

impl SampleFormat {
    fn for_header(header: &FilterbankHeader, path: &Path) -> Result<Self> {
        match (header.nifs, header.nbits) {
            (1, 8) => Ok(Self::U8),
            (1, 32) => Ok(Self::F32),
            (nifs, nbits) => Err(FrameError::InvalidHeader {
                path: path.to_path_buf(),
                reason: format!(
                    "only single-IF 8 or 32 bit data can be framed (nifs={nifs}, nbits={nbits})"
                ),
            }),
        }
    }

    fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::F32 => 4,
        }
    }

    fn decode(self, raw: &[u8], out: &mut Vec<f64>) {
        match self {
            Self::U8 => out.extend(raw.iter().map(|&b| b as f64)),
            Self::F32 => out.extend(
                raw.chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64),
            ),
        }
    }
}

/// Position of channels `l..r` inside each stored spectrum.
#[derive(Debug, Clone, Copy)]
struct RowWindow {
    sample: SampleFormat,
    nchans: usize,
    l: usize,
    r: usize,
}

impl RowWindow {
    fn window_bytes(&self) -> usize {
        (self.r - self.l) * self.sample.bytes()
    }

    fn skip_before(&self) -> i64 {
        (self.l * self.sample.bytes()) as i64
    }

    fn skip_after(&self) -> i64 {
        ((self.nchans - self.r) * self.sample.bytes()) as i64
    }
}

// Reads `tchans` spectra from the reader's current position. Only the
// window's bytes are read from each spectrum; the rest is seeked over.
fn read_window<R: Read + Seek>(
    reader: &mut R,
    window: &RowWindow,
    tchans: usize,
) -> Result<Vec<f64>> {
    let mut raw = vec![0u8; window.window_bytes()];
    let mut values = Vec::with_capacity(tchans * (window.r - window.l));
    for _ in 0..tchans {
        reader.seek(SeekFrom::Current(window.skip_before()))?;
        reader.read_exact(&mut raw)?;
        window.sample.decode(&raw, &mut values);
        reader.seek(SeekFrom::Current(window.skip_after()))?;
    }
    Ok(values)
}

fn read_fil_frame(path: &Path, bounds: &FrequencyBounds) -> Result<Frame> {
    let header = read_header(path)?;
    let sample = SampleFormat::for_header(&header, path)?;
    let (l, r) = header.channel_range(bounds)?;
    let tchans = header.tchans();
    let window = RowWindow {
        sample,
        nchans: header.nchans,
        l,
        r,
    };

    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(header.header_len))?;
    let values = read_window(&mut file, &window, tchans)?;

    let data = Array2::from_shape_vec((tchans, r - l), values).map_err(|_| {
        FrameError::ShapeMismatch {
            left: (tchans, r - l),
            right: (tchans, header.nchans),
        }
    })?;
    let fch1 = header.fch1 + l as f64 * header.foff;
    let mut frame = Frame::new(data, fch1, header.foff, header.tsamp)?;
    frame.add_metadata("tstart", header.tstart);
    log::info!(
        "Loaded {} x {} frame from {} (channels {l}..{r})",
        frame.tchans(),
        frame.fchans(),
        path.display()
    );
    Ok(frame)
}

/// On-disk layouts recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataFormat {
    Sigproc,
    #[cfg(feature = "hdf5")]
    Hdf5,
}

impl DataFormat {
    fn of(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("fil") => Ok(Self::Sigproc),
            #[cfg(feature = "hdf5")]
            Some("h5") => Ok(Self::Hdf5),
            _ => Err(FrameError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Loads every time step of the channels inside `bounds`.
pub fn read_frame(path: &Path, bounds: &FrequencyBounds) -> Result<Frame> {
    match DataFormat::of(path)? {
        DataFormat::Sigproc => read_fil_frame(path, bounds),
        #[cfg(feature = "hdf5")]
        DataFormat::Hdf5 => crate::h5::read_frame(path, bounds),
    }
}

/// Metadata lookup backed by filterbank headers (`.fil`, and `.h5` with the
/// `hdf5` feature).
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterbankHeaderSource;

impl MetadataSource for FilterbankHeaderSource {
    fn metadata(&self, path: &Path) -> Result<FrameMetadata> {
        match DataFormat::of(path)? {
            DataFormat::Sigproc => read_header(path)?.frame_metadata(),
            #[cfg(feature = "hdf5")]
            DataFormat::Hdf5 => crate::h5::read_header(path)?.frame_metadata(),
        }
    }
}
