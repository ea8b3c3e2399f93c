use std::path::Path;

use crate::error::{ensure_nonzero, ensure_positive, Result};

/// Time/frequency resolution of one spectrogram segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMetadata {
    /// Number of time steps.
    pub tchans: usize,
    /// Channel width in Hz.
    pub df: f64,
    /// Time step in seconds.
    pub dt: f64,
}

impl FrameMetadata {
    pub fn new(tchans: usize, df: f64, dt: f64) -> Result<Self> {
        let metadata = Self { tchans, df, dt };
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_nonzero("tchans", self.tchans)?;
        ensure_positive("df", self.df)?;
        ensure_positive("dt", self.dt)?;
        Ok(())
    }
}

/// Caller-supplied resolution values; `None` means "read it from the data".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetadataOverrides {
    pub tchans: Option<usize>,
    pub df: Option<f64>,
    pub dt: Option<f64>,
}

impl MetadataOverrides {
    /// Builds the effective metadata. `lookup` runs at most once, and only
    /// when at least one field is missing.
    pub fn resolve<F>(&self, lookup: F) -> Result<FrameMetadata>
    where
        F: FnOnce() -> Result<FrameMetadata>,
    {
        if let (Some(tchans), Some(df), Some(dt)) = (self.tchans, self.df, self.dt) {
            return FrameMetadata::new(tchans, df, dt);
        }
        let looked_up = lookup()?;
        log::debug!(
            "Filling missing frame metadata from header: tchans={}, df={} Hz, dt={} s",
            looked_up.tchans,
            looked_up.df,
            looked_up.dt
        );
        FrameMetadata::new(
            self.tchans.unwrap_or(looked_up.tchans),
            self.df.unwrap_or(looked_up.df),
            self.dt.unwrap_or(looked_up.dt),
        )
    }
}

/// Reads resolution from a data source's header without loading bulk data.
pub trait MetadataSource {
    fn metadata(&self, path: &Path) -> Result<FrameMetadata>;
}

impl<F> MetadataSource for F
where
    F: Fn(&Path) -> Result<FrameMetadata>,
{
    fn metadata(&self, path: &Path) -> Result<FrameMetadata> {
        self(path)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::{FrameMetadata, MetadataOverrides};
    use crate::error::FrameError;

    #[test]
    fn rejects_non_positive_resolution() {
        assert!(matches!(
            FrameMetadata::new(0, 1.0, 1.0),
            Err(FrameError::InvalidResolution { field: "tchans", .. })
        ));
        assert!(matches!(
            FrameMetadata::new(16, -2.0, 1.0),
            Err(FrameError::InvalidResolution { field: "df", .. })
        ));
        assert!(matches!(
            FrameMetadata::new(16, 2.0, f64::NAN),
            Err(FrameError::InvalidResolution { field: "dt", .. })
        ));
    }

    #[test]
    fn complete_overrides_skip_lookup() {
        let overrides = MetadataOverrides {
            tchans: Some(16),
            df: Some(2.0),
            dt: Some(18.0),
        };
        let metadata = overrides
            .resolve(|| panic!("lookup must not run"))
            .unwrap();
        assert_eq!(metadata, FrameMetadata::new(16, 2.0, 18.0).unwrap());
    }

    #[test]
    fn partial_overrides_fill_only_missing_fields() {
        let calls = Cell::new(0);
        let overrides = MetadataOverrides {
            tchans: None,
            df: Some(3.0),
            dt: None,
        };
        let metadata = overrides
            .resolve(|| {
                calls.set(calls.get() + 1);
                FrameMetadata::new(279, 2.79, 1.07)
            })
            .unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(metadata.tchans, 279);
        assert_eq!(metadata.df, 3.0);
        assert_eq!(metadata.dt, 1.07);
    }
}
