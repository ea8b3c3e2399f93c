use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_FCHANS: usize = 1024;
pub const DEFAULT_ORDER: &str = drift_frames::cadence::DEFAULT_ORDER;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Frequency bounds that keep a drifting narrowband signal inside a frame or cadence",
    long_about = None,
    arg_required_else_help = true,
    after_help = "Examples:\n  drift_frames blc00_guppi_59000_43200_HIP1234_0011.gpuspec.0000.fil --center-freq 8421.3 --drift-rate -0.35\n  drift_frames --center-freq 1420.0 --drift-rate 0 --tchans 16 --df 2.7939677238464355 --dt 18.253611008\n  drift_frames A1.fil B1.fil A2.fil B2.fil --pointing 2 --center-freq 8421.3 --drift-rate 0.2 --fchans 256 --order ABAB\n  drift_frames --request target.req --bound snr\n"
)]
pub struct Args {
    /// Filterbank files: one for a single frame, several for a cadence
    pub files: Vec<PathBuf>,

    /// Request file with key = value lines (CLI values take precedence)
    #[arg(long, visible_alias = "req")]
    pub request: Option<PathBuf>,

    /// Signal centre frequency in MHz
    #[arg(long = "center-freq", visible_alias = "freq")]
    pub center_freq: Option<f64>,

    /// Signal drift rate in Hz/s
    #[arg(long = "drift-rate", visible_alias = "drift", allow_hyphen_values = true)]
    pub drift_rate: Option<f64>,

    /// Requested window width in frequency channels
    #[arg(long, default_value_t = DEFAULT_FCHANS)]
    pub fchans: usize,

    /// Index of the reference file within the cadence
    #[arg(long, visible_alias = "ref", default_value_t = 0)]
    pub pointing: usize,

    /// Cadence labels, one per file
    #[arg(long, default_value = DEFAULT_ORDER)]
    pub order: String,

    /// Number of time steps per file (overrides the header)
    #[arg(long)]
    pub tchans: Option<usize>,

    /// Channel width in Hz (overrides the header)
    #[arg(long)]
    pub df: Option<f64>,

    /// Time step in seconds (overrides the header)
    #[arg(long)]
    pub dt: Option<f64>,

    /// Load each planned frame and extract its time series (threshold or snr)
    #[arg(long)]
    pub bound: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}
