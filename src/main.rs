mod args;
mod request;

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};

use drift_frames::bounds::{centered_frame_bounds, DriftRequest, FrequencyBounds};
use drift_frames::cadence::CadenceOrder;
use drift_frames::extract::BoundMode;
use drift_frames::filterbank::FilterbankHeaderSource;
use drift_frames::metadata::{FrameMetadata, MetadataOverrides};
use drift_frames::plan::{centered_cadence, centered_frame, extract_planned, PlannedFrame};

use request::{parse_request, RequestFile};

pub type DynError = Box<dyn Error + Send + Sync>;

struct Resolved {
    files: Vec<PathBuf>,
    request: DriftRequest,
    overrides: MetadataOverrides,
    pointing: usize,
    order: Option<CadenceOrder>,
    bound: Option<BoundMode>,
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

// CLI values win unless they are still at their defaults, in which case the
// request file may supply them.
fn resolve(args: &args::Args, file: Option<RequestFile>) -> Result<Resolved, DynError> {
    let file = file.unwrap_or_default();

    let center_freq = args
        .center_freq
        .or(file.center_freq)
        .ok_or("--center-freq (or centerfreq in the request file) is required")?;
    let drift_rate = args
        .drift_rate
        .or(file.drift_rate)
        .ok_or("--drift-rate (or driftrate in the request file) is required")?;
    let fchans = if args.fchans == args::DEFAULT_FCHANS {
        file.fchans.unwrap_or(args.fchans)
    } else {
        args.fchans
    };
    let pointing = if args.pointing == 0 {
        file.pointing.unwrap_or(0)
    } else {
        args.pointing
    };
    let files = if args.files.is_empty() {
        file.files
    } else {
        args.files.clone()
    };

    let cli_order_is_default = args.order == args::DEFAULT_ORDER;
    let order = match (cli_order_is_default, file.order) {
        (true, Some(order)) => Some(order.parse::<CadenceOrder>()?),
        (false, _) => Some(args.order.parse::<CadenceOrder>()?),
        // The default order only applies when it fits the number of files.
        (true, None) => {
            let default = CadenceOrder::default();
            if default.len() == files.len() {
                Some(default)
            } else {
                None
            }
        }
    };

    let bound = args
        .bound
        .clone()
        .or(file.bound)
        .map(|b| b.parse::<BoundMode>())
        .transpose()?;

    Ok(Resolved {
        files,
        request: DriftRequest::new(center_freq, drift_rate, fchans)?,
        overrides: MetadataOverrides {
            tchans: args.tchans.or(file.tchans),
            df: args.df.or(file.df),
            dt: args.dt.or(file.dt),
        },
        pointing,
        order,
        bound,
    })
}

fn print_bounds(bounds: &FrequencyBounds, metadata: &FrameMetadata) {
    println!("f_start = {:.9} MHz", bounds.f_start);
    println!("f_stop  = {:.9} MHz", bounds.f_stop);
    println!(
        "width   = {:.3} channels ({:.3} Hz)",
        bounds.width_channels(metadata.df),
        bounds.width_mhz() * 1e6
    );
}

fn print_extraction(
    planned: &PlannedFrame,
    bounds: &FrequencyBounds,
    request: &DriftRequest,
    mode: BoundMode,
) -> Result<(), DynError> {
    let ts = extract_planned(planned, bounds, request, mode)?;
    println!(
        "  {}: {mode} channels {}..{}, {} samples",
        planned.path.display(),
        ts.bounds.l,
        ts.bounds.r,
        ts.values.len()
    );
    Ok(())
}

// Without a data file every resolution value has to come from the caller.
fn metadata_from_overrides(overrides: &MetadataOverrides) -> Result<FrameMetadata, DynError> {
    let (Some(tchans), Some(df), Some(dt)) = (overrides.tchans, overrides.df, overrides.dt) else {
        return Err("Provide a data file or all of --tchans, --df and --dt".into());
    };
    Ok(FrameMetadata::new(tchans, df, dt)?)
}

fn run_single(resolved: &Resolved) -> Result<(), DynError> {
    let Some(path) = resolved.files.first() else {
        if resolved.bound.is_some() {
            return Err("--bound needs a data file to load".into());
        }
        let metadata = metadata_from_overrides(&resolved.overrides)?;
        let bounds = centered_frame_bounds(&resolved.request, &metadata)?;
        print_bounds(&bounds, &metadata);
        return Ok(());
    };

    let plan = centered_frame(
        path,
        &resolved.request,
        &resolved.overrides,
        &FilterbankHeaderSource,
    )?;
    log::info!(
        "Single frame {}: tchans={}, df={} Hz, dt={} s",
        path.display(),
        plan.metadata.tchans,
        plan.metadata.df,
        plan.metadata.dt
    );
    print_bounds(&plan.bounds, &plan.metadata);
    if let Some(mode) = resolved.bound {
        print_extraction(&plan.frame, &plan.bounds, &plan.request, mode)?;
    }
    Ok(())
}

fn run_cadence(resolved: &Resolved) -> Result<(), DynError> {
    let order = match &resolved.order {
        Some(order) => order.clone(),
        None => {
            return Err(format!(
                "--order must list one label per file ({} files given)",
                resolved.files.len()
            )
            .into())
        }
    };
    let plan = centered_cadence(
        &resolved.files,
        resolved.pointing,
        &resolved.request,
        &resolved.overrides,
        &FilterbankHeaderSource,
        &order,
    )?;
    log::info!(
        "Cadence of {} files ({}), reference {}: tchans={}, df={} Hz, dt={} s",
        plan.frames.len(),
        plan.order,
        resolved.pointing,
        plan.metadata.tchans,
        plan.metadata.df,
        plan.metadata.dt
    );
    print_bounds(&plan.bounds, &plan.metadata);
    for frame in &plan.frames {
        println!(
            "  [{}] {} start={}",
            frame.label.unwrap_or('?'),
            display_name(&frame.path),
            frame.start_unix.unwrap_or_default()
        );
    }
    if let Some(mode) = resolved.bound {
        for frame in &plan.frames {
            print_extraction(frame, &plan.bounds, &plan.request, mode)?;
        }
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn main() -> Result<(), DynError> {
    if std::env::args_os().len() == 1 {
        args::Args::command().print_help()?;
        println!();
        return Ok(());
    }

    let args = args::Args::parse();
    init_logging(args.debug);

    let request_file = match &args.request {
        Some(path) => Some(parse_request(path)?),
        None => None,
    };
    let resolved = resolve(&args, request_file)?;
    log::debug!(
        "Request: center_freq={} MHz, drift_rate={} Hz/s, fchans={}",
        resolved.request.center_freq,
        resolved.request.drift_rate,
        resolved.request.fchans
    );

    if resolved.files.len() > 1 {
        run_cadence(&resolved)
    } else {
        run_single(&resolved)
    }
}
