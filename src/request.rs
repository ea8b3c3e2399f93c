use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::DynError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestFile {
    pub center_freq: Option<f64>,
    pub drift_rate: Option<f64>,
    pub fchans: Option<usize>,
    pub pointing: Option<usize>,
    pub order: Option<String>,
    pub tchans: Option<usize>,
    pub df: Option<f64>,
    pub dt: Option<f64>,
    pub bound: Option<String>,
    pub files: Vec<PathBuf>,
}

fn parse_optional_f64(params: &HashMap<String, String>, keys: &[&str]) -> Result<Option<f64>, DynError> {
    for key in keys {
        if let Some(value) = params.get(*key) {
            return Ok(Some(value.trim().parse::<f64>()?));
        }
    }
    Ok(None)
}

fn parse_optional_usize(params: &HashMap<String, String>, keys: &[&str]) -> Result<Option<usize>, DynError> {
    for key in keys {
        if let Some(value) = params.get(*key) {
            return Ok(Some(value.trim().parse::<usize>()?));
        }
    }
    Ok(None)
}

fn parse_file_list(raw: &str) -> Vec<PathBuf> {
    raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn parse_request_kv<R: BufRead>(reader: R) -> Result<RequestFile, DynError> {
    let mut params = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.splitn(2, '#').next().unwrap_or("").trim();
        if line.is_empty() || line.starts_with(';') { continue; }
        if let Some(index) = line.find('=') {
            let (key, value) = line.split_at(index);
            let key = key.trim().to_ascii_lowercase().replace('_', "");
            let value = value.trim_start_matches('=').trim().trim_matches('"').trim_matches('\'').to_string();
            params.insert(key, value);
        }
    }
    Ok(RequestFile {
        center_freq: parse_optional_f64(&params, &["centerfreq", "centrefreq", "freq"])?,
        drift_rate: parse_optional_f64(&params, &["driftrate", "drift"])?,
        fchans: parse_optional_usize(&params, &["fchans"])?,
        pointing: parse_optional_usize(&params, &["pointing", "pointingidx", "ref"])?,
        order: params.get("order").cloned(),
        tchans: parse_optional_usize(&params, &["tchans"])?,
        df: parse_optional_f64(&params, &["df", "foffhz"])?,
        dt: parse_optional_f64(&params, &["dt", "tsamp"])?,
        bound: params.get("bound").cloned(),
        files: params.get("files").or_else(|| params.get("file")).map(|v| parse_file_list(v)).unwrap_or_default(),
    })
}

pub fn parse_request(path: &Path) -> Result<RequestFile, DynError> {
    let file = File::open(path).map_err(|e| format!("cannot open request file {}: {e}", path.display()))?;
    let mut request = parse_request_kv(BufReader::new(file))?;
    // Relative data paths are resolved against the request file's directory.
    if let Some(base) = path.parent() {
        for file in request.files.iter_mut() {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
    }
    Ok(request)
}
