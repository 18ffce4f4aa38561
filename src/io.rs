use std::io::Write;
use std::path::Path;

use log::warn;
use serde::Serialize;

/// One labeled numeric row of the flat parameter store.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamRow {
    pub label: String,
    pub values: Vec<f64>,
}

fn csv_to_io_error(e: csv::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, e)
}

/// Read every labeled row from a CSV file. Rows whose numeric fields fail
/// to parse are skipped with a warning; a missing file yields an empty set.
pub fn read_param_rows(path: &Path) -> std::io::Result<Vec<ParamRow>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_to_io_error)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_to_io_error)?;
        let mut fields = record.iter();
        let Some(label) = fields.next() else {
            continue;
        };
        let values: Result<Vec<f64>, _> = fields.map(str::parse::<f64>).collect();
        match values {
            Ok(values) => rows.push(ParamRow {
                label: label.to_string(),
                values,
            }),
            Err(e) => warn!("skipping malformed row {:?} in {:?}: {}", label, path, e),
        }
    }
    Ok(rows)
}

/// Overwrite the store with the given rows.
pub fn write_param_rows(path: &Path, rows: &[ParamRow]) -> std::io::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_to_io_error)?;
    for row in rows {
        let mut record = vec![row.label.clone()];
        record.extend(row.values.iter().map(|v| v.to_string()));
        writer.write_record(&record).map_err(csv_to_io_error)?;
    }
    writer.flush()
}

/// Append a single labeled row to the store.
pub fn append_param_row(path: &Path, label: &str, values: &[f64]) -> std::io::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
    let mut record = vec![label.to_string()];
    record.extend(values.iter().map(|v| v.to_string()));
    writer.write_record(&record).map_err(csv_to_io_error)?;
    writer.flush()
}

/// Diagnostic summary written next to the parameter store after a solve.
#[derive(Serialize)]
struct CalibrationReport {
    timestamp: String,
    views: usize,
    total_points: usize,
    rms_error: f64,
    intrinsics: Vec<f64>,
    distortion: Vec<f64>,
}

pub fn write_report(
    output_path: &str,
    camera: &crate::camera_model::CameraModel,
    views: usize,
    total_points: usize,
    rms_error: f64,
) -> std::io::Result<()> {
    use std::time::SystemTime;

    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let report = CalibrationReport {
        timestamp: timestamp.to_string(),
        views,
        total_points,
        rms_error,
        intrinsics: crate::camera_model::io::flatten_row_major(camera.intrinsics()),
        distortion: camera.distortion().iter().cloned().collect(),
    };

    let json = serde_json::to_string_pretty(&report)?;
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(json.as_bytes())
}
