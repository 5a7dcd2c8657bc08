//! File helpers around the geolocation pipeline: reading detections produced
//! by the vision service and exporting located reports.

use crate::pipeline::{Detection, DetectionReport, LocateError};
use chrono::SecondsFormat;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Ensure the output directory exists
pub fn ensure_output_dir(output_dir: &Path) -> Result<(), LocateError> {
    if !output_dir.exists() {
        fs::create_dir_all(output_dir)?;
    }
    Ok(())
}

/// Reads a JSON array of [`Detection`]s, as returned by the detection service.
pub fn load_detections(path: &Path) -> Result<Vec<Detection>, LocateError> {
    let reader = BufReader::new(File::open(path)?);
    let detections = serde_json::from_reader(reader)?;
    Ok(detections)
}

#[derive(Serialize)]
struct ReportRow<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    lat: f64,
    lng: f64,
    image: String,
    detection_time: String,
}

/// Writes reports as CSV with `type,lat,lng,image,detection_time` columns.
pub fn write_reports_csv(path: &Path, reports: &[DetectionReport]) -> Result<(), LocateError> {
    let mut writer = csv::Writer::from_path(path)?;
    for report in reports {
        writer.serialize(ReportRow {
            kind: &report.kind,
            lat: report.gps[0],
            lng: report.gps[1],
            image: report
                .image
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            detection_time: report
                .detection_time
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        })?;
    }
    writer.flush()?;
    Ok(())
}
