//! Geolocate detections from a drone photo.
//!
//! Reads the detections returned by the vision service (a JSON array of
//! normalized bounding boxes), projects each one onto the ground using a
//! calibrated camera and the drone's position, and prints one JSON report per
//! line on stdout.
//!
//! Usage:
//! ```bash
//! cargo run -- \
//!   --calibration samples/rad_tan.yaml \
//!   --detections samples/detections.json \
//!   --lat 50.0 --lng 19.0 --altitude 100 --heading 12.5
//! ```

use clap::{Parser, ValueEnum};
use drone_geolocate::camera::{CameraModel, PinholeModel, RadTanModel, Resolution};
use drone_geolocate::pipeline::{
    DetectionReport, DroneState, GeoLocator, JsonLinesSink, ReportSink,
};
use drone_geolocate::{degrees_to_dms, util, GeoPosition};
use flexi_logger::{colored_detailed_format, detailed_format, Duplicate, FileSpec, Logger};
use log::{info, warn};
use std::io;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModelType {
    RadTan,
    Pinhole,
}

/// Project drone image detections to WGS84 coordinates
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Camera calibration YAML
    #[arg(short = 'c', long)]
    calibration: PathBuf,

    /// Camera model stored in the calibration file
    #[arg(short = 'm', long, value_enum, default_value_t = ModelType::RadTan)]
    model: ModelType,

    /// JSON array of detections with normalized x, y, width, height
    #[arg(short = 'd', long)]
    detections: PathBuf,

    /// Drone latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    /// Drone longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    lng: f64,

    /// Camera height above ground in meters
    #[arg(short = 'a', long)]
    altitude: f64,

    /// Image rotation in degrees, counter-clockwise positive
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    heading: f64,

    /// Photo the detections come from; its size overrides the calibration resolution
    #[arg(short = 'i', long)]
    image: Option<PathBuf>,

    /// Also write the reports to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Directory for log files; logs go to stderr only when omitted
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log level filter (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn run<C: CameraModel>(camera: C, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let image_resolution = match &cli.image {
        Some(path) => {
            let (width, height) = image::image_dimensions(path)?;
            Resolution { width, height }
        }
        None => camera.get_resolution(),
    };
    info!(
        "Image resolution: {}x{}",
        image_resolution.width, image_resolution.height
    );

    let drone = DroneState {
        position: GeoPosition::new(cli.lat, cli.lng),
        altitude: cli.altitude,
        heading: cli.heading.to_radians(),
    };
    info!(
        "Drone at {} {}, altitude {} m, heading {}°",
        degrees_to_dms(cli.lat),
        degrees_to_dms(cli.lng),
        cli.altitude,
        cli.heading
    );

    let detections = util::load_detections(&cli.detections)?;
    info!("Loaded {} detections", detections.len());

    let locator = GeoLocator::new(camera);
    let mut sink = JsonLinesSink::new(io::stdout().lock());
    let mut reports = Vec::new();

    for (detection, result) in detections
        .iter()
        .zip(locator.locate_all(&detections, &drone, image_resolution))
    {
        match result {
            Ok(located) => {
                let report = DetectionReport::from_located(&located, cli.image.clone());
                sink.push(&report)?;
                reports.push(report);
            }
            Err(e) => warn!("Skipping {}: {}", detection.label, e),
        }
    }

    if let Some(csv_path) = &cli.csv {
        if let Some(parent) = csv_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            util::ensure_output_dir(parent)?;
        }
        util::write_reports_csv(csv_path, &reports)?;
        info!("Wrote {} reports to {:?}", reports.len(), csv_path);
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // stdout carries the reports, so logs go to stderr and optionally a file.
    let logger = Logger::try_with_str(&cli.log_level)?;
    let _logger = match &cli.log_dir {
        Some(dir) => logger
            .log_to_file(
                FileSpec::default()
                    .directory(dir)
                    .suppress_timestamp()
                    .suffix("log"),
            )
            .duplicate_to_stderr(Duplicate::All)
            .format_for_files(detailed_format)
            .format_for_stderr(colored_detailed_format)
            .start()?,
        None => logger
            .log_to_stderr()
            .format_for_stderr(colored_detailed_format)
            .start()?,
    };

    let calibration = cli
        .calibration
        .to_str()
        .ok_or("Invalid calibration path string")?;

    match cli.model {
        ModelType::RadTan => {
            let camera = RadTanModel::load_from_yaml(calibration)?;
            info!("Loaded camera: {:?}", camera);
            run(camera, &cli)
        }
        ModelType::Pinhole => {
            let camera = PinholeModel::load_from_yaml(calibration)?;
            info!("Loaded camera: {:?}", camera);
            run(camera, &cli)
        }
    }
}
