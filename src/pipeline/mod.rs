//! End-to-end geolocation of detections in a drone photo.
//!
//! The vision service is treated as a black box that returns normalized
//! bounding boxes ([`Detection`]). [`GeoLocator`] turns each box center into a
//! WGS84 position:
//!
//! 1. box center in pixels (rescaled to the calibration resolution),
//! 2. [`translate`] to a metric east/north offset under the nadir assumption,
//! 3. [`GeoPosition::offset_by`] on the WGS84 ellipsoid.
//!
//! Results are handed to a [`ReportSink`] as [`DetectionReport`] records.

use crate::camera::{CameraModel, CameraModelError, Resolution};
use crate::geodesy::GeoPosition;
use crate::geometry::{translate, MetricOffset};
use chrono::{DateTime, Utc};
use log::{debug, info};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum LocateError {
    #[error("Camera model error: {0}")]
    Camera(#[from] CameraModelError),
    #[error("Bounding box {0:?} is not inside the normalized [0, 1] image")]
    InvalidBoundingBox([f64; 4]),
    #[error("Image resolution must be non-zero")]
    UnknownResolution,
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// A bounding box returned by the vision service.
///
/// `x`, `y` are the normalized top-left corner and `width`, `height` the
/// normalized size, all relative to the image dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Detection {
    /// Converts a `[ymin, xmin, ymax, xmax]` box on a 0-1000 grid, the layout
    /// the vision model answers with.
    pub fn from_box_2d(label: impl Into<String>, box_2d: [i32; 4]) -> Self {
        let [ymin, xmin, ymax, xmax] = box_2d.map(f64::from);
        Detection {
            label: label.into(),
            x: xmin / 1000.0,
            y: ymin / 1000.0,
            width: (xmax - xmin) / 1000.0,
            height: (ymax - ymin) / 1000.0,
        }
    }

    /// Checks that the box lies within the normalized image.
    ///
    /// The box may touch the right and bottom edges, but its center must fall
    /// strictly inside the image so that [`Detection::center_pixel`] is a
    /// valid pixel.
    pub fn validate(&self) -> Result<(), LocateError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        let valid = in_unit(self.x)
            && in_unit(self.y)
            && self.width >= 0.0
            && self.height >= 0.0
            && in_unit(self.x + self.width)
            && in_unit(self.y + self.height)
            && self.x + self.width / 2.0 < 1.0
            && self.y + self.height / 2.0 < 1.0;
        if !valid {
            return Err(LocateError::InvalidBoundingBox([
                self.x,
                self.y,
                self.width,
                self.height,
            ]));
        }
        Ok(())
    }

    /// Pixel coordinates of the box center in an image of `resolution`.
    pub fn center_pixel(&self, resolution: Resolution) -> Vector2<f64> {
        Vector2::new(
            (self.x + self.width / 2.0) * resolution.width as f64,
            (self.y + self.height / 2.0) * resolution.height as f64,
        )
    }
}

/// Where the drone was when the photo was taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DroneState {
    pub position: GeoPosition,
    /// Height of the camera above the ground plane, in meters.
    pub altitude: f64,
    /// Image rotation in radians, counter-clockwise positive.
    #[serde(default)]
    pub heading: f64,
}

/// A detection together with its ground offset and geographic position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedDetection {
    pub detection: Detection,
    pub pixel: [f64; 2],
    pub offset: MetricOffset,
    pub position: GeoPosition,
}

/// The record accepted by the reporting sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "gps_coords")]
    pub gps: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
    /// When the report was created, serialized as RFC 3339.
    pub detection_time: DateTime<Utc>,
}

impl DetectionReport {
    /// Builds a report stamped with the current time.
    pub fn from_located(located: &LocatedDetection, image: Option<PathBuf>) -> Self {
        Self::from_located_at(located, image, Utc::now())
    }

    pub fn from_located_at(
        located: &LocatedDetection,
        image: Option<PathBuf>,
        detection_time: DateTime<Utc>,
    ) -> Self {
        DetectionReport {
            kind: report_kind(&located.detection.label).to_string(),
            gps: [located.position.lat, located.position.lng],
            image,
            detection_time,
        }
    }
}

/// Maps vision labels to the point types known by the reporting backend.
///
/// Unknown labels are passed through unchanged.
pub fn report_kind(label: &str) -> &str {
    match label {
        "barrell" => "barrel",
        "palette" => "europallet",
        "person" => "worker",
        other => other,
    }
}

/// Consumer of detection reports.
pub trait ReportSink {
    fn push(&mut self, report: &DetectionReport) -> Result<(), LocateError>;
}

/// Writes each report as one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn push(&mut self, report: &DetectionReport) -> Result<(), LocateError> {
        serde_json::to_writer(&mut self.writer, report)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl ReportSink for Vec<DetectionReport> {
    fn push(&mut self, report: &DetectionReport) -> Result<(), LocateError> {
        Vec::push(self, report.clone());
        Ok(())
    }
}

/// Projects detections to WGS84 using an explicitly supplied camera.
#[derive(Debug, Clone)]
pub struct GeoLocator<C: CameraModel> {
    camera: C,
}

impl<C: CameraModel> GeoLocator<C> {
    pub fn new(camera: C) -> Self {
        GeoLocator { camera }
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    /// Maps a pixel of an image with `image_resolution` into the calibration
    /// frame. Images taken at a different size than the calibration images are
    /// rescaled; an unknown calibration resolution leaves the pixel as is.
    fn to_calibration_frame(
        &self,
        pixel: Vector2<f64>,
        image_resolution: Resolution,
    ) -> Vector2<f64> {
        let calibration = self.camera.get_resolution();
        if !calibration.is_known() || calibration == image_resolution {
            return pixel;
        }
        Vector2::new(
            pixel.x * calibration.width as f64 / image_resolution.width as f64,
            pixel.y * calibration.height as f64 / image_resolution.height as f64,
        )
    }

    /// Locates a single detection.
    ///
    /// # Errors
    ///
    /// * [`LocateError::UnknownResolution`] if `image_resolution` is zero-sized.
    /// * [`LocateError::InvalidBoundingBox`] if the box leaves the unit square.
    /// * [`LocateError::Camera`] if undistortion fails.
    pub fn locate(
        &self,
        detection: &Detection,
        drone: &DroneState,
        image_resolution: Resolution,
    ) -> Result<LocatedDetection, LocateError> {
        if !image_resolution.is_known() {
            return Err(LocateError::UnknownResolution);
        }
        detection.validate()?;

        let center = detection.center_pixel(image_resolution);
        let pixel = self.to_calibration_frame(center, image_resolution);
        let offset = translate(pixel.x, pixel.y, drone.altitude, &self.camera, drone.heading)?;
        let position = drone.position.offset_by(&offset);

        debug!(
            "{} at pixel ({:.1}, {:.1}) -> {:?}",
            detection.label, pixel.x, pixel.y, offset
        );
        info!("Located {} at {:?}", detection.label, position);

        Ok(LocatedDetection {
            detection: detection.clone(),
            pixel: [pixel.x, pixel.y],
            offset,
            position,
        })
    }

    /// Locates every detection independently, preserving input order.
    pub fn locate_all(
        &self,
        detections: &[Detection],
        drone: &DroneState,
        image_resolution: Resolution,
    ) -> Vec<Result<LocatedDetection, LocateError>> {
        detections
            .iter()
            .map(|detection| self.locate(detection, drone, image_resolution))
            .collect()
    }
}
