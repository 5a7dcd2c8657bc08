//! Drone Geolocate Library
//!
//! Converts object detections in drone photographs into WGS84 positions.
//! The projection is a fixed pipeline of stateless steps:
//! - [`angle`]: decimal degrees <-> degree/minute/second conversions
//! - [`camera`]: calibrated camera models that undistort pixels
//! - [`geometry`]: pixel to metric ground offset for a nadir camera over flat ground
//! - [`geodesy`]: metric offset to latitude/longitude on the WGS84 ellipsoid
//!
//! The [`pipeline`] module wires these together for bounding boxes returned by
//! a detection service and hands the results to a reporting sink.

pub mod angle;
pub mod camera;
pub mod geodesy;
pub mod geometry;
pub mod pipeline;
pub mod util;

// Re-export commonly used types
pub use angle::{degrees_to_dms, dms_to_degrees, Dms, Sign};
pub use camera::{CameraModel, CameraModelError, Intrinsics, PinholeModel, RadTanModel, Resolution};
pub use geodesy::{calculate_new_coordinates, distance_and_bearing, GeoPosition};
pub use geometry::{pixels_to_meters, rotate_offset, translate, MetricOffset};
pub use pipeline::{
    Detection, DetectionReport, DroneState, GeoLocator, JsonLinesSink, LocateError,
    LocatedDetection, ReportSink,
};
