//! Image-plane to ground-plane geometry.
//!
//! All functions assume a nadir camera (optical axis pointing straight down)
//! over flat ground lying `altitude` meters below the lens. No terrain relief
//! is modelled: the horizontal displacement of a ground point scales linearly
//! with altitude and with its normalized image offset.
//!
//! Offsets are expressed as [`MetricOffset`] in a local east/north frame
//! centered on the point directly below the camera.

use crate::camera::{CameraModel, CameraModelError};
use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ground-plane displacement from the image center, east- and north-positive.
#[derive(Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricOffset {
    /// Meters towards east (image +x at zero heading).
    pub east: f64,
    /// Meters towards north (image -y at zero heading).
    pub north: f64,
}

impl MetricOffset {
    pub fn new(east: f64, north: f64) -> Self {
        MetricOffset { east, north }
    }

    /// Straight-line ground distance in meters.
    pub fn distance(&self) -> f64 {
        self.east.hypot(self.north)
    }
}

impl fmt::Debug for MetricOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MetricOffset [east: {:.3} m, north: {:.3} m]",
            self.east, self.north
        )
    }
}

/// Converts a pixel distance into meters on the ground.
///
/// `meters = pixels * altitude / focal_length_px`. The focal length must be in
/// pixel units and strictly positive; this is not checked.
///
/// ```rust
/// use drone_geolocate::geometry::pixels_to_meters;
///
/// assert_eq!(pixels_to_meters(25.0, 100.0, 50.0), 50.0);
/// ```
pub fn pixels_to_meters(pixels: f64, altitude: f64, focal_length_px: f64) -> f64 {
    pixels * (altitude / focal_length_px)
}

/// Meters covered by one pixel at the image center, using `fx` as focal length.
pub fn ground_sample_distance<C>(camera: &C, altitude: f64) -> f64
where
    C: ?Sized + CameraModel,
{
    pixels_to_meters(1.0, altitude, camera.get_intrinsics().fx)
}

/// Rotates an east/north offset by `angle` radians.
///
/// A positive angle is a counter-clockwise rotation of the image. In the
/// north-up frame this gives
/// `east' = east·cos + north·sin` and `north' = north·cos − east·sin`.
pub fn rotate_offset(offset: MetricOffset, angle: f64) -> MetricOffset {
    // Image frame has y pointing down, so flip north before and after rotating.
    let image = Vector2::new(offset.east, -offset.north);
    let rotated = Rotation2::new(angle) * image;
    MetricOffset::new(rotated.x, -rotated.y)
}

/// Maps a pixel to its metric offset from the image center on the ground.
///
/// 1. Undistort `(x, y)` through `camera`, giving normalized `(xn, yn)`.
/// 2. Scale by altitude: `X = xn·altitude`, `Y = yn·altitude`.
/// 3. Rotate `(X, Y)` counter-clockwise by `angle` radians.
/// 4. Return `east = X'`, `north = −Y'` since image y grows downwards.
///
/// The principal point always maps to a zero offset.
///
/// # Errors
///
/// Whatever [`CameraModel::undistort_point`] reports: a pixel outside a known
/// resolution, or a numerical failure while inverting the lens model.
pub fn translate<C>(
    x: f64,
    y: f64,
    altitude: f64,
    camera: &C,
    angle: f64,
) -> Result<MetricOffset, CameraModelError>
where
    C: ?Sized + CameraModel,
{
    let normalized = camera.undistort_point(&Vector2::new(x, y))?;
    let ground = normalized * altitude;
    let rotated = Rotation2::new(angle) * ground;

    Ok(MetricOffset::new(rotated.x, -rotated.y))
}
