//! Geodesic projection on the WGS84 ellipsoid.
//!
//! Given the drone position and a ground offset in meters, the target position
//! is found by solving the direct geodesic problem: start at the drone, head
//! along the offset's bearing and travel its length. The heavy lifting is done
//! by `geographiclib-rs`, a port of Karney's GeographicLib, which is accurate to
//! a few nanometers on the WGS84 ellipsoid.

use crate::geometry::MetricOffset;
use geographiclib_rs::{DirectGeodesic, Geodesic, InverseGeodesic};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Offsets shorter than this are treated as no displacement at all.
const ZERO_DISTANCE_EPS: f64 = 1e-9;

/// A latitude/longitude pair in decimal degrees on the WGS84 ellipsoid.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPosition {
    pub fn new(lat: f64, lng: f64) -> Self {
        GeoPosition { lat, lng }
    }

    /// Position reached by moving `offset` meters east/north from `self`.
    pub fn offset_by(&self, offset: &MetricOffset) -> GeoPosition {
        let (lat, lng) = calculate_new_coordinates(self.lat, self.lng, offset.east, offset.north);
        GeoPosition { lat, lng }
    }
}

impl fmt::Debug for GeoPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GeoPosition [lat: {:.8} lng: {:.8}]", self.lat, self.lng)
    }
}

/// Computes the coordinates reached from `(lat, lng)` by a ground offset.
///
/// The bearing is `atan2(east, north)`, measured clockwise from north, and the
/// distance is the offset's length. A zero offset returns the input unchanged.
/// Inputs are not validated: non-finite values come back as whatever the
/// geodesic solver makes of them.
///
/// ```rust
/// use drone_geolocate::geodesy::calculate_new_coordinates;
///
/// let (lat, lng) = calculate_new_coordinates(50.0, 19.0, 0.0, 10.0);
/// assert!(lat > 50.0);
/// assert!((lng - 19.0).abs() < 1e-9);
/// ```
pub fn calculate_new_coordinates(
    lat: f64,
    lng: f64,
    delta_x_meters: f64,
    delta_y_meters: f64,
) -> (f64, f64) {
    let distance = delta_x_meters.hypot(delta_y_meters);
    if distance < ZERO_DISTANCE_EPS {
        return (lat, lng);
    }

    let azimuth = delta_x_meters.atan2(delta_y_meters).to_degrees();
    Geodesic::wgs84().direct(lat, lng, azimuth, distance)
}

/// Solves the inverse geodesic problem between two positions.
///
/// Returns the distance in meters and the initial azimuth at `from` in
/// degrees, normalized to `[0, 360)`.
pub fn distance_and_bearing(from: &GeoPosition, to: &GeoPosition) -> (f64, f64) {
    let (distance, azimuth, _, _): (f64, f64, f64, f64) =
        Geodesic::wgs84().inverse(from.lat, from.lng, to.lat, to.lng);
    (distance, azimuth.rem_euclid(360.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const LAT: f64 = 50.0;
    const LNG: f64 = 19.0;

    #[test]
    fn test_zero_offset_is_identity() {
        let (lat, lng) = calculate_new_coordinates(LAT, LNG, 0.0, 0.0);
        assert_eq!((lat, lng), (LAT, LNG));

        let (lat, lng) = calculate_new_coordinates(-33.8688, 151.2093, 1e-12, -1e-12);
        assert_eq!((lat, lng), (-33.8688, 151.2093));
    }

    #[test]
    fn test_cardinal_directions() {
        // (dx, dy, expected lat change, expected lng change)
        let cases = [
            (0.0, 10.0, 1, 0),
            (0.0, -10.0, -1, 0),
            (10.0, 0.0, 0, 1),
            (-10.0, 0.0, 0, -1),
        ];

        for (dx, dy, lat_rel, lng_rel) in cases {
            let (new_lat, new_lng) = calculate_new_coordinates(LAT, LNG, dx, dy);

            match lat_rel {
                0 => assert_abs_diff_eq!(new_lat, LAT, epsilon = 1e-6),
                1 => assert!(new_lat > LAT, "({dx}, {dy}): {new_lat}"),
                _ => assert!(new_lat < LAT, "({dx}, {dy}): {new_lat}"),
            }
            match lng_rel {
                0 => assert_abs_diff_eq!(new_lng, LNG, epsilon = 1e-6),
                1 => assert!(new_lng > LNG, "({dx}, {dy}): {new_lng}"),
                _ => assert!(new_lng < LNG, "({dx}, {dy}): {new_lng}"),
            }

            let origin = GeoPosition::new(LAT, LNG);
            let target = GeoPosition::new(new_lat, new_lng);
            let (distance, _) = distance_and_bearing(&origin, &target);
            assert_abs_diff_eq!(distance, dx.hypot(dy), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_distance_and_bearing() {
        let (dx, dy) = (30.0, 40.0);
        let origin = GeoPosition::new(LAT, LNG);
        let target = origin.offset_by(&MetricOffset::new(dx, dy));

        let (distance, bearing) = distance_and_bearing(&origin, &target);
        assert_abs_diff_eq!(distance, 50.0, epsilon = 1e-6);

        let expected = f64::atan2(dx, dy).to_degrees().rem_euclid(360.0);
        assert_abs_diff_eq!(bearing, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_bearing_is_normalized() {
        let origin = GeoPosition::new(LAT, LNG);
        let target = origin.offset_by(&MetricOffset::new(-25.0, -25.0));

        let (distance, bearing) = distance_and_bearing(&origin, &target);
        assert_abs_diff_eq!(distance, 25.0 * 2f64.sqrt(), epsilon = 1e-6);
        assert_abs_diff_eq!(bearing, 225.0, epsilon = 1e-6);
    }
}
