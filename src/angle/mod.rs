//! Decimal degrees and degree/minute/second conversions.
//!
//! Drone photos usually carry their GPS position as degree/minute/second
//! rationals in the image metadata, while the geodesic code works in decimal
//! degrees. [`degrees_to_dms`] and [`dms_to_degrees`] convert between the two.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places kept on the seconds field.
const SECONDS_PRECISION: i32 = 6;

/// Sign of an angle, kept separately so that `-0° 30'` survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn factor(self) -> f64 {
        match self {
            Sign::Positive => 1.0,
            Sign::Negative => -1.0,
        }
    }
}

/// An angle split into sign, whole degrees, whole minutes and seconds.
///
/// Values produced by [`degrees_to_dms`] satisfy `0 <= minutes < 60` and
/// `0 <= seconds < 60`. Whole degrees are held in a `u64`, so magnitudes far
/// beyond one turn still round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dms {
    pub sign: Sign,
    pub degrees: u64,
    pub minutes: u32,
    pub seconds: f64,
}

impl Dms {
    /// Builds a latitude/longitude from metadata fields and a hemisphere letter.
    ///
    /// `N` and `E` are positive, `S` and `W` negative. Returns `None` for any
    /// other reference letter.
    pub fn from_hemisphere(
        degrees: u64,
        minutes: u32,
        seconds: f64,
        reference: char,
    ) -> Option<Self> {
        let sign = match reference.to_ascii_uppercase() {
            'N' | 'E' => Sign::Positive,
            'S' | 'W' => Sign::Negative,
            _ => return None,
        };
        Some(Dms {
            sign,
            degrees,
            minutes,
            seconds,
        })
    }

    pub fn to_degrees(&self) -> f64 {
        dms_to_degrees(self.sign, self.degrees, self.minutes, self.seconds)
    }
}

impl fmt::Display for Dms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.sign {
            Sign::Positive => "",
            Sign::Negative => "-",
        };
        write!(
            f,
            "{}{}°{:02}'{:09.6}\"",
            sign, self.degrees, self.minutes, self.seconds
        )
    }
}

/// Splits decimal degrees into sign, degrees, minutes and seconds.
///
/// Seconds are rounded to six decimal places. A rounded value of 60 seconds
/// carries into the minutes, and 60 minutes carry into the degrees.
///
/// ```rust
/// use drone_geolocate::angle::{degrees_to_dms, Sign};
///
/// let dms = degrees_to_dms(-15.5);
/// assert_eq!(dms.sign, Sign::Negative);
/// assert_eq!((dms.degrees, dms.minutes, dms.seconds), (15, 30, 0.0));
/// ```
pub fn degrees_to_dms(degrees: f64) -> Dms {
    let sign = if degrees < 0.0 {
        Sign::Negative
    } else {
        Sign::Positive
    };
    let magnitude = degrees.abs();

    let mut d = magnitude.trunc() as u64;
    let minutes_decimal = magnitude.fract() * 60.0;
    let mut m = minutes_decimal.trunc() as u32;
    let scale = 10f64.powi(SECONDS_PRECISION);
    let mut s = (minutes_decimal.fract() * 60.0 * scale).round() / scale;

    if s >= 60.0 {
        s = 0.0;
        m += 1;
    }
    if m >= 60 {
        m = 0;
        d += 1;
    }

    Dms {
        sign,
        degrees: d,
        minutes: m,
        seconds: s,
    }
}

/// Joins sign, degrees, minutes and seconds into decimal degrees.
pub fn dms_to_degrees(sign: Sign, degrees: u64, minutes: u32, seconds: f64) -> f64 {
    sign.factor() * (degrees as f64 + minutes as f64 / 60.0 + seconds / 3600.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_round_trip_degrees_to_dms_and_back() {
        for deg in [0.0, -15.5, 37.7749, 179.9999, 179.999999, -122.4194, 0.000001] {
            let dms = degrees_to_dms(deg);
            assert_abs_diff_eq!(dms.to_degrees(), deg, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_seconds_carry_into_degrees() {
        let dms = degrees_to_dms(179.9999999999);
        assert_eq!(dms.sign, Sign::Positive);
        assert_eq!(dms.degrees, 180);
        assert_eq!(dms.minutes, 0);
        assert_eq!(dms.seconds, 0.0);
    }

    #[test]
    fn test_seconds_carry_into_minutes() {
        // 10° 29' 59.9999999"
        let dms = degrees_to_dms(10.0 + 29.0 / 60.0 + 59.999_999_9 / 3600.0);
        assert_eq!((dms.degrees, dms.minutes, dms.seconds), (10, 30, 0.0));
    }

    #[test]
    fn test_sign_handling() {
        let dms = degrees_to_dms(-15.5);
        assert_eq!(dms.sign, Sign::Negative);
        assert_eq!((dms.degrees, dms.minutes, dms.seconds), (15, 30, 0.0));
    }

    #[test]
    fn test_sub_degree_inputs() {
        let half = degrees_to_dms(0.5);
        assert_eq!(half.sign, Sign::Positive);
        assert_eq!((half.degrees, half.minutes, half.seconds), (0, 30, 0.0));

        let negative = degrees_to_dms(-0.75);
        assert_eq!(negative.sign, Sign::Negative);
        assert_eq!(
            (negative.degrees, negative.minutes, negative.seconds),
            (0, 45, 0.0)
        );
        assert_eq!(negative.to_degrees(), -0.75);
    }

    #[test]
    fn test_components_stay_in_range() {
        let mut deg = -180.0;
        while deg <= 180.0 {
            let dms = degrees_to_dms(deg);
            assert!(dms.minutes < 60, "{deg}: minutes {}", dms.minutes);
            assert!(
                (0.0..60.0).contains(&dms.seconds),
                "{deg}: seconds {}",
                dms.seconds
            );
            deg += 0.0137;
        }
    }

    #[test]
    fn test_large_magnitudes_keep_whole_degrees() {
        let dms = degrees_to_dms(5e9);
        assert_eq!(dms.degrees, 5_000_000_000);
        assert_eq!((dms.minutes, dms.seconds), (0, 0.0));
        assert_eq!(dms.to_degrees(), 5e9);

        let negative = degrees_to_dms(-7_200_000_000.5);
        assert_eq!(negative.sign, Sign::Negative);
        assert_eq!((negative.degrees, negative.minutes), (7_200_000_000, 30));
        assert_abs_diff_eq!(negative.to_degrees(), -7_200_000_000.5, epsilon = 1e-6);
    }

    #[test]
    fn test_from_hemisphere() {
        let lat = Dms::from_hemisphere(50, 3, 21.6, 'N').unwrap();
        let lng = Dms::from_hemisphere(19, 56, 24.0, 'w').unwrap();

        assert_abs_diff_eq!(lat.to_degrees(), 50.056, epsilon = 1e-9);
        assert_abs_diff_eq!(lng.to_degrees(), -19.94, epsilon = 1e-9);
        assert!(Dms::from_hemisphere(1, 2, 3.0, 'X').is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(degrees_to_dms(-15.5).to_string(), "-15°30'00.000000\"");
    }
}
