//! Implements the Pinhole camera model.
//!
//! This module provides the [`PinholeModel`] struct, an ideal distortion-free
//! camera. It is what [`RadTanModel`](crate::camera::RadTanModel) degenerates to
//! when all distortion coefficients are zero, and is handy for synthetic data
//! or for cameras whose images are already rectified on board.

use crate::camera::{validation, CameraModel, CameraModelError, Intrinsics, Resolution};
use nalgebra::{DVector, Vector2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use yaml_rust::YamlLoader;

/// Represents a Pinhole camera model.
///
/// # Examples
///
/// ```rust
/// use nalgebra::{DVector, Vector2};
/// use drone_geolocate::camera::{CameraModel, PinholeModel, Resolution};
///
/// let params = DVector::from_vec(vec![500.0, 500.0, 320.0, 240.0]); // fx, fy, cx, cy
/// let mut model = PinholeModel::new(&params).unwrap();
/// model.resolution = Resolution { width: 640, height: 480 };
///
/// let normalized = model.undistort_point(&Vector2::new(370.0, 340.0)).unwrap();
/// assert!((normalized.x - 0.1).abs() < 1e-12);
/// assert!((normalized.y - 0.2).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinholeModel {
    /// The intrinsic parameters of the camera, [`Intrinsics`] (fx, fy, cx, cy).
    pub intrinsics: Intrinsics,
    /// The resolution of the camera image, [`Resolution`] (width, height).
    pub resolution: Resolution,
}

impl PinholeModel {
    /// Creates a new [`PinholeModel`] from `fx, fy, cx, cy`.
    ///
    /// The resolution is initialized to 0x0, which disables pixel bounds checks
    /// until it is set.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::InvalidParams`] if fewer than four parameters are given.
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    pub fn new(parameters: &DVector<f64>) -> Result<Self, CameraModelError> {
        if parameters.len() < 4 {
            return Err(CameraModelError::InvalidParams(format!(
                "Pinhole model needs 4 parameters, got {}",
                parameters.len()
            )));
        }

        let model = PinholeModel {
            intrinsics: Intrinsics {
                fx: parameters[0],
                fy: parameters[1],
                cx: parameters[2],
                cy: parameters[3],
            },
            resolution: Resolution {
                width: 0,
                height: 0,
            },
        };

        model.validate_params()?;

        Ok(model)
    }
}

impl CameraModel for PinholeModel {
    /// Applies the inverse pinhole equations:
    /// `xn = (u - cx) / fx`, `yn = (v - cy) / fy`.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::PointIsOutSideImage`]: If the resolution is known and
    ///   the pixel falls outside it.
    fn undistort_point(&self, point_2d: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError> {
        validation::validate_pixel(&self.resolution, point_2d)?;

        let mx = (point_2d.x - self.intrinsics.cx) / self.intrinsics.fx;
        let my = (point_2d.y - self.intrinsics.cy) / self.intrinsics.fy;

        Ok(Vector2::new(mx, my))
    }

    /// Loads camera parameters from a Kalibr-style YAML file with a `cam0`
    /// entry holding `intrinsics: [fx, fy, cx, cy]` and `resolution: [w, h]`.
    fn load_from_yaml(path: &str) -> Result<Self, CameraModelError> {
        let contents = fs::read_to_string(path)?;
        let docs = YamlLoader::load_from_str(&contents)?;
        let doc = docs
            .first()
            .ok_or_else(|| CameraModelError::InvalidParams("Empty YAML document".to_string()))?;

        let intrinsics_yaml = doc["cam0"]["intrinsics"].as_vec().ok_or_else(|| {
            CameraModelError::InvalidParams("YAML missing 'intrinsics' or not an array".to_string())
        })?;
        let resolution_yaml = doc["cam0"]["resolution"].as_vec().ok_or_else(|| {
            CameraModelError::InvalidParams("YAML missing 'resolution' or not an array".to_string())
        })?;

        let model = PinholeModel {
            intrinsics: parse_intrinsics(intrinsics_yaml)?,
            resolution: parse_resolution(resolution_yaml)?,
        };

        model.validate_params()?;

        Ok(model)
    }

    fn save_to_yaml(&self, path: &str) -> Result<(), CameraModelError> {
        let yaml = serde_yaml::to_value(serde_yaml::Mapping::from_iter([(
            serde_yaml::Value::String("cam0".to_string()),
            serde_yaml::to_value(serde_yaml::Mapping::from_iter([
                (
                    serde_yaml::Value::String("camera_model".to_string()),
                    serde_yaml::Value::String("pinhole".to_string()),
                ),
                (
                    serde_yaml::Value::String("intrinsics".to_string()),
                    serde_yaml::to_value(vec![
                        self.intrinsics.fx,
                        self.intrinsics.fy,
                        self.intrinsics.cx,
                        self.intrinsics.cy,
                    ])?,
                ),
                (
                    serde_yaml::Value::String("resolution".to_string()),
                    serde_yaml::to_value(vec![self.resolution.width, self.resolution.height])?,
                ),
            ]))?,
        )]))?;

        let yaml_string = serde_yaml::to_string(&yaml)?;

        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;

        Ok(())
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)
    }

    fn get_resolution(&self) -> Resolution {
        self.resolution
    }

    fn get_intrinsics(&self) -> Intrinsics {
        self.intrinsics.clone()
    }

    /// The pinhole model has no distortion parameters.
    fn get_distortion(&self) -> Vec<f64> {
        vec![]
    }
}

/// Reads `[fx, fy, cx, cy]` from a YAML sequence.
pub(crate) fn parse_intrinsics(
    intrinsics_yaml: &[yaml_rust::Yaml],
) -> Result<Intrinsics, CameraModelError> {
    if intrinsics_yaml.len() != 4 {
        return Err(CameraModelError::InvalidParams(format!(
            "Expected 4 intrinsic parameters, found {}",
            intrinsics_yaml.len()
        )));
    }
    let value = |i: usize, name: &str| {
        yaml_f64(&intrinsics_yaml[i])
            .ok_or_else(|| CameraModelError::InvalidParams(format!("Invalid {name}: not a float")))
    };

    Ok(Intrinsics {
        fx: value(0, "fx")?,
        fy: value(1, "fy")?,
        cx: value(2, "cx")?,
        cy: value(3, "cy")?,
    })
}

/// Reads `[width, height]` from a YAML sequence.
pub(crate) fn parse_resolution(
    resolution_yaml: &[yaml_rust::Yaml],
) -> Result<Resolution, CameraModelError> {
    if resolution_yaml.len() != 2 {
        return Err(CameraModelError::InvalidParams(format!(
            "Expected [width, height] resolution, found {} values",
            resolution_yaml.len()
        )));
    }
    let value = |i: usize, name: &str| {
        resolution_yaml[i]
            .as_i64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| {
                CameraModelError::InvalidParams(format!("Invalid {name}: not an integer"))
            })
    };

    Ok(Resolution {
        width: value(0, "width")?,
        height: value(1, "height")?,
    })
}

/// yaml-rust keeps `4955` and `4955.0` apart; calibration files use both.
pub(crate) fn yaml_f64(node: &yaml_rust::Yaml) -> Option<f64> {
    node.as_f64().or_else(|| node.as_i64().map(|v| v as f64))
}
