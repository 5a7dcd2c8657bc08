//! Implements the Radial-Tangential (RadTan) camera model.
//!
//! This is the Brown-Conrady lens model used by OpenCV calibration: a camera
//! matrix plus the distortion vector `[k1, k2, p1, p2, k3]`. The geolocation
//! pipeline uses it to undo lens distortion before projecting a detection onto
//! the ground plane.

use crate::camera::pinhole::{parse_intrinsics, parse_resolution, yaml_f64};
use crate::camera::{validation, CameraModel, CameraModelError, Intrinsics, Resolution};
use log::debug;
use nalgebra::{DVector, Matrix2, Matrix3, Vector2};
use serde::{Deserialize, Serialize};
use std::{fmt, fs, io::Write};
use yaml_rust::YamlLoader;

/// Convergence threshold for the iterative undistortion, in normalized units.
const UNDISTORT_EPS: f64 = 1e-9;
const UNDISTORT_MAX_ITERATIONS: u32 = 100;

/// Represents a Radial-Tangential (RadTan) camera model.
///
/// The distortion coefficients are stored in OpenCV order:
/// *   `k1`, `k2`, `k3`: Radial distortion coefficients.
/// *   `p1`, `p2`: Tangential distortion coefficients.
///
/// # Examples
///
/// ```rust
/// use nalgebra::Matrix3;
/// use drone_geolocate::camera::{CameraModel, RadTanModel, Resolution};
///
/// let camera_matrix = Matrix3::new(
///     4955.0, 0.0, 2736.0,
///     0.0, 4955.0, 1824.0,
///     0.0, 0.0, 1.0,
/// );
/// let resolution = Resolution { width: 5472, height: 3648 };
/// let model = RadTanModel::from_camera_matrix(&camera_matrix, &[0.0; 5], resolution).unwrap();
///
/// assert_eq!(model.intrinsics.fx, 4955.0);
/// assert_eq!(model.camera_matrix(), camera_matrix);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct RadTanModel {
    /// The intrinsic parameters of the camera, [`Intrinsics`] (fx, fy, cx, cy).
    pub intrinsics: Intrinsics,
    /// The resolution of the calibration images, [`Resolution`] (width, height).
    pub resolution: Resolution,
    /// The 5 distortion coefficients: `[k1, k2, p1, p2, k3]`.
    pub distortions: [f64; 5],
}

impl RadTanModel {
    /// Creates a new [`RadTanModel`] from `fx, fy, cx, cy, k1, k2, p1, p2, k3`.
    ///
    /// The resolution is initialized to 0x0, which disables pixel bounds checks
    /// until it is set.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::InvalidParams`] if fewer than nine parameters are given.
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    pub fn new(parameters: &DVector<f64>) -> Result<Self, CameraModelError> {
        if parameters.len() < 9 {
            return Err(CameraModelError::InvalidParams(format!(
                "RadTan model needs 9 parameters, got {}",
                parameters.len()
            )));
        }

        let model = RadTanModel {
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
            distortions: [
                parameters[4], // k1
                parameters[5], // k2
                parameters[6], // p1
                parameters[7], // p2
                parameters[8], // k3
            ],
        };

        model.validate_params()?;
        Ok(model)
    }

    /// Creates a model from an OpenCV camera matrix and distortion vector.
    ///
    /// `dist_coeffs` may hold 4 (`k1, k2, p1, p2`) or 5 coefficients; a missing
    /// `k3` is taken as zero.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::SingularCameraMatrix`] if the matrix cannot be inverted.
    /// * [`CameraModelError::InvalidParams`] for a skewed or non-affine matrix, or
    ///   an unsupported number of coefficients.
    pub fn from_camera_matrix(
        camera_matrix: &Matrix3<f64>,
        dist_coeffs: &[f64],
        resolution: Resolution,
    ) -> Result<Self, CameraModelError> {
        let intrinsics = validation::intrinsics_from_matrix(camera_matrix)?;
        let distortions = distortions_from_slice(dist_coeffs)?;

        let model = RadTanModel {
            intrinsics,
            resolution,
            distortions,
        };
        model.validate_params()?;
        Ok(model)
    }

    /// Applies the forward distortion to normalized coordinates.
    pub fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        let [k1, k2, p1, p2, k3] = self.distortions;
        let x = point.x;
        let y = point.y;

        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + k1 * r2 + k2 * r4 + k3 * r6;

        Vector2::new(
            x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x),
            y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y,
        )
    }

    /// Jacobian of [`RadTanModel::distort`] with respect to the undistorted point.
    fn distort_jacobian(&self, point: &Vector2<f64>) -> Matrix2<f64> {
        let [k1, k2, p1, p2, k3] = self.distortions;
        let x = point.x;
        let y = point.y;

        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + k1 * r2 + k2 * r4 + k3 * r6;
        // d(radial)/d(r2)
        let d_radial = k1 + 2.0 * k2 * r2 + 3.0 * k3 * r4;

        let j00 = radial + 2.0 * x * x * d_radial + 2.0 * p1 * y + 6.0 * p2 * x;
        let j01 = 2.0 * x * y * d_radial + 2.0 * p1 * x + 2.0 * p2 * y;
        let j10 = 2.0 * x * y * d_radial + 2.0 * p1 * x + 2.0 * p2 * y;
        let j11 = radial + 2.0 * y * y * d_radial + 6.0 * p1 * y + 2.0 * p2 * x;

        Matrix2::new(j00, j01, j10, j11)
    }

    fn has_distortion(&self) -> bool {
        self.distortions.iter().any(|&c| c != 0.0)
    }

    /// Rejects Newton roots past the distortion fold.
    ///
    /// Beyond the fold the radial factor turns negative and `distort` maps a
    /// point to the opposite side of the principal point, so a converged root
    /// there is the pixel mirrored across the image center.
    fn check_root(
        &self,
        point: Vector2<f64>,
        target: &Vector2<f64>,
    ) -> Result<Vector2<f64>, CameraModelError> {
        let [k1, k2, _, _, k3] = self.distortions;
        let r2 = point.norm_squared();
        let radial = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;
        if radial <= 0.0 || point.dot(target) < 0.0 {
            return Err(CameraModelError::NumericalError(format!(
                "Undistorted point {:?} lies beyond the distortion fold (radial factor {})",
                point, radial
            )));
        }
        Ok(point)
    }
}

fn distortions_from_slice(dist_coeffs: &[f64]) -> Result<[f64; 5], CameraModelError> {
    match dist_coeffs.len() {
        4 | 5 => {
            let mut distortions = [0.0; 5];
            distortions[..dist_coeffs.len()].copy_from_slice(dist_coeffs);
            Ok(distortions)
        }
        n => Err(CameraModelError::InvalidParams(format!(
            "Expected 4 or 5 distortion coefficients, got {n}"
        ))),
    }
}

impl fmt::Debug for RadTanModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RadTanModel [fx: {} fy: {} cx: {} cy: {} distortions: {:?}]",
            self.intrinsics.fx,
            self.intrinsics.fy,
            self.intrinsics.cx,
            self.intrinsics.cy,
            self.distortions,
        )
    }
}

impl CameraModel for RadTanModel {
    /// Removes lens distortion from a pixel and returns normalized coordinates.
    ///
    /// The pixel is first normalized with the camera matrix, giving the
    /// distorted point `pd`. Newton's method then solves `distort(p) = pd`,
    /// starting from `p = pd`.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::PointIsOutSideImage`]: If the resolution is known and
    ///   the pixel falls outside it.
    /// * [`CameraModelError::NumericalError`]: If the Jacobian becomes singular,
    ///   the iteration does not converge, or the only root found lies beyond
    ///   the distortion fold.
    fn undistort_point(&self, point_2d: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError> {
        validation::validate_pixel(&self.resolution, point_2d)?;

        let target = Vector2::new(
            (point_2d.x - self.intrinsics.cx) / self.intrinsics.fx,
            (point_2d.y - self.intrinsics.cy) / self.intrinsics.fy,
        );

        if !self.has_distortion() {
            return Ok(target);
        }

        let mut point = target;

        for iteration in 0..UNDISTORT_MAX_ITERATIONS {
            let error = self.distort(&point) - target;
            if error.norm() < UNDISTORT_EPS {
                debug!(
                    "Undistorted {:?} -> {:?} after {} iterations",
                    point_2d, point, iteration
                );
                return self.check_root(point, &target);
            }

            let jacobian = self.distort_jacobian(&point);
            let delta = jacobian.try_inverse().ok_or_else(|| {
                CameraModelError::NumericalError("Jacobian is singular".to_string())
            })? * error;

            point -= delta;

            if delta.norm() < UNDISTORT_EPS {
                debug!(
                    "Undistorted {:?} -> {:?} after {} iterations",
                    point_2d,
                    point,
                    iteration + 1
                );
                return self.check_root(point, &target);
            }
        }

        Err(CameraModelError::NumericalError(format!(
            "Undistortion did not converge after {UNDISTORT_MAX_ITERATIONS} iterations"
        )))
    }

    /// Loads RadTan camera parameters from a Kalibr-style YAML file.
    ///
    /// Expected layout:
    ///
    /// ```yaml
    /// cam0:
    ///   camera_model: rad_tan
    ///   intrinsics: [fx, fy, cx, cy]
    ///   distortion: [k1, k2, p1, p2, k3]
    ///   resolution: [width, height]
    /// ```
    ///
    /// A four-element `distortion` entry is accepted with `k3 = 0`.
    fn load_from_yaml(path: &str) -> Result<Self, CameraModelError> {
        let contents = fs::read_to_string(path)?;
        let docs = YamlLoader::load_from_str(&contents)?;
        let doc = docs
            .first()
            .ok_or_else(|| CameraModelError::InvalidParams("Empty YAML document".to_string()))?;

        let intrinsics_yaml = doc["cam0"]["intrinsics"]
            .as_vec()
            .ok_or_else(|| CameraModelError::InvalidParams("Invalid intrinsics".to_string()))?;
        let resolution_yaml = doc["cam0"]["resolution"]
            .as_vec()
            .ok_or_else(|| CameraModelError::InvalidParams("Invalid resolution".to_string()))?;
        let distortion_node = doc["cam0"]["distortion"].as_vec().ok_or_else(|| {
            CameraModelError::InvalidParams("Missing distortion parameters".to_string())
        })?;

        let coefficients = distortion_node
            .iter()
            .enumerate()
            .map(|(i, param)| {
                yaml_f64(param).ok_or_else(|| {
                    CameraModelError::InvalidParams(format!(
                        "Invalid distortion parameter at index {i}"
                    ))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let model = RadTanModel {
            intrinsics: parse_intrinsics(intrinsics_yaml)?,
            resolution: parse_resolution(resolution_yaml)?,
            distortions: distortions_from_slice(&coefficients)?,
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
                    serde_yaml::Value::String("rad_tan".to_string()),
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
                    serde_yaml::Value::String("distortion".to_string()),
                    serde_yaml::to_value(self.distortions.to_vec())?,
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
        validation::validate_intrinsics(&self.intrinsics)?;
        if self.distortions.iter().any(|c| !c.is_finite()) {
            return Err(CameraModelError::InvalidParams(
                "Distortion coefficients must be finite".to_string(),
            ));
        }
        Ok(())
    }

    fn get_resolution(&self) -> Resolution {
        self.resolution
    }

    fn get_intrinsics(&self) -> Intrinsics {
        self.intrinsics.clone()
    }

    /// Returns `[k1, k2, p1, p2, k3]`.
    fn get_distortion(&self) -> Vec<f64> {
        self.distortions.to_vec()
    }
}
