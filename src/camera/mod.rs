//! Camera models used to turn image pixels into normalized camera-plane rays.
//!
//! Every model implements [`CameraModel`]. The geolocation pipeline only needs
//! one operation from a camera: map a distorted pixel to the undistorted
//! normalized coordinates an ideal pinhole lens would have produced. The
//! models are plain values that callers load once (usually from a calibration
//! YAML) and pass explicitly to every projection call.

use nalgebra::{Matrix3, Vector2};
use serde::{Deserialize, Serialize};

pub mod pinhole;
pub mod rad_tan;

pub use pinhole::PinholeModel;
pub use rad_tan::RadTanModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    /// Builds the 3x3 camera matrix `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// A zero-sized resolution means "unknown" and disables bounds checks.
    pub fn is_known(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn contains(&self, point: &Vector2<f64>) -> bool {
        point.x >= 0.0
            && point.x < self.width as f64
            && point.y >= 0.0
            && point.y < self.height as f64
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CameraModelError {
    #[error("Input point is outside the image")]
    PointIsOutSideImage,
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Camera matrix is not invertible")]
    SingularCameraMatrix,
    #[error("Numerical error in computation: {0}")]
    NumericalError(String),
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for CameraModelError {
    fn from(err: std::io::Error) -> Self {
        CameraModelError::IOError(err.to_string())
    }
}

impl From<yaml_rust::ScanError> for CameraModelError {
    fn from(err: yaml_rust::ScanError) -> Self {
        CameraModelError::YamlError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CameraModelError {
    fn from(err: serde_yaml::Error) -> Self {
        CameraModelError::YamlError(err.to_string())
    }
}

/// Trait defining the core functionality for camera models
pub trait CameraModel {
    /// Map a pixel to undistorted normalized camera-plane coordinates.
    ///
    /// The result is centered on the principal point and scaled by the focal
    /// length, i.e. `(X/Z, Y/Z)` of the ray that produced the pixel.
    fn undistort_point(&self, point_2d: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError>;

    /// Load camera parameters from a YAML file
    fn load_from_yaml(path: &str) -> Result<Self, CameraModelError>
    where
        Self: Sized;

    /// Save camera parameters to a YAML file
    fn save_to_yaml(&self, path: &str) -> Result<(), CameraModelError>;

    /// Validate camera parameters
    fn validate_params(&self) -> Result<(), CameraModelError>;

    fn get_resolution(&self) -> Resolution;

    fn get_intrinsics(&self) -> Intrinsics;

    fn get_distortion(&self) -> Vec<f64>;

    /// The 3x3 camera matrix in OpenCV layout.
    fn camera_matrix(&self) -> Matrix3<f64> {
        self.get_intrinsics().to_matrix()
    }
}

/// Common validation functions for camera parameters
pub mod validation {
    use super::*;

    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), CameraModelError> {
        if intrinsics.fx <= 0.0
            || intrinsics.fy <= 0.0
            || !intrinsics.fx.is_finite()
            || !intrinsics.fy.is_finite()
        {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CameraModelError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }

    /// Rejects pixels outside a known resolution.
    pub fn validate_pixel(
        resolution: &Resolution,
        point_2d: &Vector2<f64>,
    ) -> Result<(), CameraModelError> {
        if resolution.is_known() && !resolution.contains(point_2d) {
            return Err(CameraModelError::PointIsOutSideImage);
        }
        Ok(())
    }

    /// Splits an OpenCV-style camera matrix into [`Intrinsics`].
    ///
    /// The matrix must be invertible, have `(0, 0, 1)` as its last row and no
    /// skew term.
    pub fn intrinsics_from_matrix(matrix: &Matrix3<f64>) -> Result<Intrinsics, CameraModelError> {
        if matrix.try_inverse().is_none() {
            return Err(CameraModelError::SingularCameraMatrix);
        }
        if matrix[(2, 0)] != 0.0 || matrix[(2, 1)] != 0.0 || matrix[(2, 2)] != 1.0 {
            return Err(CameraModelError::InvalidParams(
                "Camera matrix last row must be [0, 0, 1]".to_string(),
            ));
        }
        if matrix[(0, 1)] != 0.0 || matrix[(1, 0)] != 0.0 {
            return Err(CameraModelError::InvalidParams(
                "Skewed camera matrices are not supported".to_string(),
            ));
        }

        let intrinsics = Intrinsics {
            fx: matrix[(0, 0)],
            fy: matrix[(1, 1)],
            cx: matrix[(0, 2)],
            cy: matrix[(1, 2)],
        };
        validate_intrinsics(&intrinsics)?;
        Ok(intrinsics)
    }
}
