use thiserror::Error;

use crate::observation::CameraId;

/// Common errors across the triangulation pipeline
#[derive(Error, Debug)]
pub enum MvpError {
    #[error("Invalid calibration: {0}")]
    InvalidCalibration(#[from] CalibrationError),

    #[error("Unresolved association: {0}")]
    UnresolvedAssociation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("Intrinsic matrix must be 3x3, got {rows}x{cols}")]
    IntrinsicsShape { rows: usize, cols: usize },

    #[error("Intrinsic matrix is not invertible")]
    SingularIntrinsics,

    #[error("Expected {expected} elements for {field}, got {found}")]
    VectorLength {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("At most 5 distortion coefficients are supported, got {0}")]
    TooManyDistortionCoefficients(usize),

    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("No calibration for camera {0}")]
    MissingCamera(CameraId),
}

/// Why a joint could not be triangulated for a frame.
///
/// Never raised: the pipeline records a null point and counts the cause.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    #[error("Only {found} equation rows, at least {required} needed")]
    InsufficientViews { found: usize, required: usize },

    #[error("Homogeneous scale vanished")]
    DegenerateSolution,
}

pub type Result<T> = std::result::Result<T, MvpError>;
