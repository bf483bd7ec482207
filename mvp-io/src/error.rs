use std::path::PathBuf;

use mvp_core::MvpError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Image probe error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Core(#[from] MvpError),
}

pub type Result<T> = std::result::Result<T, IoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use mvp_core::CalibrationError;

    #[test]
    fn test_io_error_display() {
        let err = IoError::InvalidInput("missing images".to_string());
        assert_eq!(err.to_string(), "Invalid input: missing images");
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: IoError = MvpError::from(CalibrationError::SingularIntrinsics).into();
        assert_eq!(
            err.to_string(),
            "Invalid calibration: Intrinsic matrix is not invertible"
        );
    }

    #[test]
    fn test_read_error_names_path() {
        let err = IoError::Read {
            path: PathBuf::from("cam_2/calib/camera_calib.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to read cam_2/calib/camera_calib.json: not found"
        );
    }
}
