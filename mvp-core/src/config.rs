use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{MvpError, Result};
use crate::observation::{CameraId, Visibility};
use crate::triangulate::DEFAULT_MIN_VIEWS;

/// Options recognized by the pipeline entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding `cam_<id>/calib/camera_calib.json`
    pub calibration_root: PathBuf,
    pub camera_ids: Vec<CameraId>,
    /// Visible views needed before a joint is triangulated
    pub min_views: usize,
    /// Used when a calibration omits `dist`
    pub default_distortion: [f64; 5],
    /// Ground-truth keypoints below this flag are not scored
    pub score_min_visibility: Visibility,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            calibration_root: PathBuf::from("camera_data"),
            camera_ids: vec![2, 5, 8, 13],
            min_views: DEFAULT_MIN_VIEWS,
            default_distortion: [0.0; 5],
            score_min_visibility: Visibility::Absent,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_views < DEFAULT_MIN_VIEWS {
            return Err(MvpError::InvalidInput(format!(
                "min_views must be at least {DEFAULT_MIN_VIEWS}, got {}",
                self.min_views
            )));
        }
        if self.camera_ids.is_empty() {
            return Err(MvpError::InvalidInput("camera_ids is empty".to_string()));
        }
        if self.default_distortion.iter().any(|c| !c.is_finite()) {
            return Err(MvpError::InvalidInput(
                "default_distortion contains a non-finite value".to_string(),
            ));
        }
        Ok(())
    }
}
