//! Per-camera calibration JSON (`mtx`, `dist`, `rvecs`, `tvecs`)

use std::path::{Path, PathBuf};

use mvp_core::{CalibrationParams, CameraId, CameraRig, PipelineConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::json::read_json;

/// Number or arbitrarily nested array of numbers, as numpy dumps them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Scalar(f64),
    Nested(Vec<Numeric>),
}

impl Numeric {
    /// All scalars in row-major order
    pub fn flatten(&self) -> Vec<f64> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<f64>) {
        match self {
            Numeric::Scalar(v) => out.push(*v),
            Numeric::Nested(items) => items.iter().for_each(|i| i.flatten_into(out)),
        }
    }

    /// Top-level elements, each flattened
    pub fn rows(&self) -> Vec<Vec<f64>> {
        match self {
            Numeric::Scalar(_) => Vec::new(),
            Numeric::Nested(items) => items.iter().map(Numeric::flatten).collect(),
        }
    }
}

/// On-disk calibration of a single camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFile {
    pub mtx: Numeric,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<Numeric>,
    pub rvecs: Numeric,
    pub tvecs: Numeric,
}

impl CalibrationFile {
    /// Convert to loader-neutral values; a missing `dist` uses `default_dist`
    pub fn into_params(self, default_dist: &[f64; 5]) -> CalibrationParams {
        CalibrationParams {
            mtx: self.mtx.rows(),
            dist: self
                .dist
                .map_or_else(|| default_dist.to_vec(), |d| d.flatten()),
            rvec: self.rvecs.flatten(),
            tvec: self.tvecs.flatten(),
        }
    }
}

/// `<root>/cam_<id>/calib/camera_calib.json`
pub fn calibration_path(root: &Path, camera: CameraId) -> PathBuf {
    root.join(format!("cam_{camera}"))
        .join("calib")
        .join("camera_calib.json")
}

pub fn load_calibration(path: &Path, default_dist: &[f64; 5]) -> Result<CalibrationParams> {
    let file: CalibrationFile = read_json(path)?;
    debug!(path = %path.display(), "calibration loaded");
    Ok(file.into_params(default_dist))
}

/// Load and validate every configured camera; any failure aborts
pub fn load_rig(config: &PipelineConfig) -> Result<CameraRig> {
    let mut params = Vec::with_capacity(config.camera_ids.len());
    for &id in &config.camera_ids {
        let path = calibration_path(&config.calibration_root, id);
        let p = load_calibration(&path, &config.default_distortion)?;
        params.push((id, p));
    }

    let rig = CameraRig::from_params(params)?;
    info!(cameras = rig.len(), root = %config.calibration_root.display(), "camera rig loaded");
    Ok(rig)
}

/// Serialize a camera back to the calibration layout
pub fn to_calibration_file(camera: &mvp_core::Camera) -> CalibrationFile {
    let k = camera.intrinsics();
    CalibrationFile {
        mtx: Numeric::Nested((0..3).map(|r| nested(&[k[(r, 0)], k[(r, 1)], k[(r, 2)]])).collect()),
        dist: Some(nested(&camera.distortion().coefficients())),
        rvecs: nested(camera.rotation_vector().as_slice()),
        tvecs: nested(camera.translation().as_slice()),
    }
}

fn nested(values: &[f64]) -> Numeric {
    Numeric::Nested(values.iter().map(|x| Numeric::Scalar(*x)).collect())
}
