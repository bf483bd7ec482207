use std::collections::BTreeMap;

use super::{CalibrationParams, Camera};
use crate::error::{CalibrationError, Result};
use crate::observation::CameraId;

/// Read-only set of calibrated cameras keyed by id
#[derive(Debug, Clone, Default)]
pub struct CameraRig {
    cameras: BTreeMap<CameraId, Camera>,
}

impl CameraRig {
    pub fn new<I: IntoIterator<Item = Camera>>(cameras: I) -> Self {
        Self {
            cameras: cameras.into_iter().map(|c| (c.id(), c)).collect(),
        }
    }

    /// Validate and build every camera; the first invalid calibration aborts
    pub fn from_params<I>(params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (CameraId, CalibrationParams)>,
    {
        let cameras = params
            .into_iter()
            .map(|(id, p)| Camera::from_params(id, &p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(cameras))
    }

    pub fn get(&self, id: CameraId) -> Option<&Camera> {
        self.cameras.get(&id)
    }

    pub fn require(&self, id: CameraId) -> Result<&Camera> {
        self.get(id)
            .ok_or_else(|| CalibrationError::MissingCamera(id).into())
    }

    pub fn ids(&self) -> impl Iterator<Item = CameraId> + '_ {
        self.cameras.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Camera> + '_ {
        self.cameras.values()
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MvpError;

    fn params(fx: f64) -> CalibrationParams {
        CalibrationParams {
            mtx: vec![
                vec![fx, 0.0, 320.0],
                vec![0.0, fx, 240.0],
                vec![0.0, 0.0, 1.0],
            ],
            dist: Vec::new(),
            rvec: vec![0.0; 3],
            tvec: vec![0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn test_rig_from_params_sorted_ids() {
        let rig = CameraRig::from_params([(13, params(900.0)), (2, params(800.0))]).unwrap();
        assert_eq!(rig.len(), 2);
        assert_eq!(rig.ids().collect::<Vec<_>>(), vec![2, 13]);
        assert_eq!(rig.require(13).unwrap().intrinsics()[(0, 0)], 900.0);
    }

    #[test]
    fn test_rig_fails_fast_on_invalid_camera() {
        let mut bad = params(800.0);
        bad.tvec.clear();
        let result = CameraRig::from_params([(2, params(800.0)), (5, bad)]);
        assert!(matches!(result, Err(MvpError::InvalidCalibration(_))));
    }

    #[test]
    fn test_require_missing_camera() {
        let rig = CameraRig::default();
        assert!(rig.is_empty());
        assert!(matches!(
            rig.require(8),
            Err(MvpError::InvalidCalibration(CalibrationError::MissingCamera(8)))
        ));
    }
}
