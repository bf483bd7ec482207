use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::Point2;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;

use super::{Camera, CameraRig};
use crate::error::{CalibrationError, Result};
use crate::observation::CameraId;

/// Per-pixel undistortion lookup for one camera at one resolution.
///
/// `map_x[[row, col]]`, `map_y[[row, col]]` hold the undistorted pixel
/// coordinate of distorted pixel `(col, row)`.
#[derive(Debug, Clone)]
pub struct UndistortMap {
    camera: CameraId,
    map_x: Array2<f32>,
    map_y: Array2<f32>,
}

impl UndistortMap {
    pub(super) fn new(camera: CameraId, map_x: Array2<f32>, map_y: Array2<f32>) -> Self {
        debug_assert_eq!(map_x.dim(), map_y.dim());
        Self {
            camera,
            map_x,
            map_y,
        }
    }

    pub fn camera(&self) -> CameraId {
        self.camera
    }

    /// `(width, height)`
    pub fn size(&self) -> (usize, usize) {
        let (h, w) = self.map_x.dim();
        (w, h)
    }

    /// Undistorted coordinate of an in-bounds pixel; maps are never empty
    pub fn lookup(&self, col: usize, row: usize) -> Point2<f64> {
        Point2::new(
            f64::from(self.map_x[[row, col]]),
            f64::from(self.map_y[[row, col]]),
        )
    }

}

/// `(camera, width, height)`
pub type MapKey = (CameraId, u32, u32);

/// Undistortion maps built once per camera and resolution
#[derive(Debug, Default)]
pub struct UndistortMapCache {
    maps: HashMap<MapKey, Arc<UndistortMap>>,
}

impl UndistortMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &MapKey) -> Option<Arc<UndistortMap>> {
        self.maps.get(key).cloned()
    }

    /// Return the cached map, building it on first use
    pub fn get_or_build(
        &mut self,
        camera: &Camera,
        width: u32,
        height: u32,
    ) -> Result<Arc<UndistortMap>> {
        let key = (camera.id(), width, height);
        if let Some(map) = self.maps.get(&key) {
            return Ok(Arc::clone(map));
        }
        let map = Arc::new(camera.undistort_map(width, height)?);
        self.maps.insert(key, Arc::clone(&map));
        Ok(map)
    }

    /// Build every missing map in parallel across keys.
    ///
    /// Fails if a key names a camera the rig does not have.
    pub fn prebuild<I>(&mut self, rig: &CameraRig, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = MapKey>,
    {
        let mut missing: Vec<MapKey> = keys
            .into_iter()
            .filter(|k| !self.maps.contains_key(k))
            .collect();
        missing.sort_unstable();
        missing.dedup();

        for (camera, _, _) in &missing {
            if rig.get(*camera).is_none() {
                return Err(CalibrationError::MissingCamera(*camera).into());
            }
        }

        let built: Vec<(MapKey, UndistortMap)> = missing
            .par_iter()
            .filter_map(|&(camera, w, h)| {
                rig.get(camera)
                    .map(|cam| cam.undistort_map(w, h).map(|map| ((camera, w, h), map)))
            })
            .collect::<Result<_>>()?;

        let count = built.len();
        for (key, map) in built {
            debug!(camera = key.0, width = key.1, height = key.2, "built undistortion map");
            self.maps.insert(key, Arc::new(map));
        }
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}
