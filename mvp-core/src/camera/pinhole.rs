use nalgebra::{Matrix3, Matrix3x4, Point2, Point3, Rotation3, Vector3};
use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;

use super::distortion::{DistortionError, DistortionModel};
use super::remap::UndistortMap;
use crate::error::{CalibrationError, MvpError};
use crate::observation::CameraId;

/// Raw calibration values as handed over by a loader
#[derive(Debug, Clone, Default)]
pub struct CalibrationParams {
    /// Row-major intrinsic matrix
    pub mtx: Vec<Vec<f64>>,
    /// `[k1, k2, p1, p2, k3]`, possibly shorter
    pub dist: Vec<f64>,
    /// Rodrigues rotation vector, world to camera
    pub rvec: Vec<f64>,
    /// Translation vector, world to camera
    pub tvec: Vec<f64>,
}

/// Calibrated pinhole camera with Brown-Conrady distortion and world pose
///
/// Immutable once built: the rotation matrix and `P = K [R | T]` are
/// derived at construction.
#[derive(Debug, Clone)]
pub struct Camera {
    id: CameraId,
    intrinsics: Matrix3<f64>,
    intrinsics_inv: Matrix3<f64>,
    distortion: DistortionModel,
    rvec: Vector3<f64>,
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
    projection: Matrix3x4<f64>,
}

impl Camera {
    /// Create a camera from typed calibration values
    pub fn new(
        id: CameraId,
        intrinsics: Matrix3<f64>,
        distortion: DistortionModel,
        rvec: Vector3<f64>,
        tvec: Vector3<f64>,
    ) -> Result<Self, CalibrationError> {
        if intrinsics.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFinite("mtx"));
        }
        if rvec.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFinite("rvecs"));
        }
        if tvec.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFinite("tvecs"));
        }

        if intrinsics.determinant().abs() < 1e-12 {
            return Err(CalibrationError::SingularIntrinsics);
        }
        let intrinsics_inv = intrinsics
            .try_inverse()
            .ok_or(CalibrationError::SingularIntrinsics)?;

        // Rodrigues
        let rotation = Rotation3::new(rvec).into_inner();

        let mut rt = Matrix3x4::zeros();
        rt.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        rt.set_column(3, &tvec);

        Ok(Self {
            id,
            intrinsics,
            intrinsics_inv,
            distortion,
            rvec,
            rotation,
            translation: tvec,
            projection: intrinsics * rt,
        })
    }

    /// Create a camera from untyped loader values, validating every shape
    pub fn from_params(id: CameraId, params: &CalibrationParams) -> Result<Self, CalibrationError> {
        let rows = params.mtx.len();
        let cols = params.mtx.first().map_or(0, Vec::len);
        if rows != 3 || params.mtx.iter().any(|r| r.len() != 3) {
            return Err(CalibrationError::IntrinsicsShape { rows, cols });
        }
        let k = Matrix3::from_fn(|r, c| params.mtx[r][c]);

        let rvec = vector3("rvecs", &params.rvec)?;
        let tvec = vector3("tvecs", &params.tvec)?;
        let distortion = DistortionModel::from_coefficients(&params.dist)?;

        Self::new(id, k, distortion, rvec, tvec)
    }

    pub fn id(&self) -> CameraId {
        self.id
    }

    pub fn intrinsics(&self) -> &Matrix3<f64> {
        &self.intrinsics
    }

    pub fn distortion(&self) -> &DistortionModel {
        &self.distortion
    }

    pub fn rotation_vector(&self) -> &Vector3<f64> {
        &self.rvec
    }

    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// `P = K [R | T]`
    pub fn projection_matrix(&self) -> &Matrix3x4<f64> {
        &self.projection
    }

    /// Project a world point to distorted pixel coordinates.
    ///
    /// Points on or behind the image plane are still projected; a zero depth
    /// uses unit inverse depth so the result stays finite.
    pub fn project_point(&self, world: &Point3<f64>) -> Point2<f64> {
        let pc = self.rotation * world.coords + self.translation;
        let inv_z = if pc.z != 0.0 { 1.0 / pc.z } else { 1.0 };

        let (xd, yd) = self.distortion.distort(pc.x * inv_z, pc.y * inv_z);
        self.normalized_to_pixel(xd, yd)
    }

    /// Batched form of [`Camera::project_point`]
    pub fn project(&self, points: &[Point3<f64>]) -> Vec<Point2<f64>> {
        points.iter().map(|p| self.project_point(p)).collect()
    }

    /// Map a distorted pixel to the ideal pixel under the same intrinsics
    pub fn undistort_point(&self, pixel: &Point2<f64>) -> Result<Point2<f64>, DistortionError> {
        let n = self.intrinsics_inv * Vector3::new(pixel.x, pixel.y, 1.0);
        let (x, y) = self.distortion.undistort(n.x / n.z, n.y / n.z)?;
        Ok(self.normalized_to_pixel(x, y))
    }

    /// Dense map from each distorted pixel `(col, row)` to its undistorted
    /// pixel coordinate. Pixels whose inversion fails map to themselves.
    pub fn undistort_map(&self, width: u32, height: u32) -> Result<UndistortMap, MvpError> {
        if width == 0 || height == 0 {
            return Err(MvpError::InvalidInput(format!(
                "undistortion map for camera {} has empty size {width}x{height}",
                self.id
            )));
        }
        let (w, h) = (width as usize, height as usize);

        let rows: Vec<(Vec<f32>, Vec<f32>, usize)> = (0..h)
            .into_par_iter()
            .map(|row| {
                let mut xs = Vec::with_capacity(w);
                let mut ys = Vec::with_capacity(w);
                let mut failed = 0;
                for col in 0..w {
                    let pixel = Point2::new(col as f64, row as f64);
                    let p = self.undistort_point(&pixel).unwrap_or_else(|_| {
                        failed += 1;
                        pixel
                    });
                    xs.push(p.x as f32);
                    ys.push(p.y as f32);
                }
                (xs, ys, failed)
            })
            .collect();

        let mut map_x = Array2::<f32>::zeros((h, w));
        let mut map_y = Array2::<f32>::zeros((h, w));
        let mut failed = 0;
        for (row, (xs, ys, f)) in rows.into_iter().enumerate() {
            for col in 0..w {
                map_x[[row, col]] = xs[col];
                map_y[[row, col]] = ys[col];
            }
            failed += f;
        }

        if failed > 0 {
            debug!(camera = self.id, failed, "undistortion did not converge for some pixels");
        }

        Ok(UndistortMap::new(self.id, map_x, map_y))
    }

    fn normalized_to_pixel(&self, x: f64, y: f64) -> Point2<f64> {
        let p = self.intrinsics * Vector3::new(x, y, 1.0);
        Point2::new(p.x, p.y)
    }
}

fn vector3(field: &'static str, values: &[f64]) -> Result<Vector3<f64>, CalibrationError> {
    if values.len() != 3 {
        return Err(CalibrationError::VectorLength {
            field,
            expected: 3,
            found: values.len(),
        });
    }
    Ok(Vector3::new(values[0], values[1], values[2]))
}
