use crate::error::CalibrationError;

/// Lens distortion applied in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistortionModel {
    None,
    /// Brown-Conrady radial/tangential model, OpenCV coefficient order
    BrownConrady {
        k1: f64,
        k2: f64,
        p1: f64,
        p2: f64,
        k3: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DistortionError {
    SingularJacobian,
    NonConvergent,
}

type Result<T> = std::result::Result<T, DistortionError>;

const MAX_ITERATIONS: usize = 20;
const TOLERANCE: f64 = 1e-12;

impl DistortionModel {
    /// Build from `[k1, k2, p1, p2, k3]`; shorter vectors are zero-padded
    pub fn from_coefficients(coeffs: &[f64]) -> std::result::Result<Self, CalibrationError> {
        if coeffs.len() > 5 {
            return Err(CalibrationError::TooManyDistortionCoefficients(coeffs.len()));
        }
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(CalibrationError::NonFinite("dist"));
        }

        let mut c = [0.0; 5];
        c[..coeffs.len()].copy_from_slice(coeffs);

        if c.iter().all(|v| *v == 0.0) {
            return Ok(DistortionModel::None);
        }

        let [k1, k2, p1, p2, k3] = c;
        Ok(DistortionModel::BrownConrady { k1, k2, p1, p2, k3 })
    }

    /// Coefficients in `[k1, k2, p1, p2, k3]` order
    pub fn coefficients(&self) -> [f64; 5] {
        match *self {
            DistortionModel::None => [0.0; 5],
            DistortionModel::BrownConrady { k1, k2, p1, p2, k3 } => [k1, k2, p1, p2, k3],
        }
    }

    /// Apply distortion to normalized image coordinates
    pub fn distort(&self, x_norm: f64, y_norm: f64) -> (f64, f64) {
        match *self {
            DistortionModel::None => (x_norm, y_norm),

            DistortionModel::BrownConrady { k1, k2, p1, p2, k3 } => {
                let r2 = x_norm * x_norm + y_norm * y_norm;
                let r4 = r2 * r2;
                let r6 = r4 * r2;

                let radial = 1.0 + k1 * r2 + k2 * r4 + k3 * r6;

                let x_dist = x_norm * radial
                    + 2.0 * p1 * x_norm * y_norm
                    + p2 * (r2 + 2.0 * x_norm * x_norm);

                let y_dist = y_norm * radial
                    + p1 * (r2 + 2.0 * y_norm * y_norm)
                    + 2.0 * p2 * x_norm * y_norm;

                (x_dist, y_dist)
            }
        }
    }

    /// Remove distortion from normalized coordinates using Newton-Raphson iteration
    pub fn undistort(&self, x_dist: f64, y_dist: f64) -> Result<(f64, f64)> {
        match self {
            DistortionModel::None => Ok((x_dist, y_dist)),
            _ => {
                let mut x = x_dist;
                let mut y = y_dist;

                for _ in 0..MAX_ITERATIONS {
                    let (fx, fy) = self.distort(x, y);
                    let rx = x_dist - fx;
                    let ry = y_dist - fy;

                    if rx.abs() < TOLERANCE && ry.abs() < TOLERANCE {
                        return Ok((x, y));
                    }

                    // Finite-difference Jacobian
                    let eps = 1e-7;
                    let (fx_x, fy_x) = self.distort(x + eps, y);
                    let (fx_y, fy_y) = self.distort(x, y + eps);

                    let j11 = (fx_x - fx) / eps;
                    let j21 = (fy_x - fy) / eps;
                    let j12 = (fx_y - fx) / eps;
                    let j22 = (fy_y - fy) / eps;

                    // Solve J * [dx, dy]^T = [rx, ry]^T
                    let det = j11 * j22 - j12 * j21;
                    if det.abs() < 1e-18 {
                        return Err(DistortionError::SingularJacobian);
                    }

                    x += (j22 * rx - j12 * ry) / det;
                    y += (-j21 * rx + j11 * ry) / det;

                    if !x.is_finite() || !y.is_finite() {
                        return Err(DistortionError::NonConvergent);
                    }
                }

                // Finite differences can stall just above the tolerance
                let (fx, fy) = self.distort(x, y);
                if (x_dist - fx).abs() < 1e-9 && (y_dist - fy).abs() < 1e-9 {
                    return Ok((x, y));
                }

                Err(DistortionError::NonConvergent)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DistortionError, DistortionModel};
    use crate::error::CalibrationError;

    #[test]
    fn none_round_trip() {
        let m = DistortionModel::None;
        let (x, y) = (0.123, -0.456);
        let (xd, yd) = m.distort(x, y);
        let (xu, yu) = m.undistort(xd, yd).unwrap();
        assert_eq!((x, y), (xu, yu));
    }

    #[test]
    fn brown_conrady_round_trip() {
        let m = DistortionModel::BrownConrady {
            k1: -0.1,
            k2: 0.01,
            p1: 0.001,
            p2: -0.001,
            k3: 0.0,
        };
        let (x, y) = (0.2, -0.15);
        let (xd, yd) = m.distort(x, y);
        let (xu, yu) = m.undistort(xd, yd).unwrap();
        assert!((x - xu).abs() < 1e-8);
        assert!((y - yu).abs() < 1e-8);
    }

    #[test]
    fn zero_coefficients_collapse_to_none() {
        let m = DistortionModel::from_coefficients(&[0.0; 5]).unwrap();
        assert_eq!(m, DistortionModel::None);

        let m = DistortionModel::from_coefficients(&[]).unwrap();
        assert_eq!(m, DistortionModel::None);
    }

    #[test]
    fn short_coefficient_vector_is_padded() {
        let m = DistortionModel::from_coefficients(&[-0.2, 0.05]).unwrap();
        assert_eq!(m.coefficients(), [-0.2, 0.05, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn rejects_long_or_non_finite_coefficients() {
        assert_eq!(
            DistortionModel::from_coefficients(&[0.0; 8]),
            Err(CalibrationError::TooManyDistortionCoefficients(8))
        );
        assert_eq!(
            DistortionModel::from_coefficients(&[f64::NAN]),
            Err(CalibrationError::NonFinite("dist"))
        );
    }

    #[test]
    fn signals_non_convergence() {
        let m = DistortionModel::BrownConrady {
            k1: 1e6,
            k2: 1e6,
            p1: 1.0,
            p2: -1.0,
            k3: 1e6,
        };

        let res = m.undistort(10.0, 10.0);
        assert!(matches!(
            res,
            Err(DistortionError::NonConvergent) | Err(DistortionError::SingularJacobian)
        ));
    }
}
