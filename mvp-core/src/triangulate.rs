//! Multi-view triangulation with the Direct Linear Transform

use std::collections::BTreeMap;

use nalgebra::{DMatrix, Matrix3x4, Point2, Point3};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::aggregate::MultiViewFrame;
use crate::camera::CameraRig;
use crate::error::Unresolved;
use crate::observation::FrameIndex;
use crate::skeleton::Skeleton3d;

/// Default minimum number of contributing views per joint
pub const DEFAULT_MIN_VIEWS: usize = 2;

const MIN_HOMOGENEOUS_SCALE: f64 = 1e-12;

/// Solve for the world point best explaining all `(P, pixel)` observations.
///
/// Each view adds the rows `x * P[2,:] - P[0,:]` and `y * P[2,:] - P[1,:]`;
/// the solution is the right singular vector of the smallest singular value.
/// At least `2 * max(min_views, 2)` rows are required.
pub fn triangulate_point(
    views: &[(&Matrix3x4<f64>, Point2<f64>)],
    min_views: usize,
) -> Result<Point3<f64>, Unresolved> {
    let rows = 2 * views.len();
    let required = 2 * min_views.max(DEFAULT_MIN_VIEWS);
    if rows < required {
        return Err(Unresolved::InsufficientViews {
            found: rows,
            required,
        });
    }

    let mut a = DMatrix::<f64>::zeros(rows, 4);
    for (i, (p, pixel)) in views.iter().enumerate() {
        let r0 = p.row(0);
        let r1 = p.row(1);
        let r2 = p.row(2);
        a.row_mut(2 * i).copy_from(&(r2 * pixel.x - r0));
        a.row_mut(2 * i + 1).copy_from(&(r2 * pixel.y - r1));
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(Unresolved::DegenerateSolution)?;
    let smallest = svd.singular_values.imin();
    let x = v_t.row(smallest);

    let w = x[3];
    if !w.is_finite() || w.abs() < MIN_HOMOGENEOUS_SCALE {
        return Err(Unresolved::DegenerateSolution);
    }

    let point = Point3::new(x[0] / w, x[1] / w, x[2] / w);
    if point.coords.iter().any(|c| !c.is_finite()) {
        return Err(Unresolved::DegenerateSolution);
    }
    Ok(point)
}

/// Outcome counts over triangulated joints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriangulationStats {
    pub resolved: usize,
    pub insufficient_views: usize,
    pub degenerate: usize,
}

impl TriangulationStats {
    fn record(&mut self, outcome: &Result<Point3<f64>, Unresolved>) {
        match outcome {
            Ok(_) => self.resolved += 1,
            Err(Unresolved::InsufficientViews { .. }) => self.insufficient_views += 1,
            Err(Unresolved::DegenerateSolution) => self.degenerate += 1,
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            resolved: self.resolved + other.resolved,
            insufficient_views: self.insufficient_views + other.insufficient_views,
            degenerate: self.degenerate + other.degenerate,
        }
    }

    pub fn unresolved(&self) -> usize {
        self.insufficient_views + self.degenerate
    }
}

#[derive(Debug, Clone, Default)]
pub struct Triangulation {
    pub skeletons: BTreeMap<FrameIndex, Skeleton3d>,
    pub stats: TriangulationStats,
}

/// Triangulates multi-view frames against a fixed camera rig
#[derive(Debug, Clone, Copy)]
pub struct Triangulator<'a> {
    rig: &'a CameraRig,
    min_views: usize,
}

impl<'a> Triangulator<'a> {
    pub fn new(rig: &'a CameraRig, min_views: usize) -> Self {
        Self { rig, min_views }
    }

    /// Triangulate one joint of one frame.
    ///
    /// Only keypoints flagged visible contribute; views from cameras missing
    /// in the rig are ignored.
    pub fn triangulate_joint(
        &self,
        frame: &MultiViewFrame,
        joint: usize,
    ) -> Result<Point3<f64>, Unresolved> {
        let views: Vec<(&Matrix3x4<f64>, Point2<f64>)> = frame
            .views
            .iter()
            .filter_map(|(cam, kps)| {
                let kp = kps.get(joint).filter(|k| k.is_visible())?;
                let camera = self.rig.get(*cam)?;
                Some((camera.projection_matrix(), kp.position()))
            })
            .collect();

        triangulate_point(&views, self.min_views)
    }

    pub fn triangulate_frame(&self, frame: &MultiViewFrame) -> (Skeleton3d, TriangulationStats) {
        let mut stats = TriangulationStats::default();
        let skeleton: Skeleton3d = (0..frame.joint_count())
            .map(|joint| {
                let outcome = self.triangulate_joint(frame, joint);
                stats.record(&outcome);
                outcome.ok()
            })
            .collect();
        (skeleton, stats)
    }

    /// Triangulate every frame in parallel
    pub fn triangulate_all(&self, frames: &BTreeMap<FrameIndex, MultiViewFrame>) -> Triangulation {
        let per_frame: Vec<(FrameIndex, Skeleton3d, TriangulationStats)> = frames
            .par_iter()
            .map(|(idx, frame)| {
                let (skeleton, stats) = self.triangulate_frame(frame);
                (*idx, skeleton, stats)
            })
            .collect();

        let mut out = Triangulation::default();
        for (idx, skeleton, stats) in per_frame {
            if stats.unresolved() > 0 {
                debug!(frame = idx, unresolved = stats.unresolved(), "joints left unresolved");
            }
            out.stats = out.stats.merge(stats);
            out.skeletons.insert(idx, skeleton);
        }

        info!(
            frames = out.skeletons.len(),
            resolved = out.stats.resolved,
            insufficient_views = out.stats.insufficient_views,
            degenerate = out.stats.degenerate,
            "triangulation finished"
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, DistortionModel};
    use crate::observation::{Keypoint2d, KeypointSet, Visibility};
    use nalgebra::{Matrix3, Vector3};

    fn camera(id: u32, rvec: Vector3<f64>, tvec: Vector3<f64>) -> Camera {
        let k = Matrix3::new(1000.0, 0.0, 500.0, 0.0, 1000.0, 500.0, 0.0, 0.0, 1.0);
        Camera::new(id, k, DistortionModel::None, rvec, tvec).unwrap()
    }

    fn stereo_rig() -> CameraRig {
        CameraRig::new([
            camera(1, Vector3::zeros(), Vector3::new(-1.0, 0.0, 0.0)),
            camera(2, Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)),
        ])
    }

    fn frame_of(rig: &CameraRig, points: &[Point3<f64>], vis: &[(u32, Vec<Visibility>)]) -> MultiViewFrame {
        let mut frame = MultiViewFrame::new(1);
        for (cam, flags) in vis {
            let projected = rig.get(*cam).unwrap().project(points);
            let kps = projected
                .iter()
                .zip(flags)
                .map(|(p, v)| Keypoint2d::new(p.x, p.y, *v))
                .collect::<KeypointSet>();
            frame.views.insert(*cam, kps);
        }
        frame
    }

    #[test]
    fn test_two_view_recovers_point() {
        let rig = stereo_rig();
        let target = Point3::new(0.0, 0.0, 10.0);
        let views: Vec<_> = rig
            .iter()
            .map(|c| (c.projection_matrix(), c.project_point(&target)))
            .collect();
        let p = triangulate_point(&views, 2).unwrap();
        assert!((p - target).norm() < 1e-6);
    }

    #[test]
    fn test_general_pose_round_trip() {
        let rig = CameraRig::new([
            camera(1, Vector3::new(0.0, 0.3, 0.0), Vector3::new(-2.0, 0.1, 1.0)),
            camera(2, Vector3::new(0.0, -0.3, 0.05), Vector3::new(2.0, -0.1, 1.0)),
            camera(3, Vector3::new(0.2, 0.0, 0.0), Vector3::new(0.0, 1.5, 0.5)),
        ]);
        let target = Point3::new(0.4, -0.7, 6.0);
        let views: Vec<_> = rig
            .iter()
            .map(|c| (c.projection_matrix(), c.project_point(&target)))
            .collect();
        let p = triangulate_point(&views, 2).unwrap();
        assert!((p - target).norm() / target.coords.norm() < 1e-6);
    }

    #[test]
    fn test_single_view_is_insufficient() {
        let rig = stereo_rig();
        let cam = rig.get(1).unwrap();
        let views = [(cam.projection_matrix(), Point2::new(400.0, 500.0))];
        assert_eq!(
            triangulate_point(&views, 2),
            Err(Unresolved::InsufficientViews {
                found: 2,
                required: 4
            })
        );
        assert!(matches!(
            triangulate_point(&[], 2),
            Err(Unresolved::InsufficientViews { found: 0, .. })
        ));
    }

    #[test]
    fn test_min_views_threshold_is_respected() {
        let rig = stereo_rig();
        let target = Point3::new(0.0, 0.0, 10.0);
        let views: Vec<_> = rig
            .iter()
            .map(|c| (c.projection_matrix(), c.project_point(&target)))
            .collect();
        assert!(matches!(
            triangulate_point(&views, 3),
            Err(Unresolved::InsufficientViews { required: 6, .. })
        ));
    }

    #[test]
    fn test_point_at_infinity_is_degenerate() {
        // Parallel rays through both principal points meet at (0, 0, 1, 0)
        let rig = stereo_rig();
        let views: Vec<_> = rig
            .iter()
            .map(|c| (c.projection_matrix(), Point2::new(500.0, 500.0)))
            .collect();
        assert_eq!(
            triangulate_point(&views, 2),
            Err(Unresolved::DegenerateSolution)
        );
    }

    #[test]
    fn test_occluded_observations_do_not_contribute() {
        let rig = stereo_rig();
        let points = [Point3::new(0.0, 0.0, 10.0), Point3::new(0.5, 0.5, 8.0)];
        let frame = frame_of(
            &rig,
            &points,
            &[
                (1, vec![Visibility::Visible, Visibility::Visible]),
                (2, vec![Visibility::Visible, Visibility::Occluded]),
            ],
        );

        let tri = Triangulator::new(&rig, 2);
        let (skeleton, stats) = tri.triangulate_frame(&frame);
        assert_eq!(skeleton.len(), 2);
        assert!((skeleton.get(0).unwrap() - points[0]).norm() < 1e-6);
        assert!(skeleton.get(1).is_none());
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.insufficient_views, 1);
    }

    #[test]
    fn test_unknown_camera_is_ignored() {
        let rig = stereo_rig();
        let points = [Point3::new(0.0, 0.0, 10.0)];
        let mut frame = frame_of(&rig, &points, &[(1, vec![Visibility::Visible])]);
        frame
            .views
            .insert(42, KeypointSet::new(vec![Keypoint2d::visible(500.0, 500.0)]));

        let tri = Triangulator::new(&rig, 2);
        assert!(tri.triangulate_joint(&frame, 0).is_err());
    }

    #[test]
    fn test_triangulate_all_keeps_every_frame() {
        let rig = stereo_rig();
        let points = [Point3::new(0.1, -0.2, 9.0)];
        let mut frames = BTreeMap::new();
        for idx in 0..4u32 {
            let mut f = frame_of(
                &rig,
                &points,
                &[(1, vec![Visibility::Visible]), (2, vec![Visibility::Visible])],
            );
            f.frame = idx;
            if idx == 3 {
                f.views.remove(&2);
            }
            frames.insert(idx, f);
        }

        let out = Triangulator::new(&rig, 2).triangulate_all(&frames);
        assert_eq!(out.skeletons.len(), 4);
        assert_eq!(out.stats.resolved, 3);
        assert_eq!(out.stats.insufficient_views, 1);
        assert!(out.skeletons[&3].get(0).is_none());
        assert!((out.skeletons[&0].get(0).unwrap() - points[0]).norm() < 1e-6);
    }
}
