use std::collections::BTreeMap;

use mvp_core::{
    Association, Camera, CameraRig, DistortionModel, Keypoint2d, KeypointSet, MultiViewFrame,
    Reprojector, Triangulator, Visibility, aggregate,
};
use nalgebra::{Matrix3, Point3, Vector3};

fn intrinsics() -> Matrix3<f64> {
    Matrix3::new(1000.0, 0.0, 500.0, 0.0, 1000.0, 500.0, 0.0, 0.0, 1.0)
}

fn camera(id: u32, rvec: [f64; 3], tvec: [f64; 3]) -> Camera {
    Camera::new(
        id,
        intrinsics(),
        DistortionModel::None,
        Vector3::from(rvec),
        Vector3::from(tvec),
    )
    .unwrap()
}

fn stereo_rig() -> CameraRig {
    CameraRig::new([
        camera(1, [0.0; 3], [-1.0, 0.0, 0.0]),
        camera(2, [0.0; 3], [1.0, 0.0, 0.0]),
    ])
}

fn ring_rig() -> CameraRig {
    CameraRig::new([
        camera(2, [0.0, 0.2, 0.0], [-1.5, 0.0, 0.5]),
        camera(5, [0.0, -0.2, 0.0], [1.5, 0.0, 0.5]),
        camera(8, [0.15, 0.0, 0.0], [0.0, -1.0, 0.3]),
        camera(13, [-0.15, 0.0, 0.0], [0.0, 1.0, 0.3]),
    ])
}

/// Project `points` into every camera, with per-camera visibility flags
fn observe(
    rig: &CameraRig,
    frame: u32,
    points: &[Point3<f64>],
    visibility: impl Fn(u32, usize) -> Visibility,
) -> Vec<(Option<Association>, KeypointSet)> {
    rig.iter()
        .map(|cam| {
            let kps = cam
                .project(points)
                .into_iter()
                .enumerate()
                .map(|(j, p)| Keypoint2d::new(p.x, p.y, visibility(cam.id(), j)))
                .collect();
            (Some(Association::new(cam.id(), frame)), kps)
        })
        .collect()
}

#[test]
fn two_camera_scenario_is_exact() {
    let rig = stereo_rig();
    let target = Point3::new(0.0, 0.0, 10.0);

    // f * (X + tx) / Z + c
    let pixels = rig.get(1).unwrap().project(&[target]);
    assert!((pixels[0].x - 400.0).abs() < 1e-9);
    assert!((pixels[0].y - 500.0).abs() < 1e-9);
    let pixels = rig.get(2).unwrap().project(&[target]);
    assert!((pixels[0].x - 600.0).abs() < 1e-9);

    let agg = aggregate(observe(&rig, 1, &[target], |_, _| Visibility::Visible));
    let tri = Triangulator::new(&rig, 2).triangulate_all(&agg.frames);
    let point = tri.skeletons[&1].get(0).copied().unwrap();
    assert!((point - target).norm() < 1e-6);

    let report = Reprojector::new(&rig).score(&tri.skeletons, &agg.ground_truth());
    assert_eq!(report.summary.sample_count, 2);
    assert!(report.summary.mse < 1e-12);
    assert!(report.summary.mpjpe < 1e-6);
}

#[test]
fn round_trip_through_many_views() {
    let rig = ring_rig();
    let points: Vec<Point3<f64>> = (0..18)
        .map(|j| {
            let t = j as f64 * 0.35;
            Point3::new(0.4 * t.cos(), -0.8 + 0.1 * j as f64, 6.0 + 0.3 * t.sin())
        })
        .collect();

    let agg = aggregate(observe(&rig, 4, &points, |_, _| Visibility::Visible));
    let tri = Triangulator::new(&rig, 2).triangulate_all(&agg.frames);
    let skeleton = &tri.skeletons[&4];

    assert_eq!(skeleton.resolved_count(), 18);
    for (j, p) in skeleton.resolved() {
        let rel = (p - points[j]).norm() / points[j].coords.norm();
        assert!(rel < 1e-6, "joint {j}: relative error {rel}");
    }
}

#[test]
fn partial_occlusion_yields_null_and_no_samples() {
    let rig = ring_rig();
    let points = [Point3::new(0.0, 0.0, 6.0), Point3::new(0.2, 0.3, 5.5)];

    // Joint 1 is visible only to camera 8
    let visibility = |cam: u32, joint: usize| {
        if joint == 1 && cam != 8 {
            Visibility::Occluded
        } else {
            Visibility::Visible
        }
    };
    let agg = aggregate(observe(&rig, 0, &points, visibility));
    let tri = Triangulator::new(&rig, 2).triangulate_all(&agg.frames);
    let skeleton = &tri.skeletons[&0];

    assert!(skeleton.get(0).is_some());
    assert!(skeleton.get(1).is_none());
    assert_eq!(tri.stats.insufficient_views, 1);

    let report = Reprojector::new(&rig).score(&tri.skeletons, &agg.ground_truth());
    assert!(report.records.iter().all(|r| r.joint != 1));
    assert!(!report.summary.per_joint.contains_key(&1));
    assert_eq!(report.summary.sample_count, 4);
    assert!(report.records.iter().all(|r| r.error >= 0.0));
}

#[test]
fn low_visibility_coordinates_never_contribute() {
    let rig = stereo_rig();
    let target = Point3::new(0.3, 0.1, 9.0);
    let mut observations = observe(&rig, 2, &[target], |_, _| Visibility::Visible);

    // Camera 2 reports a wildly wrong coordinate, flagged occluded: if it
    // were used the joint would still be resolved but far from the target
    observations[1].1 = KeypointSet::new(vec![Keypoint2d::new(10.0, 990.0, Visibility::Occluded)]);
    let agg = aggregate(observations.clone());
    let tri = Triangulator::new(&rig, 2).triangulate_all(&agg.frames);
    assert!(tri.skeletons[&2].get(0).is_none());

    // Adding a third clean camera resolves the joint exactly
    let rig3 = CameraRig::new(
        rig.iter()
            .cloned()
            .chain([camera(3, [0.0; 3], [0.0, 1.0, 0.0])]),
    );
    let mut observations3 = observations;
    observations3.extend(
        observe(&rig3, 2, &[target], |_, _| Visibility::Visible)
            .into_iter()
            .filter(|(a, _)| a.map(|a| a.camera) == Some(3)),
    );
    let agg = aggregate(observations3);
    let tri = Triangulator::new(&rig3, 2).triangulate_all(&agg.frames);
    let point = tri.skeletons[&2].get(0).copied().unwrap();
    assert!((point - target).norm() < 1e-6);
}

#[test]
fn single_camera_frames_are_kept_but_unresolved() {
    let rig = stereo_rig();
    let target = Point3::new(0.0, 0.0, 10.0);
    let mut observations = observe(&rig, 5, &[target], |_, _| Visibility::Visible);
    observations.truncate(1);

    let agg = aggregate(observations);
    assert_eq!(agg.frames.len(), 1);

    let tri = Triangulator::new(&rig, 2).triangulate_all(&agg.frames);
    assert_eq!(tri.skeletons[&5].len(), 1);
    assert_eq!(tri.skeletons[&5].resolved_count(), 0);

    let report = Reprojector::new(&rig).score(&tri.skeletons, &agg.ground_truth());
    assert_eq!(report.summary.sample_count, 0);
    assert_eq!(report.summary.mpjpe, 0.0);
}

#[test]
fn frames_are_independent() {
    let rig = stereo_rig();
    let mut frames = BTreeMap::new();
    for f in 0..6u32 {
        let target = Point3::new(f as f64 * 0.1, 0.0, 8.0 + f as f64);
        let agg = aggregate(observe(&rig, f, &[target], |_, _| Visibility::Visible));
        let frame: MultiViewFrame = agg.frames[&f].clone();
        frames.insert(f, frame);
    }

    let all = Triangulator::new(&rig, 2).triangulate_all(&frames);
    for (f, frame) in &frames {
        let (alone, _) = Triangulator::new(&rig, 2).triangulate_frame(frame);
        assert_eq!(all.skeletons[f], alone);
    }
}
