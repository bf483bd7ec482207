//! Reprojection of skeletons into each camera and pixel-error scoring

use std::collections::BTreeMap;

use nalgebra::{Point2, Point3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::camera::{Camera, CameraRig};
use crate::observation::{CameraId, FrameIndex, Keypoint2d, KeypointSet, Visibility};
use crate::skeleton::Skeleton3d;

/// One projected joint compared against its ground-truth keypoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReprojectionRecord {
    pub frame: FrameIndex,
    pub camera: CameraId,
    pub joint: usize,
    pub projected: Point2<f64>,
    /// Euclidean pixel distance, always >= 0
    pub error: f64,
}

/// Aggregate reprojection statistics over a full pass
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorSummary {
    /// Mean squared pixel error
    pub mse: f64,
    /// Mean pixel error
    pub mpjpe: f64,
    pub sample_count: usize,
    /// Mean pixel error per joint index
    pub per_joint: BTreeMap<usize, f64>,
}

impl ErrorSummary {
    /// Recompute every statistic from the complete sample list.
    ///
    /// An empty list yields zeros and `sample_count == 0`.
    pub fn from_records(records: &[ReprojectionRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let n = records.len() as f64;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut per_joint: BTreeMap<usize, (f64, usize)> = BTreeMap::new();

        for r in records {
            sum += r.error;
            sum_sq += r.error * r.error;
            let acc = per_joint.entry(r.joint).or_default();
            acc.0 += r.error;
            acc.1 += 1;
        }

        Self {
            mse: sum_sq / n,
            mpjpe: sum / n,
            sample_count: records.len(),
            per_joint: per_joint
                .into_iter()
                .map(|(j, (s, c))| (j, s / c as f64))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReprojectionReport {
    pub records: Vec<ReprojectionRecord>,
    pub summary: ErrorSummary,
}

/// Which ground-truth keypoints take part in scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoringOptions {
    /// Ground-truth keypoints below this visibility are not scored
    pub min_visibility: Visibility,
}

/// Projects skeletons through a camera rig and scores them
#[derive(Debug, Clone, Copy)]
pub struct Reprojector<'a> {
    rig: &'a CameraRig,
    options: ScoringOptions,
}

impl<'a> Reprojector<'a> {
    pub fn new(rig: &'a CameraRig) -> Self {
        Self::with_options(rig, ScoringOptions::default())
    }

    pub fn with_options(rig: &'a CameraRig, options: ScoringOptions) -> Self {
        Self { rig, options }
    }

    /// Reprojected keypoints of a skeleton in one camera.
    ///
    /// Resolved joints are flagged visible, unresolved ones `(0, 0, absent)`.
    pub fn reproject_skeleton(camera: &Camera, skeleton: &Skeleton3d) -> KeypointSet {
        skeleton
            .joints()
            .iter()
            .map(|joint| match joint {
                Some(p) => {
                    let px = camera.project_point(p);
                    Keypoint2d::visible(px.x, px.y)
                }
                None => Keypoint2d::default(),
            })
            .collect()
    }

    /// Records for one frame, cameras in id order, joints in index order
    pub fn score_frame(
        &self,
        frame: FrameIndex,
        skeleton: &Skeleton3d,
        ground_truth: &BTreeMap<(CameraId, FrameIndex), KeypointSet>,
    ) -> Vec<ReprojectionRecord> {
        let resolved: Vec<(usize, Point3<f64>)> =
            skeleton.resolved().map(|(j, p)| (j, *p)).collect();
        let points: Vec<Point3<f64>> = resolved.iter().map(|(_, p)| *p).collect();

        let mut records = Vec::new();
        for camera in self.rig.iter() {
            let Some(gt) = ground_truth.get(&(camera.id(), frame)) else {
                continue;
            };

            let projected = camera.project(&points);
            for ((joint, _), px) in resolved.iter().zip(projected) {
                let Some(truth) = gt.get(*joint) else {
                    continue;
                };
                if truth.visibility < self.options.min_visibility {
                    continue;
                }

                let error = (px - truth.position()).norm();
                if !error.is_finite() {
                    continue;
                }
                records.push(ReprojectionRecord {
                    frame,
                    camera: camera.id(),
                    joint: *joint,
                    projected: px,
                    error,
                });
            }
        }
        records
    }

    /// Score all skeletons against rectified ground truth.
    ///
    /// Frames are scored in parallel and concatenated in frame order, so the
    /// summary is identical across runs.
    pub fn score(
        &self,
        skeletons: &BTreeMap<FrameIndex, Skeleton3d>,
        ground_truth: &BTreeMap<(CameraId, FrameIndex), KeypointSet>,
    ) -> ReprojectionReport {
        let per_frame: Vec<Vec<ReprojectionRecord>> = skeletons
            .par_iter()
            .map(|(frame, skeleton)| self.score_frame(*frame, skeleton, ground_truth))
            .collect();

        let records: Vec<ReprojectionRecord> = per_frame.into_iter().flatten().collect();
        let summary = ErrorSummary::from_records(&records);

        info!(
            samples = summary.sample_count,
            mse = summary.mse,
            mpjpe = summary.mpjpe,
            "reprojection scored"
        );

        ReprojectionReport { records, summary }
    }
}
