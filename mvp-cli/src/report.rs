//! Human-readable rendering of stage results

use std::collections::BTreeMap;

use mvp_core::skeleton::joint_name;
use mvp_core::{
    CameraId, FrameIndex, PolicyCounters, ReprojectionReport, Skeleton3d, TriangulationStats,
};
use tracing::{info, warn};

pub fn log_error_report(report: &ReprojectionReport) {
    let summary = &report.summary;
    if summary.sample_count == 0 {
        warn!("no reprojection samples: no joint was both resolved and annotated");
        return;
    }

    info!("Reprojection error");
    info!("  Samples: {}", summary.sample_count);
    info!("  MSE:     {:.4} px^2", summary.mse);
    info!("  MPJPE:   {:.4} px", summary.mpjpe);

    info!("  Per joint:");
    for (&joint, &mean) in &summary.per_joint {
        info!("    {:>2} {:<10} {:>9.4} px", joint, joint_name(joint), mean);
    }

    info!("  Per camera:");
    for (camera, (mean, count)) in per_camera(report) {
        info!("    cam_{:<4} {:>9.4} px ({} samples)", camera, mean, count);
    }
}

fn per_camera(report: &ReprojectionReport) -> BTreeMap<CameraId, (f64, usize)> {
    let mut acc: BTreeMap<CameraId, (f64, usize)> = BTreeMap::new();
    for r in &report.records {
        let e = acc.entry(r.camera).or_default();
        e.0 += r.error;
        e.1 += 1;
    }
    acc.into_iter()
        .map(|(cam, (sum, n))| (cam, (sum / n as f64, n)))
        .collect()
}

/// Mean length of each bone over the frames where both ends resolved
fn mean_bone_lengths(
    skeletons: &BTreeMap<FrameIndex, Skeleton3d>,
) -> BTreeMap<(usize, usize), (f64, usize)> {
    let mut acc: BTreeMap<(usize, usize), (f64, usize)> = BTreeMap::new();
    for (bone, length) in skeletons.values().flat_map(Skeleton3d::bone_lengths) {
        let e = acc.entry(bone).or_default();
        e.0 += length;
        e.1 += 1;
    }
    acc.into_iter()
        .map(|(bone, (sum, n))| (bone, (sum / n as f64, n)))
        .collect()
}

pub fn log_bone_lengths(skeletons: &BTreeMap<FrameIndex, Skeleton3d>) {
    let bones = mean_bone_lengths(skeletons);
    if bones.is_empty() {
        return;
    }
    info!("  Mean bone length:");
    for ((a, b), (mean, frames)) in bones {
        info!(
            "    {:<10} - {:<10} {:>9.4} ({} frames)",
            joint_name(a),
            joint_name(b),
            mean,
            frames
        );
    }
}

pub fn log_triangulation(stats: &TriangulationStats, frames: usize) {
    info!(
        "Triangulated {} frames: {} joints resolved, {} with too few views, {} degenerate",
        frames, stats.resolved, stats.insufficient_views, stats.degenerate
    );
}

pub fn log_counters(counters: &PolicyCounters) {
    info!(
        "Input policy: {} keypoints and {} box corners clamped, {} unassociated, {} uncalibrated, {} duplicate views",
        counters.clamped_keypoints,
        counters.clamped_bbox_corners,
        counters.dropped_unassociated,
        counters.uncalibrated_images,
        counters.duplicate_views
    );
}
