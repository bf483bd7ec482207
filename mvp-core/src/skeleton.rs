//! 3D skeletons and the default body topology

use nalgebra::Point3;

/// Joint names of the default 18-joint body model, in keypoint order
pub const JOINT_NAMES: [&str; 18] = [
    "Hips", "RHip", "RKnee", "RAnkle", "RFoot", "LHip", "LKnee", "LAnkle", "LFoot", "Spine",
    "Neck", "Head", "RShoulder", "RElbow", "RHand", "LShoulder", "LElbow", "LHand",
];

/// Bones of the default body model as joint index pairs
pub const BONES: [(usize, usize); 17] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (0, 9),
    (9, 10),
    (10, 11),
    (10, 12),
    (12, 13),
    (13, 14),
    (10, 15),
    (15, 16),
    (16, 17),
];

/// Display name for a joint index, falling back to the index itself
pub fn joint_name(joint: usize) -> String {
    JOINT_NAMES
        .get(joint)
        .map_or_else(|| format!("joint_{joint:02}"), |n| (*n).to_string())
}

/// Reconstructed joints of one frame; `None` marks an unresolved joint
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton3d {
    joints: Vec<Option<Point3<f64>>>,
}

impl Skeleton3d {
    pub fn new(joints: Vec<Option<Point3<f64>>>) -> Self {
        Self { joints }
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn get(&self, joint: usize) -> Option<&Point3<f64>> {
        self.joints.get(joint).and_then(Option::as_ref)
    }

    pub fn joints(&self) -> &[Option<Point3<f64>>] {
        &self.joints
    }

    /// Resolved joints with their index
    pub fn resolved(&self) -> impl Iterator<Item = (usize, &Point3<f64>)> + '_ {
        self.joints
            .iter()
            .enumerate()
            .filter_map(|(j, p)| p.as_ref().map(|p| (j, p)))
    }

    pub fn resolved_count(&self) -> usize {
        self.joints.iter().filter(|p| p.is_some()).count()
    }

    /// Lengths of the bones whose endpoints are both resolved
    pub fn bone_lengths(&self) -> Vec<((usize, usize), f64)> {
        BONES
            .iter()
            .filter_map(|&(a, b)| Some(((a, b), (self.get(a)? - self.get(b)?).norm())))
            .collect()
    }
}

impl FromIterator<Option<Point3<f64>>> for Skeleton3d {
    fn from_iter<I: IntoIterator<Item = Option<Point3<f64>>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
