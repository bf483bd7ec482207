//! Triangulated skeleton JSON: `{"skeleton_3d": {"frame_0001": [[x, y, z] | null, ...]}}`

use std::collections::BTreeMap;
use std::path::Path;

use mvp_core::{FrameIndex, Skeleton3d};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{IoError, Result};
use crate::json::{read_json, write_json};
use crate::naming::{frame_key, parse_frame_key};

/// A joint as written on disk; any null coordinate makes the joint unresolved
type JointEntry = Option<[Option<f64>; 3]>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SkeletonFile {
    pub skeleton_3d: BTreeMap<String, Vec<JointEntry>>,
}

impl SkeletonFile {
    pub fn from_skeletons(skeletons: &BTreeMap<FrameIndex, Skeleton3d>) -> Self {
        let skeleton_3d = skeletons
            .iter()
            .map(|(&frame, skeleton)| {
                let joints = skeleton
                    .joints()
                    .iter()
                    .map(|j| j.map(|p| [Some(p.x), Some(p.y), Some(p.z)]))
                    .collect();
                (frame_key(frame), joints)
            })
            .collect();
        Self { skeleton_3d }
    }

    pub fn into_skeletons(self) -> Result<BTreeMap<FrameIndex, Skeleton3d>> {
        self.skeleton_3d
            .into_iter()
            .map(|(key, joints)| -> Result<(FrameIndex, Skeleton3d)> {
                let frame = parse_frame_key(&key).ok_or_else(|| {
                    IoError::InvalidInput(format!("skeleton key {key:?} is not frame_<index>"))
                })?;
                let skeleton: Skeleton3d = joints.into_iter().map(joint_from_entry).collect();
                Ok((frame, skeleton))
            })
            .collect()
    }
}

fn joint_from_entry(entry: JointEntry) -> Option<Point3<f64>> {
    let [x, y, z] = entry?;
    Some(Point3::new(x?, y?, z?))
}

pub fn read_skeletons(path: &Path) -> Result<BTreeMap<FrameIndex, Skeleton3d>> {
    let file: SkeletonFile = read_json(path)?;
    file.into_skeletons()
}

pub fn write_skeletons(path: &Path, skeletons: &BTreeMap<FrameIndex, Skeleton3d>) -> Result<()> {
    write_json(path, &SkeletonFile::from_skeletons(skeletons))?;
    info!(path = %path.display(), frames = skeletons.len(), "skeletons written");
    Ok(())
}
