//! Grouping of per-image keypoints into multi-view frames

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::debug;

use crate::observation::{Association, CameraId, FrameIndex, KeypointSet};

/// All camera views of one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiViewFrame {
    pub frame: FrameIndex,
    pub views: BTreeMap<CameraId, KeypointSet>,
}

impl MultiViewFrame {
    pub fn new(frame: FrameIndex) -> Self {
        Self {
            frame,
            views: BTreeMap::new(),
        }
    }

    /// Longest keypoint vector among the views
    pub fn joint_count(&self) -> usize {
        self.views.values().map(KeypointSet::len).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub frames: BTreeMap<FrameIndex, MultiViewFrame>,
    /// Observations without a (camera, frame) association
    pub dropped: usize,
    /// Observations for a (camera, frame) that already had one
    pub duplicates: usize,
}

impl Aggregation {
    /// Every view keyed by `(camera, frame)`, the shape the scorer consumes
    pub fn ground_truth(&self) -> BTreeMap<(CameraId, FrameIndex), KeypointSet> {
        self.frames
            .values()
            .flat_map(|f| {
                f.views
                    .iter()
                    .map(move |(cam, kps)| ((*cam, f.frame), kps.clone()))
            })
            .collect()
    }
}

/// Group observations by frame.
///
/// Unassociated observations are dropped and counted. The first observation
/// for a (camera, frame) pair wins. Frames with a single camera are kept.
pub fn aggregate<I>(observations: I) -> Aggregation
where
    I: IntoIterator<Item = (Option<Association>, KeypointSet)>,
{
    let mut out = Aggregation::default();

    for (association, keypoints) in observations {
        let Some(Association { camera, frame }) = association else {
            out.dropped += 1;
            continue;
        };

        let entry = out
            .frames
            .entry(frame)
            .or_insert_with(|| MultiViewFrame::new(frame));

        match entry.views.entry(camera) {
            Entry::Vacant(v) => {
                v.insert(keypoints);
            }
            Entry::Occupied(_) => {
                debug!(camera, frame, "duplicate view ignored");
                out.duplicates += 1;
            }
        }
    }

    if out.dropped > 0 {
        debug!(dropped = out.dropped, "observations without camera/frame association");
    }

    out
}
