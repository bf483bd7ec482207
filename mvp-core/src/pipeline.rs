//! Pipeline entry point: rectify, aggregate, triangulate, score

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::aggregate::{Aggregation, aggregate};
use crate::camera::{CameraRig, UndistortMapCache};
use crate::config::PipelineConfig;
use crate::error::{MvpError, Result};
use crate::observation::{Association, BoundingBox, CameraId, FrameIndex, KeypointSet};
use crate::rectify::Rectifier;
use crate::reproject::{ReprojectionReport, Reprojector, ScoringOptions};
use crate::skeleton::Skeleton3d;
use crate::triangulate::{Triangulation, Triangulator};

/// Raw annotation of one image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageObservation {
    pub image_id: u64,
    /// None when the image could not be mapped to a camera and frame
    pub association: Option<Association>,
    pub width: u32,
    pub height: u32,
    pub keypoints: KeypointSet,
    pub bbox: Option<BoundingBox>,
}

/// Annotation after undistortion
#[derive(Debug, Clone, PartialEq)]
pub struct RectifiedObservation {
    pub image_id: u64,
    pub association: Option<Association>,
    pub keypoints: KeypointSet,
    pub bbox: Option<BoundingBox>,
    /// False when the observation passed through untouched
    pub rectified: bool,
}

/// Counts of observations affected by the lossy input policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyCounters {
    /// Keypoints moved onto the nearest edge pixel
    pub clamped_keypoints: usize,
    pub clamped_bbox_corners: usize,
    /// Images without a (camera, frame) association
    pub dropped_unassociated: usize,
    /// Images whose camera has no calibration
    pub uncalibrated_images: usize,
    pub duplicate_views: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub rectified: Vec<RectifiedObservation>,
    pub aggregation: Aggregation,
    pub triangulation: Triangulation,
    pub report: ReprojectionReport,
    pub counters: PolicyCounters,
}

/// Reprojected annotation for one image
#[derive(Debug, Clone, PartialEq)]
pub struct ReprojectedObservation {
    pub image_id: u64,
    pub association: Association,
    pub keypoints: KeypointSet,
    pub bbox: BoundingBox,
}

pub struct Pipeline {
    config: PipelineConfig,
    rig: CameraRig,
    maps: UndistortMapCache,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, rig: CameraRig) -> Result<Self> {
        config.validate()?;
        if rig.is_empty() {
            return Err(MvpError::InvalidInput("camera rig is empty".to_string()));
        }
        Ok(Self {
            config,
            rig,
            maps: UndistortMapCache::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    /// Undistort every associated observation of a calibrated camera.
    ///
    /// Other observations pass through unchanged with `rectified == false`.
    pub fn rectify(
        &mut self,
        observations: Vec<ImageObservation>,
    ) -> Result<(Vec<RectifiedObservation>, PolicyCounters)> {
        let mut counters = PolicyCounters::default();

        let mut keys = Vec::new();
        for obs in &observations {
            let Some(assoc) = obs.association else {
                continue;
            };
            if self.rig.get(assoc.camera).is_none() {
                continue;
            }
            if obs.width == 0 || obs.height == 0 {
                return Err(MvpError::InvalidInput(format!(
                    "image {} has empty size {}x{}",
                    obs.image_id, obs.width, obs.height
                )));
            }
            keys.push((assoc.camera, obs.width, obs.height));
        }
        let built = self.maps.prebuild(&self.rig, keys)?;
        info!(built, cached = self.maps.len(), "undistortion maps ready");

        let maps = &self.maps;
        let rig = &self.rig;
        let results: Vec<(RectifiedObservation, usize, usize)> = observations
            .into_par_iter()
            .map(|obs| {
                let map = obs
                    .association
                    .filter(|a| rig.get(a.camera).is_some())
                    .and_then(|a| maps.get(&(a.camera, obs.width, obs.height)));

                let Some(map) = map else {
                    let out = RectifiedObservation {
                        image_id: obs.image_id,
                        association: obs.association,
                        keypoints: obs.keypoints,
                        bbox: obs.bbox,
                        rectified: false,
                    };
                    return (out, 0, 0);
                };

                let rectifier = Rectifier::new(&map);
                let kps = rectifier.rectify_keypoints(&obs.keypoints);
                let bbox = obs.bbox.map(|b| rectifier.rectify_bbox(&b));
                let bbox_clamped = bbox.as_ref().map_or(0, |b| b.clamped);

                let out = RectifiedObservation {
                    image_id: obs.image_id,
                    association: obs.association,
                    keypoints: kps.value,
                    bbox: bbox.map(|b| b.value),
                    rectified: true,
                };
                (out, kps.clamped, bbox_clamped)
            })
            .collect();

        let mut rectified = Vec::with_capacity(results.len());
        for (obs, kp_clamped, bbox_clamped) in results {
            counters.clamped_keypoints += kp_clamped;
            counters.clamped_bbox_corners += bbox_clamped;
            match obs.association {
                None => counters.dropped_unassociated += 1,
                Some(a) if !obs.rectified => {
                    warn!(image = obs.image_id, camera = a.camera, "no calibration for camera");
                    counters.uncalibrated_images += 1;
                }
                Some(_) => {}
            }
            rectified.push(obs);
        }

        if counters.clamped_keypoints > 0 || counters.clamped_bbox_corners > 0 {
            info!(
                keypoints = counters.clamped_keypoints,
                bbox_corners = counters.clamped_bbox_corners,
                "observations outside the image were clamped to the edge"
            );
        }
        if counters.dropped_unassociated > 0 {
            warn!(
                images = counters.dropped_unassociated,
                "images without camera/frame association are ignored"
            );
        }

        Ok((rectified, counters))
    }

    /// Group rectified observations into frames.
    ///
    /// Observations that were not rectified are treated as unassociated.
    pub fn aggregate(&self, observations: &[RectifiedObservation]) -> Aggregation {
        aggregate(observations.iter().map(|o| {
            let association = o.association.filter(|_| o.rectified);
            (association, o.keypoints.clone())
        }))
    }

    pub fn triangulate(&self, aggregation: &Aggregation) -> Triangulation {
        Triangulator::new(&self.rig, self.config.min_views).triangulate_all(&aggregation.frames)
    }

    pub fn score(
        &self,
        skeletons: &BTreeMap<FrameIndex, Skeleton3d>,
        ground_truth: &BTreeMap<(CameraId, FrameIndex), KeypointSet>,
    ) -> ReprojectionReport {
        let options = ScoringOptions {
            min_visibility: self.config.score_min_visibility,
        };
        Reprojector::with_options(&self.rig, options).score(skeletons, ground_truth)
    }

    /// Run every stage over raw observations
    pub fn run(&mut self, observations: Vec<ImageObservation>) -> Result<PipelineOutput> {
        let (rectified, mut counters) = self.rectify(observations)?;

        let aggregation = self.aggregate(&rectified);
        counters.duplicate_views = aggregation.duplicates;
        info!(frames = aggregation.frames.len(), "observations aggregated");

        let triangulation = self.triangulate(&aggregation);
        let report = self.score(&triangulation.skeletons, &aggregation.ground_truth());

        Ok(PipelineOutput {
            rectified,
            aggregation,
            triangulation,
            report,
            counters,
        })
    }

    /// Reproject skeletons into every associated image of a calibrated camera
    /// whose frame has a skeleton.
    ///
    /// The box encloses the resolved joints and is empty when none resolved.
    pub fn reproject_images<I>(
        &self,
        skeletons: &BTreeMap<FrameIndex, Skeleton3d>,
        images: I,
    ) -> Vec<ReprojectedObservation>
    where
        I: IntoIterator<Item = (u64, Option<Association>)>,
    {
        images
            .into_iter()
            .filter_map(|(image_id, association)| {
                let association = association?;
                let camera = self.rig.get(association.camera)?;
                let skeleton = skeletons.get(&association.frame)?;

                let keypoints = Reprojector::reproject_skeleton(camera, skeleton);
                let bbox = BoundingBox::enclosing(
                    keypoints.iter().filter(|k| k.is_visible()).map(|k| k.position()),
                )
                .unwrap_or_default();

                Some(ReprojectedObservation {
                    image_id,
                    association,
                    keypoints,
                    bbox,
                })
            })
            .collect()
    }
}
