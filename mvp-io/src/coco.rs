//! COCO keypoint datasets
//!
//! Only the fields the pipeline reads are typed; everything else is kept in
//! `rest` so a dataset survives a read/modify/write cycle intact.

use std::collections::HashMap;
use std::path::Path;

use mvp_core::{
    Association, BoundingBox, ImageObservation, KeypointSet, MvpError, RectifiedObservation,
    ReprojectedObservation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{IoError, Result};
use crate::json::{read_json, write_json};
use crate::naming::parse_image_name;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    #[serde(default)]
    pub licenses: Vec<Value>,
    pub images: Vec<CocoImage>,
    #[serde(default)]
    pub annotations: Vec<CocoAnnotation>,
    #[serde(default)]
    pub categories: Vec<CocoCategory>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoImage {
    pub id: u64,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ImageExtra>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Export-tool metadata; `name` is the frame's name before renaming
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoAnnotation {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    /// Flat `[x, y, v, ...]`
    #[serde(default)]
    pub keypoints: Vec<f64>,
    #[serde(default)]
    pub area: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Value>,
    #[serde(default)]
    pub iscrowd: u8,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoCategory {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keypoints: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skeleton: Vec<[usize; 2]>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl CocoImage {
    /// Name used for association: `extra.name` when present, else `file_name`
    pub fn source_name(&self) -> &str {
        self.extra
            .as_ref()
            .and_then(|e| e.name.as_deref())
            .unwrap_or(&self.file_name)
    }

    pub fn association(&self) -> std::result::Result<Association, MvpError> {
        let name = self.source_name();
        parse_image_name(name).ok_or_else(|| {
            MvpError::UnresolvedAssociation(format!(
                "image {} ({name}) does not match out<camera>_frame_<frame>",
                self.id
            ))
        })
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width?, self.height?))
    }
}

impl CocoAnnotation {
    pub fn keypoint_set(&self) -> Result<KeypointSet> {
        KeypointSet::from_flat(&self.keypoints).map_err(|e| {
            IoError::InvalidInput(format!("annotation {}: {e}", self.id))
        })
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bbox.map(BoundingBox::from_array)
    }
}

impl CocoDataset {
    pub fn load(path: &Path) -> Result<Self> {
        let dataset: Self = read_json(path)?;
        debug!(
            path = %path.display(),
            images = dataset.images.len(),
            annotations = dataset.annotations.len(),
            "COCO dataset loaded"
        );
        Ok(dataset)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    pub fn image_index(&self) -> HashMap<u64, &CocoImage> {
        self.images.iter().map(|img| (img.id, img)).collect()
    }

    /// Image ids with their resolved association, in image order
    pub fn image_associations(&self) -> Vec<(u64, Option<Association>)> {
        self.images
            .iter()
            .map(|img| (img.id, img.association().ok()))
            .collect()
    }

    /// One observation per annotation, in annotation order.
    ///
    /// `dimensions` is only consulted for images with an association;
    /// annotations of unknown images come back unassociated.
    pub fn observations<F>(&self, mut dimensions: F) -> Result<Vec<ImageObservation>>
    where
        F: FnMut(&CocoImage) -> Result<(u32, u32)>,
    {
        let index = self.image_index();
        let mut unknown = 0usize;
        let mut observations = Vec::with_capacity(self.annotations.len());

        for ann in &self.annotations {
            let keypoints = ann.keypoint_set()?;
            let bbox = ann.bounding_box();

            let (association, width, height) = match index.get(&ann.image_id) {
                Some(img) => match img.association() {
                    Ok(a) => {
                        let (w, h) = dimensions(img)?;
                        (Some(a), w, h)
                    }
                    Err(err) => {
                        debug!(%err, "image left unassociated");
                        let (w, h) = img.dimensions().unwrap_or((0, 0));
                        (None, w, h)
                    }
                },
                None => {
                    unknown += 1;
                    (None, 0, 0)
                }
            };

            observations.push(ImageObservation {
                image_id: ann.image_id,
                association,
                width,
                height,
                keypoints,
                bbox,
            });
        }

        if unknown > 0 {
            warn!(annotations = unknown, "annotations reference unknown images");
        }
        Ok(observations)
    }

    /// Write rectified keypoints and boxes back, pairing by annotation order
    pub fn apply_rectified(&mut self, rectified: &[RectifiedObservation]) -> Result<()> {
        if rectified.len() != self.annotations.len() {
            return Err(IoError::InvalidInput(format!(
                "{} rectified observations for {} annotations",
                rectified.len(),
                self.annotations.len()
            )));
        }

        for (ann, obs) in self.annotations.iter_mut().zip(rectified) {
            if ann.image_id != obs.image_id {
                return Err(IoError::InvalidInput(format!(
                    "annotation {} belongs to image {}, observation to image {}",
                    ann.id, ann.image_id, obs.image_id
                )));
            }
            if !obs.rectified {
                continue;
            }
            ann.keypoints = obs.keypoints.to_flat();
            if let Some(b) = obs.bbox {
                ann.bbox = Some(b.to_array());
            }
        }
        Ok(())
    }

    /// Dataset with the same images and categories whose annotations are
    /// the given reprojections, numbered from zero
    pub fn with_reprojections(&self, reprojections: &[ReprojectedObservation]) -> Result<Self> {
        let category_id = self
            .categories
            .first()
            .map(|c| c.id)
            .ok_or_else(|| IoError::InvalidInput("dataset has no categories".to_string()))?;

        let annotations = reprojections
            .iter()
            .enumerate()
            .map(|(i, r)| CocoAnnotation {
                id: i as u64,
                image_id: r.image_id,
                category_id,
                bbox: Some(r.bbox.to_array()),
                keypoints: r.keypoints.to_flat(),
                area: r.bbox.area(),
                segmentation: Some(Value::Array(Vec::new())),
                iscrowd: 0,
                rest: Map::new(),
            })
            .collect();

        Ok(Self {
            annotations,
            ..self.clone()
        })
    }
}
