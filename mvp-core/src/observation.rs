//! 2D keypoint observations and their identifiers

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::error::{MvpError, Result};

pub type CameraId = u32;
pub type FrameIndex = u32;

/// Per-keypoint visibility tag, COCO convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Visibility {
    #[default]
    Absent = 0,
    /// Labeled but not visible
    Occluded = 1,
    Visible = 2,
}

impl TryFrom<u8> for Visibility {
    type Error = MvpError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Visibility::Absent),
            1 => Ok(Visibility::Occluded),
            2 => Ok(Visibility::Visible),
            other => Err(MvpError::InvalidInput(format!(
                "visibility flag must be 0, 1 or 2, got {other}"
            ))),
        }
    }
}

impl From<Visibility> for u8 {
    fn from(v: Visibility) -> Self {
        v as u8
    }
}

impl Visibility {
    /// Parse a flag stored as a float in a flat keypoint array
    pub fn from_f64(value: f64) -> Result<Self> {
        if value.fract() != 0.0 || !(0.0..=255.0).contains(&value) {
            return Err(MvpError::InvalidInput(format!(
                "visibility flag must be an integer, got {value}"
            )));
        }
        Self::try_from(value as u8)
    }
}

/// A single 2D keypoint in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint2d {
    pub x: f64,
    pub y: f64,
    pub visibility: Visibility,
}

impl Keypoint2d {
    pub fn new(x: f64, y: f64, visibility: Visibility) -> Self {
        Self { x, y, visibility }
    }

    pub fn visible(x: f64, y: f64) -> Self {
        Self::new(x, y, Visibility::Visible)
    }

    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }
}

/// One keypoint per joint, in fixed skeleton order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeypointSet {
    keypoints: Vec<Keypoint2d>,
}

impl KeypointSet {
    pub fn new(keypoints: Vec<Keypoint2d>) -> Self {
        Self { keypoints }
    }

    /// Build from flat `[x, y, v, x, y, v, ...]` triples
    pub fn from_flat(flat: &[f64]) -> Result<Self> {
        if flat.len() % 3 != 0 {
            return Err(MvpError::InvalidInput(format!(
                "keypoint array length {} is not a multiple of 3",
                flat.len()
            )));
        }

        let keypoints = flat
            .chunks_exact(3)
            .map(|t| Ok(Keypoint2d::new(t[0], t[1], Visibility::from_f64(t[2])?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { keypoints })
    }

    /// Flatten back to `[x, y, v, ...]`
    pub fn to_flat(&self) -> Vec<f64> {
        self.keypoints
            .iter()
            .flat_map(|k| [k.x, k.y, f64::from(u8::from(k.visibility))])
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn get(&self, joint: usize) -> Option<&Keypoint2d> {
        self.keypoints.get(joint)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Keypoint2d> {
        self.keypoints.iter()
    }
}

impl FromIterator<Keypoint2d> for KeypointSet {
    fn from_iter<I: IntoIterator<Item = Keypoint2d>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Axis-aligned box, COCO `[x, y, width, height]`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_array(b: [f64; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x, self.y, self.width, self.height]
    }

    /// Smallest box containing all points; None for an empty iterator
    pub fn enclosing<I: IntoIterator<Item = Point2<f64>>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut x_min, mut y_min, mut x_max, mut y_max) = (first.x, first.y, first.x, first.y);
        for p in iter {
            x_min = x_min.min(p.x);
            y_min = y_min.min(p.y);
            x_max = x_max.max(p.x);
            y_max = y_max.max(p.y);
        }
        Some(Self::new(x_min, y_min, x_max - x_min, y_max - y_min))
    }

    /// Corners in order top-left, top-right, bottom-left, bottom-right
    pub fn corners(&self) -> [Point2<f64>; 4] {
        let (x1, y1) = (self.x + self.width, self.y + self.height);
        [
            Point2::new(self.x, self.y),
            Point2::new(x1, self.y),
            Point2::new(self.x, y1),
            Point2::new(x1, y1),
        ]
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Camera and frame an image belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Association {
    pub camera: CameraId,
    pub frame: FrameIndex,
}

impl Association {
    pub fn new(camera: CameraId, frame: FrameIndex) -> Self {
        Self { camera, frame }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_set_from_flat() {
        let set = KeypointSet::from_flat(&[10.0, 20.0, 2.0, 0.0, 0.0, 0.0, 5.5, 6.5, 1.0]).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.get(0), Some(&Keypoint2d::visible(10.0, 20.0)));
        assert_eq!(set.get(1).unwrap().visibility, Visibility::Absent);
        assert_eq!(set.get(2).unwrap().visibility, Visibility::Occluded);
        assert_eq!(set.to_flat(), vec![10.0, 20.0, 2.0, 0.0, 0.0, 0.0, 5.5, 6.5, 1.0]);
    }

    #[test]
    fn test_keypoint_set_rejects_ragged_array() {
        let result = KeypointSet::from_flat(&[1.0, 2.0]);
        assert!(matches!(result, Err(MvpError::InvalidInput(_))));
    }

    #[test]
    fn test_visibility_rejects_unknown_flag() {
        assert!(Visibility::try_from(3).is_err());
        assert!(Visibility::from_f64(1.5).is_err());
        assert!(Visibility::from_f64(-1.0).is_err());
        assert_eq!(Visibility::from_f64(2.0).unwrap(), Visibility::Visible);
    }

    #[test]
    fn test_visibility_ordering() {
        assert!(Visibility::Absent < Visibility::Occluded);
        assert!(Visibility::Occluded < Visibility::Visible);
    }

    #[test]
    fn test_bbox_enclosing() {
        let pts = [
            Point2::new(3.0, 4.0),
            Point2::new(-1.0, 10.0),
            Point2::new(7.0, 2.0),
        ];
        let b = BoundingBox::enclosing(pts).unwrap();
        assert_eq!(b, BoundingBox::new(-1.0, 2.0, 8.0, 8.0));
        assert_eq!(b.area(), 64.0);
        assert!(BoundingBox::enclosing(Vec::new()).is_none());
    }

    #[test]
    fn test_bbox_corners() {
        let b = BoundingBox::new(1.0, 2.0, 3.0, 4.0);
        let c = b.corners();
        assert_eq!(c[0], Point2::new(1.0, 2.0));
        assert_eq!(c[3], Point2::new(4.0, 6.0));
    }
}
