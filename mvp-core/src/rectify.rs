//! Undistortion of raw keypoint and bounding-box observations

use nalgebra::Point2;

use crate::camera::UndistortMap;
use crate::observation::{BoundingBox, Keypoint2d, KeypointSet};

/// A rectified value plus how many lookups had to be clamped into the image
#[derive(Debug, Clone, PartialEq)]
pub struct Rectified<T> {
    pub value: T,
    pub clamped: usize,
}

/// Applies one camera's undistortion map to observations of that camera
#[derive(Debug, Clone, Copy)]
pub struct Rectifier<'a> {
    map: &'a UndistortMap,
}

impl<'a> Rectifier<'a> {
    pub fn new(map: &'a UndistortMap) -> Self {
        Self { map }
    }

    /// Look up the undistorted position of a raw pixel.
    ///
    /// The pixel is rounded to the nearest integer, ties to even, and clamped
    /// to the image, so out-of-image observations land on the nearest edge
    /// pixel. Returns whether clamping happened.
    pub fn rectify_point(&self, pixel: &Point2<f64>) -> (Point2<f64>, bool) {
        let (w, h) = self.map.size();
        let (col, clamped_x) = clamp_index(pixel.x, w);
        let (row, clamped_y) = clamp_index(pixel.y, h);
        (self.map.lookup(col, row), clamped_x || clamped_y)
    }

    /// Undistort every keypoint; visibility flags pass through unchanged
    pub fn rectify_keypoints(&self, keypoints: &KeypointSet) -> Rectified<KeypointSet> {
        let mut clamped = 0;
        let value = keypoints
            .iter()
            .map(|k| {
                let (p, c) = self.rectify_point(&k.position());
                clamped += usize::from(c);
                Keypoint2d::new(p.x, p.y, k.visibility)
            })
            .collect();

        Rectified { value, clamped }
    }

    /// Undistort the four corners and take their axis-aligned hull.
    ///
    /// Approximation: the undistorted image of a rectangle is generally not a
    /// rectangle, this returns its bounding box.
    pub fn rectify_bbox(&self, bbox: &BoundingBox) -> Rectified<BoundingBox> {
        let mut clamped = 0;
        let corners = bbox.corners().map(|c| {
            let (p, was_clamped) = self.rectify_point(&c);
            clamped += usize::from(was_clamped);
            p
        });

        let value = BoundingBox::enclosing(corners).unwrap_or(*bbox);
        Rectified { value, clamped }
    }
}

fn clamp_index(v: f64, len: usize) -> (usize, bool) {
    let max = len.saturating_sub(1) as f64;
    let r = v.round_ties_even();
    if r.is_nan() {
        return (0, true);
    }
    if r < 0.0 {
        (0, true)
    } else if r > max {
        (max as usize, true)
    } else {
        (r as usize, false)
    }
}
