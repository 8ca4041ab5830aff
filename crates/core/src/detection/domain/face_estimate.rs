//! Stage-one output: a face box plus ordered landmarks.
//!
//! Landmark order follows the BlazeFace convention: right eye, left eye,
//! nose, mouth, right ear, left ear. Index 3 is therefore the mouth.

use crate::shared::constants::MOUTH_LANDMARK;
use crate::shared::geometry::{CoordinateSpace, Point, Rect};

#[derive(Clone, Debug, PartialEq)]
pub struct FaceEstimate<S: CoordinateSpace> {
    pub top_left: Point<S>,
    pub bottom_right: Point<S>,
    pub landmarks: Vec<Point<S>>,
    pub score: f32,
}

impl<S: CoordinateSpace> FaceEstimate<S> {
    pub fn new(
        top_left: Point<S>,
        bottom_right: Point<S>,
        landmarks: Vec<Point<S>>,
        score: f32,
    ) -> Self {
        Self {
            top_left,
            bottom_right,
            landmarks,
            score,
        }
    }

    pub fn bbox(&self) -> Rect<S> {
        Rect::from_corners(self.top_left, self.bottom_right)
    }

    pub fn mouth(&self) -> Option<Point<S>> {
        self.landmarks.get(MOUTH_LANDMARK).copied()
    }

    /// Face box stretched downward to take in the chin and an open mouth.
    ///
    /// Width is unchanged; height is multiplied by `vertical_padding` while
    /// the top edge stays anchored at `top_left.y`.
    pub fn padded_region(&self, vertical_padding: f64) -> Rect<S> {
        let bbox = self.bbox();
        Rect::new(bbox.x, bbox.y, bbox.width, bbox.height * vertical_padding)
    }
}
