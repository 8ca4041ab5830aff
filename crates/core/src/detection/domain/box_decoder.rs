//! Turns raw SSD tensors into labelled pixel-space detections.
//!
//! Candidate order is preserved: callers that want "the" detection take the
//! first survivor, not the highest-scoring one.

use thiserror::Error;

use super::detection::{Detection, RawOutput};
use super::label_map::LabelMap;
use crate::shared::geometry::{CoordinateSpace, Rect};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("class id {0} is not in the label table")]
    UnknownClass(i64),
    #[error("malformed detector output: {scores} scores, {classes} classes, {boxes} box values")]
    MalformedOutput {
        scores: usize,
        classes: usize,
        boxes: usize,
    },
}

pub struct BoxDecoder {
    labels: LabelMap,
}

impl BoxDecoder {
    pub fn new(labels: LabelMap) -> Self {
        Self { labels }
    }

    /// Keeps candidates with `score > threshold`, scaled to a
    /// `space_width x space_height` raster in space `S`.
    pub fn decode<S: CoordinateSpace>(
        &self,
        scores: &[f32],
        classes: &[i64],
        boxes: &[f32],
        threshold: f32,
        space_width: f64,
        space_height: f64,
    ) -> Result<Vec<Detection<S>>, DecodeError> {
        if classes.len() < scores.len() || boxes.len() < scores.len() * 4 {
            return Err(DecodeError::MalformedOutput {
                scores: scores.len(),
                classes: classes.len(),
                boxes: boxes.len(),
            });
        }

        let mut detections = Vec::new();
        for (i, &score) in scores.iter().enumerate() {
            if score.is_nan() || score <= threshold {
                continue;
            }

            let class_id = classes[i];
            let label = self
                .labels
                .get(class_id)
                .ok_or(DecodeError::UnknownClass(class_id))?;

            let min_y = boxes[i * 4] as f64 * space_height;
            let min_x = boxes[i * 4 + 1] as f64 * space_width;
            let max_y = boxes[i * 4 + 2] as f64 * space_height;
            let max_x = boxes[i * 4 + 3] as f64 * space_width;

            detections.push(Detection {
                class_id,
                label: label.to_string(),
                score,
                bbox: Rect::new(min_x, min_y, max_x - min_x, max_y - min_y),
            });
        }

        Ok(detections)
    }

    pub fn decode_output<S: CoordinateSpace>(
        &self,
        output: &RawOutput,
        threshold: f32,
        space_width: f64,
        space_height: f64,
    ) -> Result<Vec<Detection<S>>, DecodeError> {
        self.decode(
            &output.scores,
            &output.classes,
            &output.boxes,
            threshold,
            space_width,
            space_height,
        )
    }
}

impl Default for BoxDecoder {
    fn default() -> Self {
        Self::new(LabelMap::default())
    }
}
