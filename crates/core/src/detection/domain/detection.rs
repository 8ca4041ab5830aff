use crate::shared::geometry::{CoordinateSpace, CropSpace, CropTransform, Rect, WorkingSpace};

/// Tensors produced by an SSD-style detector for a single image.
///
/// `boxes` is flat, four values per candidate in `[min_y, min_x, max_y, max_x]`
/// order, normalized to `[0, 1]` relative to the image fed to the detector.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawOutput {
    pub scores: Vec<f32>,
    pub classes: Vec<i64>,
    pub boxes: Vec<f32>,
}

impl RawOutput {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// A labelled box in the pixel space of the raster the detector saw.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection<S: CoordinateSpace> {
    pub class_id: i64,
    pub label: String,
    pub score: f32,
    pub bbox: Rect<S>,
}

impl Detection<CropSpace> {
    pub fn to_working(&self, transform: &CropTransform) -> Detection<WorkingSpace> {
        Detection {
            class_id: self.class_id,
            label: self.label.clone(),
            score: self.score,
            bbox: transform.rect_to_working(&self.bbox),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::geometry::PixelRect;
    use approx::assert_relative_eq;

    #[test]
    fn test_raw_output_len() {
        let out = RawOutput {
            scores: vec![0.1, 0.2],
            classes: vec![1, 1],
            boxes: vec![0.0; 8],
        };
        assert_eq!(out.len(), 2);
        assert!(!out.is_empty());
        assert!(RawOutput::default().is_empty());
    }

    #[test]
    fn test_crop_detection_translates_to_working_space() {
        let det = Detection::<CropSpace> {
            class_id: 1,
            label: "tongue".into(),
            score: 0.9,
            bbox: Rect::new(20.0, 30.0, 40.0, 10.0),
        };
        let transform = CropTransform::new(PixelRect::new(100, 50, 120, 150));

        let moved = det.to_working(&transform);

        assert_relative_eq!(moved.bbox.x, 120.0);
        assert_relative_eq!(moved.bbox.y, 80.0);
        assert_relative_eq!(moved.bbox.width, 40.0);
        assert_relative_eq!(moved.bbox.height, 10.0);
        assert_eq!(moved.label, "tongue");
        assert_eq!(moved.class_id, 1);
    }
}
