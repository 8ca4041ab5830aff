/// SSD feature detector using ONNX Runtime via `ort`.
///
/// Stage two of the pipeline. Expects a TensorFlow Object Detection API
/// export: a `uint8` NHWC image in, `detection_scores`, `detection_classes`
/// and `detection_boxes` out.
use std::path::Path;

use crate::detection::domain::detection::RawOutput;
use crate::detection::domain::feature_detector::FeatureDetector;
use crate::shared::frame::Frame;

use super::execution_provider::preferred_execution_providers;

const SCORES_OUTPUT: &str = "detection_scores";
const CLASSES_OUTPUT: &str = "detection_classes";
const BOXES_OUTPUT: &str = "detection_boxes";

/// Output positions used when the model does not carry the standard names.
/// The exported graph orders them boxes, classes, scores.
const FALLBACK_BOXES: usize = 0;
const FALLBACK_CLASSES: usize = 1;
const FALLBACK_SCORES: usize = 2;

/// Where each tensor lives in the session's output list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OutputLayout {
    scores: usize,
    classes: usize,
    boxes: usize,
}

impl OutputLayout {
    fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let names: Vec<&str> = names.into_iter().collect();
        let find = |wanted: &str, fallback: usize| {
            names
                .iter()
                .position(|n| *n == wanted || n.ends_with(&format!("/{wanted}")))
                .unwrap_or(fallback)
        };
        Self {
            scores: find(SCORES_OUTPUT, FALLBACK_SCORES),
            classes: find(CLASSES_OUTPUT, FALLBACK_CLASSES),
            boxes: find(BOXES_OUTPUT, FALLBACK_BOXES),
        }
    }

    fn required_outputs(&self) -> usize {
        self.scores.max(self.classes).max(self.boxes) + 1
    }
}

/// Tongue (or any SSD feature) detector backed by an ONNX Runtime session.
pub struct OnnxSsdFeatureDetector {
    session: ort::session::Session,
    layout: OutputLayout,
}

impl OnnxSsdFeatureDetector {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let layout = OutputLayout::from_names(session.outputs().iter().map(|o| o.name()));
        log::debug!("SSD output layout: {layout:?}");

        Ok(Self { session, layout })
    }
}

impl FeatureDetector for OnnxSsdFeatureDetector {
    fn run(&mut self, frame: &Frame) -> Result<RawOutput, Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("SSD detector needs RGB input, got {} channels", frame.channels()).into());
        }

        let input = to_nhwc_u8(frame)?;
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        if outputs.len() < self.layout.required_outputs() {
            return Err(format!(
                "SSD model expected at least {} outputs, got {}",
                self.layout.required_outputs(),
                outputs.len()
            )
            .into());
        }

        let scores = outputs[self.layout.scores].try_extract_array::<f32>()?;
        let boxes = outputs[self.layout.boxes].try_extract_array::<f32>()?;

        // Classes are float in the TF export but int64 in some converters.
        let classes: Vec<i64> = match outputs[self.layout.classes].try_extract_array::<f32>() {
            Ok(arr) => arr.iter().map(|&c| c.round() as i64).collect(),
            Err(_) => outputs[self.layout.classes]
                .try_extract_array::<i64>()?
                .iter()
                .copied()
                .collect(),
        };

        // Batch size is 1, so flattening keeps batch 0 in order.
        Ok(RawOutput {
            scores: scores.iter().copied().collect(),
            classes,
            boxes: boxes.iter().copied().collect(),
        })
    }
}

/// The crop's RGB bytes as a `[1, H, W, 3]` tensor, without conversion.
fn to_nhwc_u8(frame: &Frame) -> Result<ndarray::Array4<u8>, ndarray::ShapeError> {
    Ok(frame.view()?.insert_axis(ndarray::Axis(0)).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_by_name_in_any_order() {
        let layout = OutputLayout::from_names([
            "num_detections",
            "detection_scores",
            "detection_boxes",
            "detection_classes",
        ]);
        assert_eq!(
            layout,
            OutputLayout {
                scores: 1,
                classes: 3,
                boxes: 2
            }
        );
        assert_eq!(layout.required_outputs(), 4);
    }

    #[test]
    fn test_layout_matches_scoped_names() {
        let layout = OutputLayout::from_names([
            "out/detection_classes",
            "out/detection_boxes",
            "out/detection_scores",
        ]);
        assert_eq!(layout.classes, 0);
        assert_eq!(layout.boxes, 1);
        assert_eq!(layout.scores, 2);
    }

    #[test]
    fn test_layout_falls_back_to_positions() {
        let layout = OutputLayout::from_names(["Identity", "Identity_1", "Identity_2"]);
        assert_eq!(
            layout,
            OutputLayout {
                scores: FALLBACK_SCORES,
                classes: FALLBACK_CLASSES,
                boxes: FALLBACK_BOXES
            }
        );
    }

    #[test]
    fn test_nhwc_tensor_keeps_pixel_order() {
        let data: Vec<u8> = (0..2 * 3 * 3).map(|v| v as u8).collect();
        let frame = Frame::new(data, 3, 2, 3, 0);

        let t = to_nhwc_u8(&frame).unwrap();

        assert_eq!(t.shape(), &[1, 2, 3, 3]);
        // pixel (x=1, y=0) starts at byte 3
        assert_eq!(t[[0, 0, 1, 0]], 3);
        // pixel (x=2, y=1) channel 2 is the last byte
        assert_eq!(t[[0, 1, 2, 2]], 17);
    }
}
