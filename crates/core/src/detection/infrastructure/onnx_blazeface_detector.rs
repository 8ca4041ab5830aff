/// BlazeFace face detector using ONNX Runtime via `ort`.
///
/// Stage one of the pipeline: a lightweight short-range model that gives a
/// face box plus six landmarks (eyes, nose, mouth, ears) per face.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_estimate::FaceEstimate;
use crate::shared::frame::Frame;
use crate::shared::geometry::{Point, WorkingSpace};

use super::execution_provider::preferred_execution_providers;
use super::math::{greedy_nms, sigmoid};

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Default confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor tensor: 4 box + 6 keypoints * 2.
const REGRESSOR_STRIDE: usize = 16;

const NUM_KEYPOINTS: usize = 6;

/// Raw logits are clipped before the sigmoid, as in the reference graph.
const SCORE_CLIP: f32 = 100.0;

/// BlazeFace face detector backed by an ONNX Runtime session.
pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    /// Load a BlazeFace ONNX model.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;
        let anchors = generate_anchors();
        Ok(Self {
            session,
            confidence,
            anchors,
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn estimate(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<FaceEstimate<WorkingSpace>>, Box<dyn std::error::Error>> {
        // 1. Preprocess: resize to 128x128, normalize to [-1,1], NCHW
        let input_tensor = preprocess(frame, INPUT_SIZE);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // - regressors: [1, 896, 16] (box deltas + keypoints)
        // - classificators: [1, 896, 1] (confidence logits)
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        // 3. Decode anchors, 4. NMS
        let raw = decode(
            reg_data,
            score_data,
            &self.anchors,
            self.confidence as f32,
        );
        let kept = greedy_nms(raw, NMS_IOU_THRESH, |d| d.score as f64, |d| d.bbox());

        Ok(kept
            .iter()
            .map(|d| d.to_estimate(frame.width(), frame.height()))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize frame to `size x size` (nearest sample) and normalize to [-1,1]
/// NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let (src_w, src_h) = (frame.width(), frame.height());
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    if src_h == 0 || src_w == 0 || frame.channels() < 3 {
        return tensor;
    }

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as u32).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as u32).min(src_w - 1);
            if let Some(px) = frame.pixel(src_x, src_y) {
                for c in 0..3 {
                    tensor[[0, c, y, x]] = px[c] as f32 / 127.5 - 1.0;
                }
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Anchor generation (BlazeFace short-range)
// ---------------------------------------------------------------------------

/// The short-range model uses two feature map sizes: 16x16 and 8x8,
/// with 2 and 6 anchors per cell respectively.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// One candidate in normalized [0,1] image coordinates.
#[derive(Clone, Debug)]
struct RawFace {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    keypoints: [[f32; 2]; NUM_KEYPOINTS],
}

impl RawFace {
    fn bbox(&self) -> [f64; 4] {
        [
            self.x1 as f64,
            self.y1 as f64,
            self.x2 as f64,
            self.y2 as f64,
        ]
    }

    fn to_estimate(&self, frame_w: u32, frame_h: u32) -> FaceEstimate<WorkingSpace> {
        let fw = frame_w as f64;
        let fh = frame_h as f64;
        let top_left = Point::new(
            (self.x1 as f64 * fw).clamp(0.0, fw),
            (self.y1 as f64 * fh).clamp(0.0, fh),
        );
        let bottom_right = Point::new(
            (self.x2 as f64 * fw).clamp(0.0, fw),
            (self.y2 as f64 * fh).clamp(0.0, fh),
        );
        let landmarks = self
            .keypoints
            .iter()
            .map(|[kx, ky]| Point::new(*kx as f64 * fw, *ky as f64 * fh))
            .collect();
        FaceEstimate::new(top_left, bottom_right, landmarks, self.score)
    }
}

fn decode(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    confidence: f32,
) -> Vec<RawFace> {
    let size = INPUT_SIZE as f32;
    let mut faces = Vec::new();

    for (i, &logit) in score_data.iter().enumerate().take(anchors.len()) {
        let score = sigmoid(logit.clamp(-SCORE_CLIP, SCORE_CLIP));
        if score < confidence {
            continue;
        }

        let offset = i * REGRESSOR_STRIDE;
        let Some(reg) = reg_data.get(offset..offset + REGRESSOR_STRIDE) else {
            break;
        };
        let anchor = anchors[i];

        // Box center + size relative to anchor
        let cx = anchor[0] + reg[0] / size;
        let cy = anchor[1] + reg[1] / size;
        let w = reg[2] / size;
        let h = reg[3] / size;

        let mut keypoints = [[0.0f32; 2]; NUM_KEYPOINTS];
        for (k, kp) in keypoints.iter_mut().enumerate() {
            kp[0] = anchor[0] + reg[4 + k * 2] / size;
            kp[1] = anchor[1] + reg[5 + k * 2] / size;
        }

        faces.push(RawFace {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
            score,
            keypoints,
        });
    }

    faces
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
