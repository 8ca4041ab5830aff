use crate::shared::frame::Frame;

use super::detection::RawOutput;

/// Stage-two capability: raw SSD tensors for one image.
///
/// Boxes come back normalized; `BoxDecoder` maps them into the pixel space
/// of the frame that was passed in.
pub trait FeatureDetector: Send {
    fn run(&mut self, frame: &Frame) -> Result<RawOutput, Box<dyn std::error::Error>>;
}
