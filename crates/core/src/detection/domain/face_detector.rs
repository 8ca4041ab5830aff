use crate::shared::frame::Frame;
use crate::shared::geometry::WorkingSpace;

use super::face_estimate::FaceEstimate;

/// Stage-one capability: finds faces on the working canvas.
///
/// Estimates are in pixel coordinates of the frame passed in, best
/// candidate first. The pipeline only ever feeds the working canvas.
/// Implementations may keep inference state, hence `&mut self`.
pub trait FaceDetector: Send {
    fn estimate(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<FaceEstimate<WorkingSpace>>, Box<dyn std::error::Error>>;
}
