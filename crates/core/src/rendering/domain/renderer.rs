use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_estimate::FaceEstimate;
use crate::imaging::region_extractor::CroppedFrame;
use crate::shared::frame::Frame;
use crate::shared::geometry::{CropSpace, WorkingSpace};

/// Everything one tick produced, borrowed for the duration of a draw call.
///
/// `detections` stay in crop space; a renderer that paints them onto
/// `canvas` must go through `crop.transform`.
pub struct RenderInput<'a> {
    pub tick: u64,
    pub canvas: &'a Frame,
    pub face: Option<&'a FaceEstimate<WorkingSpace>>,
    pub crop: Option<&'a CroppedFrame>,
    pub detections: &'a [Detection<CropSpace>],
    pub offset: f64,
}

impl RenderInput<'_> {
    /// The selected feature box in working-canvas pixels.
    pub fn feature_in_working_space(&self) -> Option<Detection<WorkingSpace>> {
        let crop = self.crop?;
        self.detections
            .first()
            .map(|d| d.to_working(&crop.transform))
    }
}

/// Visualisation side effect. The pipeline ignores what it does and only
/// logs a failure.
pub trait Renderer: Send {
    fn draw(&mut self, input: &RenderInput<'_>) -> Result<(), Box<dyn std::error::Error>>;
}

/// Renderer for headless runs.
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn draw(&mut self, _input: &RenderInput<'_>) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
