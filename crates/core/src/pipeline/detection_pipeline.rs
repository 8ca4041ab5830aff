//! Per-tick orchestration of the two-stage detector.
//!
//! One tick: resize the raw frame to the working canvas, refresh the face
//! estimate if the tick is a full-detect tick, crop the padded face region,
//! run the feature detector on the crop, decode, derive the feedback offset
//! and hand everything to the renderer.

use std::time::Instant;

use crate::detection::domain::box_decoder::BoxDecoder;
use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_estimate::FaceEstimate;
use crate::detection::domain::feature_detector::FeatureDetector;
use crate::imaging::region_extractor::{CroppedFrame, RegionExtractor, ResizedFrame};
use crate::rendering::domain::renderer::{RenderInput, Renderer};
use crate::shared::constants::OFFSET_AREA_NORMALIZER;
use crate::shared::frame::Frame;
use crate::shared::geometry::{CoordinateSpace, CropSpace, PixelRect, RawSpace, Rect, WorkingSpace};

use super::pipeline_config::PipelineConfig;
use super::pipeline_logger::{metric, stage, PipelineLogger};
use super::pipeline_state::{PipelinePhase, PipelineState, TickCounter, TickMode};
use super::startup_error::StartupError;

/// What a tick produced, for consumers of the feedback signal.
#[derive(Clone, Debug, PartialEq)]
pub struct TickOutput {
    /// Zero-based count of ticks run before this one.
    pub tick: u64,
    pub mode: TickMode,
    pub face: Option<FaceEstimate<WorkingSpace>>,
    /// Padded, clamped face window the crop was cut from.
    pub face_region: Option<PixelRect<WorkingSpace>>,
    pub feature: Option<Detection<WorkingSpace>>,
    /// `feature` mapped back onto the camera frame.
    pub feature_in_raw: Option<Rect<RawSpace>>,
    pub offset: f64,
}

/// Offset for a feature box: pixel area over a fixed normalizer.
pub fn feedback_offset<S: CoordinateSpace>(bbox: &Rect<S>) -> f64 {
    bbox.area() / OFFSET_AREA_NORMALIZER
}

/// Rasters a tick built, kept so they can be rendered even if a later
/// stage fails.
#[derive(Default)]
struct TickArtifacts {
    canvas: Option<ResizedFrame>,
    crop: Option<CroppedFrame>,
    detections: Vec<Detection<CropSpace>>,
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

pub struct DetectionPipeline {
    config: PipelineConfig,
    face_detector: Box<dyn FaceDetector>,
    feature_detector: Box<dyn FeatureDetector>,
    renderer: Box<dyn Renderer>,
    logger: Box<dyn PipelineLogger>,
    extractor: RegionExtractor,
    decoder: BoxDecoder,
    state: PipelineState,
}

impl DetectionPipeline {
    /// Validates `config` and wires the capabilities together. The pipeline
    /// starts `Idle`.
    pub fn new(
        config: PipelineConfig,
        face_detector: Box<dyn FaceDetector>,
        feature_detector: Box<dyn FeatureDetector>,
        renderer: Box<dyn Renderer>,
        logger: Box<dyn PipelineLogger>,
    ) -> Result<Self, StartupError> {
        config.validate()?;
        let counter = TickCounter::new(config.decimation_interval, config.tick_wrap_period)
            .map_err(|e| super::pipeline_config::ConfigError::Invalid(e.to_string()))?;
        if counter.wrap_period() != config.tick_wrap_period as u64 {
            log::info!(
                "tick wrap period rounded from {} to {} to stay a multiple of {}",
                config.tick_wrap_period,
                counter.wrap_period(),
                config.decimation_interval
            );
        }

        Ok(Self {
            decoder: BoxDecoder::new(config.labels.clone()),
            extractor: RegionExtractor::default(),
            state: PipelineState::new(counter),
            config,
            face_detector,
            feature_detector,
            renderer,
            logger,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn phase(&self) -> PipelinePhase {
        self.state.phase
    }

    /// Offset of the most recent tick.
    pub fn offset(&self) -> f64 {
        self.state.feedback_offset
    }

    pub fn logger_mut(&mut self) -> &mut dyn PipelineLogger {
        self.logger.as_mut()
    }

    /// Moves to the terminal phase and emits the session summary.
    /// Idempotent.
    pub fn stop(&mut self) {
        if self.state.phase == PipelinePhase::Stopped {
            return;
        }
        self.state.phase = PipelinePhase::Stopped;
        self.logger.info(&format!(
            "Pipeline stopped after {} ticks",
            self.state.ticks_completed
        ));
        self.logger.summary();
    }

    /// Runs one full tick on `raw`.
    ///
    /// Never fails: any steady-state error is logged and the tick reports no
    /// detection. A stopped pipeline does nothing and reports offset 0.
    pub fn tick(&mut self, raw: &Frame) -> TickOutput {
        let mode = self.state.counter.mode();
        let mut output = TickOutput {
            tick: self.state.ticks_completed,
            mode,
            face: None,
            face_region: None,
            feature: None,
            feature_in_raw: None,
            offset: 0.0,
        };

        match self.state.phase {
            PipelinePhase::Stopped => {
                log::debug!("tick requested on a stopped pipeline");
                return output;
            }
            PipelinePhase::Idle => {
                self.state.phase = PipelinePhase::Running;
                self.logger.info(&format!(
                    "First frame {}x{}, pipeline running",
                    raw.width(),
                    raw.height()
                ));
            }
            PipelinePhase::Running => {}
        }

        let mut artifacts = TickArtifacts::default();
        if let Err(e) = self.run_stages(raw, mode, &mut artifacts, &mut output) {
            log::warn!("tick {}: {e}; no detection this tick", output.tick);
            artifacts.detections.clear();
            output.feature = None;
            output.feature_in_raw = None;
            output.offset = 0.0;
        }

        if self.config.preview_enabled {
            self.render(&artifacts, &output);
        }

        self.state.feedback_offset = output.offset;
        self.logger.metric(metric::OFFSET, output.offset);
        self.logger
            .metric(metric::FACE_CACHE_AGE, self.state.face_age as f64);

        self.state.counter.advance();
        self.state.ticks_completed += 1;
        self.logger.tick(self.state.ticks_completed);

        output
    }

    fn run_stages(
        &mut self,
        raw: &Frame,
        mode: TickMode,
        artifacts: &mut TickArtifacts,
        output: &mut TickOutput,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let max = self.config.working_canvas_max_size;
        let t = Instant::now();
        let resized = self.extractor.resize(raw, max, max)?;
        self.logger.timing(stage::RESIZE, elapsed_ms(t));

        let canvas = &artifacts.canvas.insert(resized).frame;
        self.refresh_face(canvas, mode);

        let Some(face) = self.state.last_face_estimate.clone() else {
            return Ok(());
        };
        let region = face
            .padded_region(self.config.face_box_vertical_padding)
            .clamp_to_pixels(canvas.width(), canvas.height());
        output.face = Some(face);
        let Some(window) = region else {
            log::debug!("face region lies outside the working canvas");
            return Ok(());
        };
        output.face_region = Some(window);

        let t = Instant::now();
        let crop = self.extractor.crop(canvas, window)?;
        self.logger.timing(stage::EXTRACT, elapsed_ms(t));
        let crop = artifacts.crop.insert(crop);

        let t = Instant::now();
        let raw_output = self.feature_detector.run(&crop.frame)?;
        self.logger.timing(stage::STAGE_TWO, elapsed_ms(t));

        let t = Instant::now();
        artifacts.detections = self.decoder.decode_output::<CropSpace>(
            &raw_output,
            self.config.stage_two_threshold,
            crop.frame.width() as f64,
            crop.frame.height() as f64,
        )?;
        self.logger.timing(stage::DECODE, elapsed_ms(t));

        if let Some(first) = artifacts.detections.first() {
            let feature = first.to_working(&crop.transform);
            output.offset = feedback_offset(&first.bbox);
            if let Some(canvas) = &artifacts.canvas {
                output.feature_in_raw = Some(canvas.transform.rect_to_raw(&feature.bbox));
            }
            output.feature = Some(feature);
        }

        Ok(())
    }

    /// Full-detect ticks replace the cached estimate (with nothing if stage
    /// one finds no face or fails); decimated ticks age it.
    fn refresh_face(&mut self, canvas: &Frame, mode: TickMode) {
        match mode {
            TickMode::FullDetect => {
                let t = Instant::now();
                self.state.last_face_estimate = match self.face_detector.estimate(canvas) {
                    Ok(faces) => faces.into_iter().next(),
                    Err(e) => {
                        log::warn!("face detection failed: {e}");
                        None
                    }
                };
                self.state.face_age = 0;
                self.logger.timing(stage::STAGE_ONE, elapsed_ms(t));
            }
            TickMode::Decimated => {
                self.state.face_age += 1;
            }
        }
    }

    fn render(&mut self, artifacts: &TickArtifacts, output: &TickOutput) {
        let Some(canvas) = &artifacts.canvas else {
            return;
        };
        let input = RenderInput {
            tick: output.tick,
            canvas: &canvas.frame,
            face: output.face.as_ref(),
            crop: artifacts.crop.as_ref(),
            detections: &artifacts.detections,
            offset: output.offset,
        };
        let t = Instant::now();
        if let Err(e) = self.renderer.draw(&input) {
            log::warn!("render failed: {e}");
        }
        self.logger.timing(stage::RENDER, elapsed_ms(t));
    }
}
