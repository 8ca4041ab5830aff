use std::sync::atomic::{AtomicBool, Ordering};

use crate::capture::domain::frame_source::FrameSource;

use super::detection_pipeline::{DetectionPipeline, TickOutput};
use super::frame_pacer::FramePacer;
use super::pipeline_logger::metric;
use super::pipeline_state::PipelinePhase;

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    EndOfStream,
    TickLimit,
    SourceFailed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub last_offset: f64,
    pub reason: StopReason,
}

/// Drives a [`DetectionPipeline`] from a [`FrameSource`]: one frame per
/// tick, paced, until cancelled or the stream ends.
pub struct PipelineRunner {
    pipeline: DetectionPipeline,
    pacer: FramePacer,
    max_ticks: Option<u64>,
}

impl PipelineRunner {
    pub fn new(pipeline: DetectionPipeline) -> Self {
        let pacer = FramePacer::new(pipeline.config().target_fps);
        Self {
            pipeline,
            pacer,
            max_ticks: None,
        }
    }

    /// Stop after this many ticks.
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    pub fn pipeline(&self) -> &DetectionPipeline {
        &self.pipeline
    }

    /// Runs ticks until `cancelled` is set, the source ends or the tick
    /// limit is hit. The current tick always finishes; the source is closed
    /// and the pipeline stopped before returning.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        cancelled: &AtomicBool,
        mut on_tick: impl FnMut(&TickOutput),
    ) -> RunSummary {
        let reason = self.run_loop(source, cancelled, &mut on_tick);

        source.close();
        self.pipeline.stop();

        RunSummary {
            ticks: self.pipeline.state().ticks_completed,
            last_offset: self.pipeline.offset(),
            reason,
        }
    }

    fn run_loop(
        &mut self,
        source: &mut dyn FrameSource,
        cancelled: &AtomicBool,
        on_tick: &mut impl FnMut(&TickOutput),
    ) -> StopReason {
        loop {
            if cancelled.load(Ordering::Relaxed) {
                return StopReason::Cancelled;
            }
            if self
                .max_ticks
                .is_some_and(|max| self.pipeline.state().ticks_completed >= max)
            {
                return StopReason::TickLimit;
            }
            if self.pipeline.phase() == PipelinePhase::Stopped {
                return StopReason::Cancelled;
            }

            self.pacer.wait();

            let frame = match source.current_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return StopReason::EndOfStream,
                Err(e) => {
                    log::error!("frame source failed: {e}");
                    return StopReason::SourceFailed;
                }
            };

            let output = self.pipeline.tick(&frame);
            self.pipeline
                .logger_mut()
                .metric(metric::DROPPED_FRAMES, source.dropped_frames() as f64);
            on_tick(&output);
        }
    }
}
