use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;

use crate::capture::domain::frame_source::FrameSource;
use crate::pipeline::detection_pipeline::TickOutput;
use crate::pipeline::pipeline_runner::{PipelineRunner, RunSummary, StopReason};
use crate::pipeline::pipeline_state::TickMode;
use crate::shared::geometry::{Rect, WorkingSpace};

/// Owned digest of one tick, cheap to send across threads.
#[derive(Clone, Debug, PartialEq)]
pub struct TickSummary {
    pub tick: u64,
    pub mode: TickMode,
    pub face_found: bool,
    pub feature: Option<Rect<WorkingSpace>>,
    pub offset: f64,
}

impl From<&TickOutput> for TickSummary {
    fn from(out: &TickOutput) -> Self {
        Self {
            tick: out.tick,
            mode: out.mode,
            face_found: out.face.is_some(),
            feature: out.feature.as_ref().map(|d| d.bbox),
            offset: out.offset,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RunnerEvent {
    Tick(TickSummary),
    Stopped(RunSummary),
    Error(String),
}

pub struct RunnerHandle {
    pub events: Receiver<RunnerEvent>,
    pub cancelled: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl RunnerHandle {
    /// Requests a stop after the current tick.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Waits for the pipeline thread to exit.
    pub fn join(self) -> Result<(), String> {
        self.thread
            .join()
            .map_err(|_| "pipeline thread panicked".to_string())
    }
}

/// Runs `runner` on its own thread. Every tick is published as a
/// [`RunnerEvent::Tick`]; `Stopped` is always the last event, preceded by
/// `Error` if the frame source failed.
pub fn spawn(mut runner: PipelineRunner, mut source: Box<dyn FrameSource>) -> RunnerHandle {
    let (tx, rx) = crossbeam_channel::unbounded::<RunnerEvent>();
    let cancelled = Arc::new(AtomicBool::new(false));
    let cancelled_clone = cancelled.clone();

    let thread = thread::spawn(move || {
        let summary = runner.run(source.as_mut(), &cancelled_clone, |out| {
            if tx.send(RunnerEvent::Tick(out.into())).is_err() {
                // Nobody is listening any more.
                cancelled_clone.store(true, Ordering::Relaxed);
            }
        });
        if summary.reason == StopReason::SourceFailed {
            let _ = tx.send(RunnerEvent::Error("frame source failed".into()));
        }
        let _ = tx.send(RunnerEvent::Stopped(summary));
    });

    RunnerHandle {
        events: rx,
        cancelled,
        thread,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::infrastructure::image_file_source::ImageFileSource;
    use crate::detection::domain::detection::RawOutput;
    use crate::detection::domain::face_detector::FaceDetector;
    use crate::detection::domain::face_estimate::FaceEstimate;
    use crate::detection::domain::feature_detector::FeatureDetector;
    use crate::pipeline::detection_pipeline::DetectionPipeline;
    use crate::pipeline::pipeline_config::PipelineConfig;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::rendering::domain::renderer::NullRenderer;
    use crate::shared::frame::Frame;
    use crate::shared::geometry::Point;

    struct FixedFace;

    impl FaceDetector for FixedFace {
        fn estimate(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<FaceEstimate<WorkingSpace>>, Box<dyn std::error::Error>> {
            Ok(vec![FaceEstimate::new(
                Point::new(10.0, 10.0),
                Point::new(110.0, 110.0),
                vec![],
                0.9,
            )])
        }
    }

    struct FixedTongue;

    impl FeatureDetector for FixedTongue {
        fn run(&mut self, _frame: &Frame) -> Result<RawOutput, Box<dyn std::error::Error>> {
            Ok(RawOutput {
                scores: vec![0.9],
                classes: vec![1],
                boxes: vec![0.1, 0.2, 0.3, 0.4],
            })
        }
    }

    fn runner(target_fps: f64) -> PipelineRunner {
        let pipeline = DetectionPipeline::new(
            PipelineConfig {
                target_fps,
                ..PipelineConfig::default()
            },
            Box::new(FixedFace),
            Box::new(FixedTongue),
            Box::new(NullRenderer),
            Box::new(NullPipelineLogger),
        )
        .unwrap();
        PipelineRunner::new(pipeline)
    }

    fn still(frames: usize) -> Box<dyn FrameSource> {
        Box::new(ImageFileSource::from_frame(
            Frame::new(vec![120; 400 * 400 * 3], 400, 400, 3, 0),
            frames,
        ))
    }

    #[test]
    fn test_publishes_every_tick_then_stopped() {
        let handle = spawn(runner(0.0), still(15));

        let events: Vec<RunnerEvent> = handle.events.iter().collect();

        assert_eq!(events.len(), 16);
        let full_detects = events
            .iter()
            .filter(|e| matches!(e, RunnerEvent::Tick(t) if t.mode == TickMode::FullDetect))
            .count();
        assert_eq!(full_detects, 2);
        match &events[0] {
            RunnerEvent::Tick(t) => {
                assert!(t.face_found);
                assert!((t.offset - 0.0125).abs() < 1e-6);
            }
            other => panic!("expected tick, got {other:?}"),
        }
        match events.last().unwrap() {
            RunnerEvent::Stopped(summary) => {
                assert_eq!(summary.ticks, 15);
                assert_eq!(summary.reason, StopReason::EndOfStream);
            }
            other => panic!("expected stop, got {other:?}"),
        }
        handle.join().unwrap();
    }

    #[test]
    fn test_cancel_stops_long_run() {
        let handle = spawn(runner(200.0), still(usize::MAX));

        let first = handle.events.recv().unwrap();
        assert!(matches!(first, RunnerEvent::Tick(_)));
        handle.cancel();

        let last = handle.events.iter().last().unwrap();
        match last {
            RunnerEvent::Stopped(summary) => assert_eq!(summary.reason, StopReason::Cancelled),
            other => panic!("expected stop, got {other:?}"),
        }
        handle.join().unwrap();
    }

    #[test]
    fn test_summary_from_output() {
        let out = TickOutput {
            tick: 4,
            mode: TickMode::Decimated,
            face: None,
            face_region: None,
            feature: None,
            feature_in_raw: None,
            offset: 0.0,
        };
        let summary = TickSummary::from(&out);
        assert_eq!(summary.tick, 4);
        assert!(!summary.face_found);
        assert!(summary.feature.is_none());
    }
}
