use crate::detection::domain::face_estimate::FaceEstimate;
use crate::shared::geometry::WorkingSpace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelinePhase {
    /// No frame seen yet.
    Idle,
    Running,
    /// Terminal. The source has been closed.
    Stopped,
}

/// Whether a tick refreshes the face estimate or reuses the cached one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickMode {
    FullDetect,
    Decimated,
}

/// Bounded tick counter driving stage-one decimation.
///
/// The wrap period is always a multiple of the interval, so wrapping never
/// shifts the full-detect cadence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickCounter {
    value: u64,
    interval: u64,
    wrap: u64,
}

impl TickCounter {
    /// `requested_wrap` is rounded up to the next multiple of `interval`
    /// (and to at least one interval).
    pub fn new(interval: u32, requested_wrap: u32) -> Result<Self, &'static str> {
        if interval < 1 {
            return Err("decimation interval must be >= 1");
        }
        let interval = interval as u64;
        let wrap = (requested_wrap as u64).div_ceil(interval).max(1) * interval;
        Ok(Self {
            value: 0,
            interval,
            wrap,
        })
    }

    pub fn mode(&self) -> TickMode {
        if self.value % self.interval == 0 {
            TickMode::FullDetect
        } else {
            TickMode::Decimated
        }
    }

    pub fn advance(&mut self) {
        self.value = (self.value + 1) % self.wrap;
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn wrap_period(&self) -> u64 {
        self.wrap
    }
}

/// Everything carried from one tick to the next. Owned by a single
/// orchestrator; never shared.
#[derive(Clone, Debug)]
pub struct PipelineState {
    pub phase: PipelinePhase,
    pub counter: TickCounter,
    pub last_face_estimate: Option<FaceEstimate<WorkingSpace>>,
    /// Ticks since `last_face_estimate` was produced.
    pub face_age: u64,
    pub feedback_offset: f64,
    pub ticks_completed: u64,
}

impl PipelineState {
    pub fn new(counter: TickCounter) -> Self {
        Self {
            phase: PipelinePhase::Idle,
            counter,
            last_face_estimate: None,
            face_age: 0,
            feedback_offset: 0.0,
            ticks_completed: 0,
        }
    }
}
