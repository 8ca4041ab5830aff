use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Stage names reported through [`PipelineLogger::timing`].
pub mod stage {
    pub const RESIZE: &str = "resize";
    pub const STAGE_ONE: &str = "stage_one";
    pub const EXTRACT: &str = "extract";
    pub const STAGE_TWO: &str = "stage_two";
    pub const DECODE: &str = "decode";
    pub const RENDER: &str = "render";
}

/// Metric names reported through [`PipelineLogger::metric`].
pub mod metric {
    pub const OFFSET: &str = "offset";
    pub const FACE_CACHE_AGE: &str = "face_cache_age";
    /// Camera frames overwritten before a tick picked them up.
    pub const DROPPED_FRAMES: &str = "dropped_frames";
}

/// Observer for tick-level pipeline events.
///
/// Keeps the orchestrator free of any particular output mechanism.
pub trait PipelineLogger: Send {
    /// Called once per completed tick with the running tick count.
    fn tick(&mut self, completed: u64);

    /// Record how long a named stage took within one tick.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (offset, cache age).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Logger that discards everything. For tests and embedding.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn tick(&mut self, _completed: u64) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running aggregate of one timing or metric series.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SeriesStats {
    pub count: u64,
    pub sum: f64,
    pub max: f64,
    pub last: f64,
}

impl SeriesStats {
    fn record(&mut self, value: f64) {
        self.max = if self.count == 0 {
            value
        } else {
            self.max.max(value)
        };
        self.count += 1;
        self.sum += value;
        self.last = value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Most recent info messages kept for inspection.
const MAX_MESSAGES: usize = 32;

/// Aggregates per-stage timings and metrics, logs a progress line every
/// `throttle_ticks` ticks and a summary at the end of the session.
///
/// Memory stays constant however long the session runs.
pub struct StdoutPipelineLogger {
    throttle_ticks: u64,
    timings: HashMap<String, SeriesStats>,
    metrics: HashMap<String, SeriesStats>,
    start_time: Instant,
    ticks: u64,
    messages: VecDeque<String>,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_ticks: u64) -> Self {
        Self {
            throttle_ticks: throttle_ticks.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            ticks: 0,
            messages: VecDeque::with_capacity(MAX_MESSAGES),
        }
    }

    fn elapsed_ms(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() * 1000.0
    }

    fn fps(&self) -> Option<f64> {
        let elapsed_ms = self.elapsed_ms();
        (self.ticks > 0 && elapsed_ms > 0.0).then(|| self.ticks as f64 / (elapsed_ms / 1000.0))
    }

    /// Returns the formatted summary string, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.elapsed_ms();
        let mut lines = vec![format!(
            "Pipeline summary ({} ticks, {:.1}s total):",
            self.ticks,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, stats) in stages {
            let pct = if elapsed_ms > 0.0 {
                stats.sum / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:12}: avg {:6.1}ms  max {:6.1}ms  n={:<6} ({pct:4.1}%)",
                stats.mean(),
                stats.max,
                stats.count
            ));
        }

        let mut names: Vec<_> = self.metrics.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, stats) in names {
            lines.push(format!(
                "  {name}: avg {:.3}  max {:.3}",
                stats.mean(),
                stats.max
            ));
        }

        if let Some(fps) = self.fps() {
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&SeriesStats> {
        self.timings.get(stage)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&SeriesStats> {
        self.metrics.get(name)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(60)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn tick(&mut self, completed: u64) {
        self.ticks = completed;
        if completed % self.throttle_ticks == 0 {
            let offset = self
                .metrics
                .get(metric::OFFSET)
                .map_or(0.0, |stats| stats.last);
            log::info!(
                "tick {completed}: {:.1} fps, offset {offset:.3}",
                self.fps().unwrap_or(0.0)
            );
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        match self.timings.get_mut(stage) {
            Some(stats) => stats.record(duration_ms),
            None => {
                let mut stats = SeriesStats::default();
                stats.record(duration_ms);
                self.timings.insert(stage.to_string(), stats);
            }
        }
    }

    fn metric(&mut self, name: &str, value: f64) {
        match self.metrics.get_mut(name) {
            Some(stats) => stats.record(value),
            None => {
                let mut stats = SeriesStats::default();
                stats.record(value);
                self.metrics.insert(name.to_string(), stats);
            }
        }
    }

    fn info(&mut self, message: &str) {
        if self.messages.len() == MAX_MESSAGES {
            self.messages.pop_front();
        }
        self.messages.push_back(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
