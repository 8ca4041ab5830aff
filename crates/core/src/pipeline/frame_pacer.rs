use std::time::{Duration, Instant};

/// Caps the tick rate by sleeping out whatever is left of each frame slot.
///
/// Ticks slower than the target are never delayed further; the pacer does
/// not try to catch up.
pub struct FramePacer {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl FramePacer {
    /// `target_fps` of 0 (or anything non-finite) disables pacing.
    pub fn new(target_fps: f64) -> Self {
        let interval = (target_fps > 0.0 && target_fps.is_finite())
            .then(|| Duration::from_secs_f64(1.0 / target_fps));
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Time still to wait at `now` before the next tick may start.
    pub fn remaining(&self, now: Instant) -> Duration {
        match (self.interval, self.last) {
            (Some(interval), Some(last)) => interval.saturating_sub(now.saturating_duration_since(last)),
            _ => Duration::ZERO,
        }
    }

    /// Blocks until the next tick may start and marks it started.
    pub fn wait(&mut self) {
        let pause = self.remaining(Instant::now());
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
        self.last = Some(Instant::now());
    }
}
