use std::time::Duration;

/// Fixed-interval gate, decoupled from the host's frame rate.
///
/// Wall time accumulates until it exceeds the interval, then one step is
/// admitted and the remainder is kept (`acc %= interval`). Keeping the
/// remainder avoids drift when frames arrive unevenly.
#[derive(Clone, Debug)]
pub struct FrameClock {
    interval: f64,
    accumulator: f64,
}

impl FrameClock {
    /// `interval` is in seconds
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            accumulator: 0.0,
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Add elapsed time, returning whether a step is due. At most one step
    /// is admitted per call.
    pub fn advance(&mut self, delta: Duration) -> bool {
        self.accumulator += delta.as_secs_f64();
        if self.accumulator > self.interval {
            self.accumulator %= self.interval;
            true
        } else {
            false
        }
    }

    /// Drop accumulated time, so the next step is a full interval away
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}
