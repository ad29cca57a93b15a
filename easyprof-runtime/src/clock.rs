//! Monotonic wall-clock timing primitives.
//!
//! `Clock` measures the time since its last reset. `Stopwatch` accumulates
//! only the intervals between `start()` and `stop()`, which is what the
//! collector needs to estimate its own bookkeeping overhead.

use std::time::Instant;

/// Elapsed wall time in seconds.
///
/// `f64` keeps sub-nanosecond resolution for anything shorter than a few
/// months, which is far beyond what a profiled call lasts.
pub type Seconds = f64;

/// Restartable monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    /// A clock whose reference point is now.
    #[inline]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Mark now as the new reference point.
    #[inline]
    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    /// Seconds since construction or the last `reset()`.
    #[inline]
    pub fn elapsed(&self) -> Seconds {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulating stopwatch built on `Clock`.
///
/// `elapsed()` only reports intervals that have been closed by `stop()`;
/// an interval that is still running is not included.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    clock: Clock,
    active: bool,
    accumulated: Seconds,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new interval. An interval already in progress is closed first.
    #[inline]
    pub fn start(&mut self) {
        if self.active {
            self.stop();
        }
        self.active = true;
        self.clock.reset();
    }

    /// Close the running interval, if any, and fold it into the total.
    #[inline]
    pub fn stop(&mut self) {
        if self.active {
            self.accumulated += self.clock.elapsed();
            self.active = false;
        }
    }

    /// Stop and zero the accumulated total.
    pub fn reset(&mut self) {
        self.stop();
        self.accumulated = 0.0;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Total of all closed intervals.
    pub fn elapsed(&self) -> Seconds {
        self.accumulated
    }
}
