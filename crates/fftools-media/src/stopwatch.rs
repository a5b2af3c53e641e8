//! Wall-clock run timing.

use std::time::Instant;

use chrono::{DateTime, Utc};

/// Captures a wall-clock timestamp at the start of a run and a monotonic
/// duration until the end. A plain value holder, not a timer.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    started_at: DateTime<Utc>,
    origin: Instant,
}

impl Stopwatch {
    /// Start timing now.
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            origin: Instant::now(),
        }
    }

    /// Wall-clock time the stopwatch was started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Monotonic time elapsed since start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.origin.elapsed()
    }

    /// Stop, returning start and end wall-clock timestamps.
    ///
    /// The end timestamp is derived from the monotonic clock, so
    /// `start <= end` holds even if the system clock stepped backwards
    /// during the run.
    pub fn stop(self) -> (DateTime<Utc>, DateTime<Utc>) {
        let elapsed =
            chrono::Duration::from_std(self.origin.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        (self.started_at, self.started_at + elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_never_precedes_start() {
        let watch = Stopwatch::start();
        let (started_at, ended_at) = watch.stop();
        assert!(started_at <= ended_at);
    }

    #[test]
    fn measures_elapsed_time() {
        let watch = Stopwatch::start();
        std::thread::sleep(std::time::Duration::from_millis(15));
        let (started_at, ended_at) = watch.stop();
        assert!(ended_at - started_at >= chrono::Duration::milliseconds(15));
    }
}
