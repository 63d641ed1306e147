//! Wall-clock timestamp strings and a monotonic stopwatch.
//!
//! Timestamps come from the local timezone via `chrono`; the stopwatch is
//! `Instant`-based and immune to wall-clock adjustments. The two are kept in
//! one module because every consumer (rotation stamps, error-ledger lines,
//! elapsed-time diagnostics) needs them together.

use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::warn;

/// Default timestamp layout: `yyyymmdd_HHMMSS`.
pub const DEFAULT_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Layout used for rotated-file suffixes: `ddmmyyyy_HHMMSS`.
pub const ROTATION_TIME_FORMAT: &str = "%d%m%Y_%H%M%S";

/// Formats the current local time with a `strftime`-style layout.
pub fn local_time_str(format: &str) -> String {
    Local::now().format(format).to_string()
}

/// Unit selector for [`Stopwatch::elapsed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Millis,
    Micros,
    Nanos,
}

/// Monotonic stopwatch owned by the thread that starts it.
///
/// `stop()` called from any thread other than the starting one is a no-op
/// (with a warning); the measured interval stays attributable to a single
/// thread's activity.
#[derive(Debug, Default)]
pub struct Stopwatch {
    started: Option<(Instant, ThreadId)>,
    elapsed: Duration,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the measurement on the calling thread.
    pub fn start(&mut self) {
        self.elapsed = Duration::ZERO;
        self.started = Some((Instant::now(), thread::current().id()));
    }

    /// Stops the measurement. No-op if never started or if called from a
    /// thread other than the one that called [`start`](Self::start).
    pub fn stop(&mut self) {
        match self.started {
            Some((at, owner)) if owner == thread::current().id() => {
                self.elapsed = at.elapsed();
                self.started = None;
            }
            Some((_, owner)) => {
                warn!(?owner, "stopwatch stop ignored: not the starting thread");
            }
            None => {}
        }
    }

    /// Returns true while a measurement is in progress.
    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Elapsed time in the requested unit.
    ///
    /// While running, reports the live interval; after [`stop`](Self::stop),
    /// reports the frozen one.
    pub fn elapsed(&self, unit: TimeUnit) -> f64 {
        let d = match self.started {
            Some((at, _)) => at.elapsed(),
            None => self.elapsed,
        };
        match unit {
            TimeUnit::Seconds => d.as_secs_f64(),
            TimeUnit::Millis => d.as_secs_f64() * 1e3,
            TimeUnit::Micros => d.as_secs_f64() * 1e6,
            TimeUnit::Nanos => d.as_secs_f64() * 1e9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopwatch_measures_forward_time() {
        let mut sw = Stopwatch::new();
        sw.start();
        thread::sleep(Duration::from_millis(5));
        sw.stop();

        let ms = sw.elapsed(TimeUnit::Millis);
        assert!(ms >= 5.0, "elapsed {ms} ms, expected >= 5");
        assert!(!sw.is_running());
    }

    #[test]
    fn stop_from_other_thread_is_ignored() {
        let mut sw = Stopwatch::new();
        sw.start();

        // Move a &mut across a scoped thread; the foreign stop must not land.
        thread::scope(|s| {
            s.spawn(|| sw.stop());
        });
        assert!(sw.is_running());

        sw.stop();
        assert!(!sw.is_running());
    }

    #[test]
    fn unit_conversions_agree() {
        let mut sw = Stopwatch::new();
        sw.start();
        thread::sleep(Duration::from_millis(2));
        sw.stop();

        let s = sw.elapsed(TimeUnit::Seconds);
        let us = sw.elapsed(TimeUnit::Micros);
        assert!((us - s * 1e6).abs() < 1.0);
    }

    #[test]
    fn timestamp_has_expected_shape() {
        let ts = local_time_str(DEFAULT_TIME_FORMAT);
        // yyyymmdd_HHMMSS
        assert_eq!(ts.len(), 15);
        assert_eq!(ts.as_bytes()[8], b'_');
    }
}
