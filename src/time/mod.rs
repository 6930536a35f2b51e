//! Time bookkeeping for the scheduler: the alarm tick source and durations.

use portable_atomic::{AtomicU64, Ordering};

/// Monotonic scheduler time, in alarm ticks.
pub type Tick = u64;

/// Alarm tick frequency in Hz. One tick per microsecond.
pub const ALARM_FREQUENCY_HZ: u64 = 1_000_000;

/// Default scheduling quantum, in alarm ticks (10 ms).
pub const DEFAULT_QUANTUM_TICKS: u32 = 10_000;

/// Monotonic tick counter driving every scheduling-time decision.
///
/// The platform's periodic time source calls [`Alarm::tick`] on each
/// interrupt; the dispatcher reads [`Alarm::elapsed`] exactly once per
/// scheduling decision, under the scheduler guard, so that every rank
/// rewrite in one dispatch observes the same time snapshot.
pub struct Alarm {
    ticks: AtomicU64,
}

impl Alarm {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// Advance the alarm by one tick (called from the timer interrupt).
    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::AcqRel);
    }

    /// Ticks elapsed since boot.
    pub fn elapsed(&self) -> Tick {
        self.ticks.load(Ordering::Acquire)
    }

    /// Tick frequency in Hz.
    pub const fn frequency() -> u64 {
        ALARM_FREQUENCY_HZ
    }

    /// Convert a duration to alarm ticks.
    pub const fn ticks(duration: Duration) -> Tick {
        duration.as_micros() * ALARM_FREQUENCY_HZ / 1_000_000
    }
}

impl Default for Alarm {
    fn default() -> Self {
        Self::new()
    }
}

/// A duration of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(u64);

impl Duration {
    /// Create a duration from microseconds.
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Create a duration from milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000)
    }

    /// Create a duration from seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1_000_000)
    }

    /// Get microseconds in this duration.
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Get milliseconds in this duration.
    pub const fn as_millis(self) -> u64 {
        self.0 / 1_000
    }
}
