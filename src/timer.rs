//! Per-CPU time slicing on top of the periodic platform tick.

use crate::time::Tick;
use portable_atomic::{AtomicU32, Ordering};

extern crate alloc;
use alloc::vec::Vec;

/// Per-CPU quantum countdown.
///
/// The platform delivers one tick per CPU per alarm period; every
/// `quantum` ticks the countdown expires and the kernel invites the
/// running thread's criterion to preempt. Cooperative criteria decline
/// (their `charge` returns false) and the tick only updates statistics.
pub struct SchedulerTimer {
    quantum: u32,
    countdown: Vec<AtomicU32>,
}

impl SchedulerTimer {
    pub fn new(quantum: u32, cpus: usize) -> Self {
        assert!(quantum > 0, "quantum must be at least one tick");
        let mut countdown = Vec::with_capacity(cpus);
        for _ in 0..cpus {
            countdown.push(AtomicU32::new(quantum));
        }
        Self { quantum, countdown }
    }

    /// Account one tick on `cpu`; returns true when the quantum expired.
    pub fn on_tick(&self, cpu: usize) -> bool {
        let remaining = self.countdown[cpu].fetch_sub(1, Ordering::AcqRel);
        remaining <= 1
    }

    /// Rearm the countdown after the expiry was handled.
    pub fn reset(&self, cpu: usize) {
        self.countdown[cpu].store(self.quantum, Ordering::Release);
    }

    /// Quantum length in alarm ticks.
    pub fn quantum(&self) -> Tick {
        self.quantum as Tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantum_countdown() {
        let timer = SchedulerTimer::new(3, 2);

        assert!(!timer.on_tick(0));
        assert!(!timer.on_tick(0));
        assert!(timer.on_tick(0));

        // CPU 1 counts independently.
        assert!(!timer.on_tick(1));

        timer.reset(0);
        assert!(!timer.on_tick(0));
        assert!(!timer.on_tick(0));
        assert!(timer.on_tick(0));
    }
}
