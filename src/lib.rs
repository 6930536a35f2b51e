#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

//! Preemptive real-time thread scheduling core.
//!
//! This library is the thread/scheduler subsystem of a small embedded
//! system: thread lifecycle, a pluggable scheduling criterion, the
//! per-CPU dispatch loop, timer-driven preemption and the sleep/wakeup
//! primitives synchronization is built on.
//!
//! # Criteria
//!
//! Every thread carries a [`Criterion`] that orders it in the ready
//! structure: fixed priority, FCFS, round-robin, EDF, LLF, or global-LLF
//! (one shared multi-head queue across CPUs). Real-time criteria rewrite
//! their rank on dispatch events from a tick snapshot taken under the
//! scheduler guard.
//!
//! # Quick Start
//!
//! ```ignore
//! use realtime_threads::{Kernel, KernelConfig};
//! use spin::Lazy;
//!
//! static KERNEL: Lazy<Kernel<PlatformArch>> =
//!     Lazy::new(|| Kernel::new(KernelConfig::new()));
//!
//! fn kernel_main() {
//!     KERNEL.init().expect("failed to initialize kernel");
//!
//!     KERNEL.spawn(|| {
//!         // thread work
//!         0
//!     }).expect("failed to spawn thread");
//! }
//! ```
//!
//! # Architecture
//!
//! The platform provides an [`Arch`] implementation (context fabrication
//! and switching, interrupt control, CPU identity, reschedule IPIs) and
//! wires its periodic timer to [`Kernel::timer_tick`]. Everything else —
//! ready structure, wait queues, priority inversion avoidance, stack
//! pooling — lives here.

// Core modules
pub mod arch;
pub mod errors;
pub mod kernel;
pub mod mem;
pub mod sched;
pub mod thread;
pub mod time;
pub mod timer;

#[cfg(test)]
extern crate std;

extern crate alloc;

// Panic handler for bare-metal
#[cfg(all(not(test), not(feature = "std-shim")))]
use core::panic::PanicInfo;

#[cfg(all(not(test), not(feature = "std-shim")))]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    // On panic, spin with interrupts left alone; the platform's panic
    // hook is expected to take over via its own handler in real builds.
    loop {
        core::hint::spin_loop();
    }
}

// ============================================================================
// Public API
// ============================================================================

// Architecture abstraction
pub use arch::{Arch, CpuId, NoOpArch};

// Kernel
pub use kernel::{Kernel, KernelConfig, Protocol};

// Scheduling
pub use sched::{Criterion, Event, Rank, ReadyQueue, Statistics, WaitQueue};

// Threads
pub use thread::{Configuration, JoinHandle, Thread, ThreadId, ThreadState};

// Memory management
pub use mem::{Stack, StackPool, StackSizeClass};

// Time
pub use time::{Alarm, Duration, Tick};

// Errors
pub use errors::{ScheduleError, SpawnError, ThreadError, ThreadResult};

// ============================================================================
// Convenience Functions
// ============================================================================

use kernel::KernelOps;

/// Yield the current thread's time slice to the scheduler.
///
/// This is a cooperative yield: the thread voluntarily gives up the CPU,
/// stays READY and will be dispatched again when it is the most urgent
/// candidate.
#[inline]
pub fn yield_now() {
    if let Some(kernel) = kernel::global_kernel() {
        kernel.yield_thread();
    }
}

/// Terminate the current thread with an exit status.
///
/// The joiner, if any, is woken and receives `status`. On hardware this
/// does not return.
#[inline]
pub fn exit(status: i32) {
    if let Some(kernel) = kernel::global_kernel() {
        kernel.exit_thread(status);
    }
}
