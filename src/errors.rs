//! Error types for the scheduling core.
//!
//! Only recoverable conditions are surfaced as errors; invariant
//! violations (joining yourself, exiting from outside a thread) are
//! programming errors and panic instead.

use core::fmt;

/// Result type for threading operations.
pub type ThreadResult<T> = Result<T, ThreadError>;

/// Error type covering all threading operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadError {
    /// Thread spawning errors
    Spawn(SpawnError),
    /// Scheduling errors
    Schedule(ScheduleError),
}

/// Errors that can occur during thread spawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// Kernel is not initialized
    NotInitialized,
    /// Out of memory for stack allocation
    OutOfMemory,
    /// Requested stack size has no size class
    InvalidStackSize(usize),
}

/// Errors related to scheduling operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// CPU index is out of range
    InvalidCpu(usize),
    /// Kernel was initialized twice
    AlreadyInitialized,
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadError::Spawn(e) => write!(f, "spawn error: {}", e),
            ThreadError::Schedule(e) => write!(f, "schedule error: {}", e),
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::NotInitialized => write!(f, "kernel not initialized"),
            SpawnError::OutOfMemory => write!(f, "stack allocation failed"),
            SpawnError::InvalidStackSize(size) => {
                write!(f, "no stack size class fits {} bytes", size)
            }
        }
    }
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::InvalidCpu(cpu) => write!(f, "CPU {} out of range", cpu),
            ScheduleError::AlreadyInitialized => write!(f, "kernel already initialized"),
        }
    }
}

impl From<SpawnError> for ThreadError {
    fn from(e: SpawnError) -> Self {
        ThreadError::Spawn(e)
    }
}

impl From<ScheduleError> for ThreadError {
    fn from(e: ScheduleError) -> Self {
        ThreadError::Schedule(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let e: ThreadError = SpawnError::OutOfMemory.into();
        assert_eq!(e, ThreadError::Spawn(SpawnError::OutOfMemory));
    }
}
