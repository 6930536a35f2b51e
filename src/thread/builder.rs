//! Thread configuration carried into `spawn`.

use super::ThreadState;
use crate::sched::criterion::Criterion;

/// Default stack size for new threads, in bytes.
pub const DEFAULT_STACK_SIZE: usize = 16 * 1024;

/// Initial state, criterion and stack size of a new thread.
pub struct Configuration {
    pub state: ThreadState,
    pub criterion: Criterion,
    pub stack_size: usize,
}

impl Configuration {
    /// A READY thread at NORMAL priority with the default stack.
    pub fn new() -> Self {
        Self {
            state: ThreadState::Ready,
            criterion: Criterion::normal(),
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    pub fn criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Start the thread SUSPENDED; it only becomes eligible for dispatch
    /// after an explicit resume.
    pub fn suspended(mut self) -> Self {
        self.state = ThreadState::Suspended;
        self
    }

    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
