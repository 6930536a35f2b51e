//! Join handles.

use super::{Thread, ThreadId, ThreadState};

/// Owned handle for reaping a thread's exit status.
///
/// There is exactly one handle per thread and `join` consumes it, so a
/// thread can never be joined twice.
pub struct JoinHandle {
    thread: Thread,
}

impl JoinHandle {
    pub(crate) fn new(thread: Thread) -> Self {
        Self { thread }
    }

    /// The thread this handle refers to.
    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    pub fn id(&self) -> ThreadId {
        self.thread.id()
    }

    /// Whether the thread has terminated and only awaits reaping.
    pub fn is_finished(&self) -> bool {
        self.thread.state() == ThreadState::Finishing
    }

    /// Exit status without blocking; `None` while the thread still runs.
    pub fn try_status(&self) -> Option<i32> {
        if self.is_finished() {
            Some(self.thread.exit_status())
        } else {
            None
        }
    }

    pub(crate) fn into_thread(self) -> Thread {
        self.thread
    }
}
