//! Thread entity: identity, lifecycle state and scheduler-owned data.
//!
//! A [`Thread`] is a cheap clone over reference-counted inner data shared
//! with its [`JoinHandle`] and with the queues it is linked into. All
//! lifecycle mutation happens in the kernel, under the scheduler guard;
//! the spin mutexes on individual fields exist for interior mutability,
//! not as independent synchronization points.

use crate::mem::Stack;
use crate::sched::criterion::{Criterion, Rank, Statistics};
use crate::sched::queue::WaitQueueInner;
use portable_atomic::{AtomicI32, AtomicPtr, AtomicU8, AtomicUsize, Ordering};

extern crate alloc;
use alloc::sync::Arc;

pub mod builder;
pub mod handle;

pub use builder::Configuration;
pub use handle::JoinHandle;

/// Unique identifier for threads.
///
/// Thread IDs are never reused and are guaranteed to be non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(core::num::NonZeroU64);

impl core::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ThreadId {
    /// Create a new thread ID.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `id` is non-zero and unique.
    pub unsafe fn new_unchecked(id: u64) -> Self {
        Self(unsafe { core::num::NonZeroU64::new_unchecked(id) })
    }

    /// Get the raw ID value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

/// Thread lifecycle state.
///
/// State and queue membership always agree: READY threads are linked in
/// the ready structure, WAITING threads in exactly one wait queue,
/// RUNNING threads in no queue (they are some CPU's current thread), and
/// SUSPENDED or FINISHING threads in no queue at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Linked in the ready structure, eligible for dispatch
    Ready = 0,
    /// Installed as some CPU's current thread
    Running = 1,
    /// Unlinked, waiting for an explicit resume
    Suspended = 2,
    /// Linked in a wait queue, waiting for a wakeup
    Waiting = 3,
    /// Terminated, pending reaping by the joiner or the idle thread
    Finishing = 4,
}

impl ThreadState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ThreadState::Ready,
            1 => ThreadState::Running,
            2 => ThreadState::Suspended,
            3 => ThreadState::Waiting,
            _ => ThreadState::Finishing,
        }
    }
}

/// Handle to a thread, shared between the kernel, the queues and the
/// thread's [`JoinHandle`].
#[derive(Clone)]
pub struct Thread {
    inner: Arc<ThreadInner>,
}

pub(crate) struct ThreadInner {
    id: ThreadId,
    state: AtomicU8,
    criterion: spin::Mutex<Criterion>,
    /// Criterion saved while the rank is boosted by a priority-inversion
    /// protocol; `None` when running at natural priority.
    natural_priority: spin::Mutex<Option<Criterion>>,
    /// Saved machine context. Points into the stack; mutated only while
    /// the thread is not running.
    context: AtomicPtr<u8>,
    /// Owned stack. Taken by the reaper strictly after the thread's last
    /// switch-out; `None` for the adopted bootstrap thread.
    stack: spin::Mutex<Option<Stack>>,
    /// The wait queue this thread sleeps on; `None` when not WAITING.
    waiting: spin::Mutex<Option<Arc<WaitQueueInner>>>,
    /// The thread blocked in `join` on this one, if any.
    joiner: spin::Mutex<Option<Thread>>,
    exit_status: AtomicI32,
    last_cpu: AtomicUsize,
}

impl Thread {
    pub(crate) fn new(
        id: ThreadId,
        state: ThreadState,
        criterion: Criterion,
        stack: Option<Stack>,
        context: *mut u8,
    ) -> Self {
        Self {
            inner: Arc::new(ThreadInner {
                id,
                state: AtomicU8::new(state as u8),
                criterion: spin::Mutex::new(criterion),
                natural_priority: spin::Mutex::new(None),
                context: AtomicPtr::new(context),
                stack: spin::Mutex::new(stack),
                waiting: spin::Mutex::new(None),
                joiner: spin::Mutex::new(None),
                exit_status: AtomicI32::new(0),
                last_cpu: AtomicUsize::new(0),
            }),
        }
    }

    /// Get the thread's unique identifier.
    pub fn id(&self) -> ThreadId {
        self.inner.id
    }

    /// Get the thread's current state.
    pub fn state(&self) -> ThreadState {
        ThreadState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, new_state: ThreadState) {
        self.inner.state.store(new_state as u8, Ordering::Release);
    }

    /// Check if this thread is runnable (ready or running).
    pub fn is_runnable(&self) -> bool {
        matches!(self.state(), ThreadState::Ready | ThreadState::Running)
    }

    /// Current scheduling rank.
    pub fn rank(&self) -> Rank {
        self.inner.criterion.lock().rank()
    }

    /// Snapshot of the thread's criterion.
    pub fn criterion(&self) -> Criterion {
        self.inner.criterion.lock().clone()
    }

    /// Snapshot of the criterion's scheduling statistics.
    pub fn statistics(&self) -> Statistics {
        *self.inner.criterion.lock().statistics()
    }

    /// True for a per-CPU idle thread.
    pub fn is_idle(&self) -> bool {
        self.inner.criterion.lock().is_idle()
    }

    /// Identity of the wait queue this thread sleeps on, if WAITING.
    pub fn waiting_on(&self) -> Option<u64> {
        self.inner.waiting.lock().as_ref().map(|q| q.id())
    }

    pub(crate) fn with_criterion<R>(&self, f: impl FnOnce(&mut Criterion) -> R) -> R {
        f(&mut *self.inner.criterion.lock())
    }

    pub(crate) fn replace_criterion(&self, criterion: Criterion) -> Criterion {
        core::mem::replace(&mut *self.inner.criterion.lock(), criterion)
    }

    /// Save the natural criterion ahead of a rank boost. Only the first
    /// save wins, so nested boosts restore the true natural priority.
    pub(crate) fn save_natural_priority(&self) {
        let mut natural = self.inner.natural_priority.lock();
        if natural.is_none() {
            *natural = Some(self.inner.criterion.lock().clone());
        }
    }

    /// Restore the saved natural criterion. Returns false when the
    /// thread was not boosted.
    pub(crate) fn restore_natural_priority(&self) -> bool {
        match self.inner.natural_priority.lock().take() {
            Some(criterion) => {
                *self.inner.criterion.lock() = criterion;
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_boosted(&self) -> bool {
        self.inner.natural_priority.lock().is_some()
    }

    /// Slot the context-switch primitive saves the outgoing context
    /// pointer into.
    pub(crate) fn context_slot(&self) -> *mut *mut u8 {
        self.inner.context.as_ptr()
    }

    pub(crate) fn context(&self) -> *mut u8 {
        self.inner.context.load(Ordering::Acquire)
    }

    pub(crate) fn take_stack(&self) -> Option<Stack> {
        self.inner.stack.lock().take()
    }

    #[cfg(test)]
    pub(crate) fn has_stack(&self) -> bool {
        self.inner.stack.lock().is_some()
    }

    pub(crate) fn set_waiting(&self, queue: Arc<WaitQueueInner>) {
        *self.inner.waiting.lock() = Some(queue);
    }

    pub(crate) fn take_waiting(&self) -> Option<Arc<WaitQueueInner>> {
        self.inner.waiting.lock().take()
    }

    pub(crate) fn waiting_queue(&self) -> Option<Arc<WaitQueueInner>> {
        self.inner.waiting.lock().clone()
    }

    pub(crate) fn set_joiner(&self, joiner: Thread) {
        let mut slot = self.inner.joiner.lock();
        assert!(slot.is_none(), "thread {} joined twice", self.inner.id);
        *slot = Some(joiner);
    }

    pub(crate) fn take_joiner(&self) -> Option<Thread> {
        self.inner.joiner.lock().take()
    }

    pub(crate) fn set_exit_status(&self, status: i32) {
        self.inner.exit_status.store(status, Ordering::Release);
    }

    pub(crate) fn exit_status(&self) -> i32 {
        self.inner.exit_status.load(Ordering::Acquire)
    }

    /// CPU this thread last ran on.
    pub fn last_cpu(&self) -> usize {
        self.inner.last_cpu.load(Ordering::Acquire)
    }

    pub(crate) fn set_last_cpu(&self, cpu: usize) {
        self.inner.last_cpu.store(cpu, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn for_testing(criterion: Criterion) -> Self {
        use portable_atomic::AtomicU64;
        static NEXT_TEST_ID: AtomicU64 = AtomicU64::new(1_000_000);
        let id = unsafe { ThreadId::new_unchecked(NEXT_TEST_ID.fetch_add(1, Ordering::AcqRel)) };
        Self::new(id, ThreadState::Ready, criterion, None, core::ptr::null_mut())
    }
}

impl PartialEq for Thread {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Thread {}

impl core::fmt::Debug for Thread {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("rank", &self.rank())
            .finish()
    }
}
