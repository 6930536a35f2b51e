//! Rank-ordered queues: the ready structure and wait queues.
//!
//! Both shapes sort by criterion rank with stable insertion, so equal
//! ranks dispatch in FIFO order. Embedded thread counts are small; O(n)
//! insertion into a vector keeps the structure simple and re-sortable
//! when dynamic criteria rewrite their ranks.

use crate::sched::criterion::{Event, Rank};
use crate::thread::{Thread, ThreadId};
use crate::time::Tick;
use portable_atomic::{AtomicU64, Ordering};

extern crate alloc;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// One linked thread and the rank it was sorted under.
///
/// The stored rank is the criterion's rank at link (or last re-sort)
/// time; the structure is re-sorted before any dispatch can observe a
/// stale value.
#[derive(Clone)]
pub(crate) struct Element {
    pub(crate) thread: Thread,
    pub(crate) rank: Rank,
}

/// A rank-sorted queue with stable insertion.
pub(crate) struct OrderedQueue {
    items: Vec<Element>,
}

impl OrderedQueue {
    pub(crate) const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Insert before the first strictly-worse rank: FIFO among equals.
    pub(crate) fn insert(&mut self, thread: Thread, rank: Rank) {
        let pos = self
            .items
            .iter()
            .position(|e| e.rank > rank)
            .unwrap_or(self.items.len());
        self.items.insert(pos, Element { thread, rank });
    }

    pub(crate) fn remove(&mut self, id: ThreadId) -> Option<Thread> {
        let pos = self.items.iter().position(|e| e.thread.id() == id)?;
        Some(self.items.remove(pos).thread)
    }

    pub(crate) fn front(&self) -> Option<&Element> {
        self.items.first()
    }

    pub(crate) fn nth(&self, n: usize) -> Option<&Element> {
        self.items.get(n)
    }

    pub(crate) fn pop_front(&mut self) -> Option<Thread> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0).thread)
        }
    }

    pub(crate) fn contains(&self, id: ThreadId) -> bool {
        self.iter().any(|e| e.thread.id() == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Element> {
        self.items.iter()
    }

    /// Re-sort one element under a new rank. Returns false when the
    /// thread is not linked here.
    pub(crate) fn resort(&mut self, id: ThreadId, rank: Rank) -> bool {
        match self.remove(id) {
            Some(thread) => {
                self.insert(thread, rank);
                true
            }
            None => false,
        }
    }

    /// Recompute every element's rank through `f`, then restore order.
    /// The stable sort keeps FIFO order among ranks that tie.
    pub(crate) fn refresh<F: FnMut(&Thread) -> Rank>(&mut self, mut f: F) {
        for e in self.items.iter_mut() {
            e.rank = f(&e.thread);
        }
        self.items.sort_by_key(|e| e.rank);
    }
}

/// The ready structure: a rank-sorted multi-head queue.
///
/// Two shapes share this type. The per-CPU shape keeps N independent
/// queues and `chosen(cpu)` reads the head of queue `cpu`. The global
/// shape keeps one shared queue with N heads: `chosen(cpu)` reads the
/// element at position `cpu`, so N runners select distinct threads, and
/// a dispatching CPU takes the best element still linked.
pub struct ReadyQueue {
    queues: Vec<OrderedQueue>,
    global: bool,
    dynamic_members: usize,
}

impl ReadyQueue {
    /// `global` selects the shared single-queue shape; otherwise one
    /// queue per CPU.
    pub fn new(cpus: usize, global: bool) -> Self {
        let queue_count = if global { 1 } else { cpus };
        let mut queues = Vec::with_capacity(queue_count);
        for _ in 0..queue_count {
            queues.push(OrderedQueue::new());
        }
        Self {
            queues,
            global,
            dynamic_members: 0,
        }
    }

    fn route(&self, thread: &Thread) -> usize {
        if self.global {
            0
        } else {
            let queue = thread.with_criterion(|c| c.queue());
            debug_assert!(queue < self.queues.len());
            queue.min(self.queues.len() - 1)
        }
    }

    /// Link a thread under its criterion's current rank.
    pub fn insert(&mut self, thread: Thread) {
        let (rank, dynamic) = thread.with_criterion(|c| (c.rank(), c.dynamic()));
        if dynamic {
            self.dynamic_members += 1;
        }
        let queue = self.route(&thread);
        self.queues[queue].insert(thread, rank);
    }

    /// Unlink a thread wherever it is.
    pub fn remove(&mut self, id: ThreadId) -> Option<Thread> {
        for queue in self.queues.iter_mut() {
            if let Some(thread) = queue.remove(id) {
                if thread.with_criterion(|c| c.dynamic()) {
                    self.dynamic_members -= 1;
                }
                return Some(thread);
            }
        }
        None
    }

    /// The next-to-dispatch element for `cpu`, left linked.
    pub fn chosen(&self, cpu: usize) -> Option<Thread> {
        let element = if self.global {
            self.queues[0].nth(cpu)
        } else {
            self.queues.get(cpu)?.front()
        };
        element.map(|e| e.thread.clone())
    }

    /// Unlink and return the next-to-dispatch thread for `cpu`.
    pub fn take_chosen(&mut self, cpu: usize) -> Option<Thread> {
        let thread = if self.global {
            self.queues[0].pop_front()
        } else {
            self.queues.get_mut(cpu)?.pop_front()
        }?;
        if thread.with_criterion(|c| c.dynamic()) {
            self.dynamic_members -= 1;
        }
        Some(thread)
    }

    /// Rank of the best linked candidate a thread on `cpu` competes with.
    pub fn head_rank(&self, cpu: usize) -> Option<Rank> {
        if self.global {
            self.queues[0].front().map(|e| e.rank)
        } else {
            self.queues.get(cpu)?.front().map(|e| e.rank)
        }
    }

    /// Rewrite every dynamic rank from the snapshot `now`, then restore
    /// sort order. No-op when nothing linked is dynamic.
    pub fn update_all(&mut self, now: Tick, cpu: usize) {
        if self.dynamic_members == 0 {
            return;
        }
        for queue in self.queues.iter_mut() {
            queue.refresh(|thread| {
                thread.with_criterion(|c| {
                    if c.dynamic() {
                        c.update(now);
                        c.collect(Event::Update, now, cpu);
                    }
                    c.rank()
                })
            });
        }
    }

    /// Re-sort one thread after its criterion changed.
    pub fn resort(&mut self, id: ThreadId, rank: Rank) -> bool {
        self.queues.iter_mut().any(|q| q.resort(id, rank))
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.queues.iter().any(|q| q.contains(id))
    }

    /// Number of threads linked into one sub-queue.
    pub fn queue_len(&self, queue: usize) -> usize {
        if self.global {
            self.queues[0].len()
        } else {
            self.queues.get(queue).map_or(0, |q| q.len())
        }
    }

    pub fn len(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(|q| q.is_empty())
    }
}

static NEXT_WAIT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct WaitQueueInner {
    id: u64,
    pub(crate) queue: spin::Mutex<OrderedQueue>,
}

/// An ordered queue of blocked threads, sorted by the waiters'
/// criteria so that waking releases the most urgent waiter first.
///
/// Wait queues are not independently lockable: every operation on one
/// happens through the kernel, under the scheduler guard. A waiting
/// thread keeps a back-reference to the queue it sleeps on; the
/// reference is identity (the queue id), dropped the moment the thread
/// is unlinked.
#[derive(Clone)]
pub struct WaitQueue {
    inner: Arc<WaitQueueInner>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(WaitQueueInner {
                id: NEXT_WAIT_QUEUE_ID.fetch_add(1, Ordering::AcqRel),
                queue: spin::Mutex::new(OrderedQueue::new()),
            }),
        }
    }

    /// Identity token for waiter back-references.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queue.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub(crate) fn inner(&self) -> &Arc<WaitQueueInner> {
        &self.inner
    }

    pub(crate) fn push(&self, thread: Thread) {
        let rank = thread.rank();
        self.inner.queue.lock().insert(thread, rank);
    }

    pub(crate) fn pop_front(&self) -> Option<Thread> {
        self.inner.queue.lock().pop_front()
    }

    /// Rank of the most urgent waiter.
    pub(crate) fn front_rank(&self) -> Option<Rank> {
        self.inner.queue.lock().front().map(|e| e.rank)
    }
}

impl WaitQueueInner {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}
