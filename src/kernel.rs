//! The kernel: per-CPU dispatch, preemption, blocking and reaping.
//!
//! One coarse scheduler guard orders every structural change: local
//! interrupts are disabled, then (on multiprocessor builds) the spin
//! lock is acquired. The guard is held only across queue surgery and the
//! prologue of a context switch; when a switch happens, the guard is
//! deliberately left held and the *incoming* thread releases it in its
//! epilogue, so no CPU can observe a half-switched thread.

use crate::arch::Arch;
use crate::errors::{ScheduleError, SpawnError};
use crate::sched::criterion::{Criterion, Event, Rank, CEILING};
use crate::sched::queue::{ReadyQueue, WaitQueue};
use crate::mem::{StackPool, StackSizeClass};
use crate::thread::{Configuration, JoinHandle, Thread, ThreadId, ThreadState};
use crate::time::{Alarm, DEFAULT_QUANTUM_TICKS};
use crate::timer::SchedulerTimer;
use core::marker::PhantomData;
use core::mem;
use portable_atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use log::{debug, info, trace};

extern crate alloc;
use alloc::boxed::Box;
use alloc::vec::Vec;

type SchedGuard<'a> = spin::MutexGuard<'a, SchedState>;

/// Priority-inversion avoidance protocol applied by [`Kernel::prioritize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// No avoidance; `prioritize` is a no-op.
    None,
    /// Boost the holder to the most urgent waiter's rank.
    Inheritance,
    /// Boost the holder to the reserved CEILING rank.
    Ceiling,
}

/// Build-time scheduling knobs.
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    /// Quantum length in alarm ticks.
    pub quantum: u32,
    /// Priority-inversion protocol.
    pub protocol: Protocol,
    /// Shape of the ready structure: one shared multi-head queue when
    /// true (required for global criteria such as GLLF), else one queue
    /// per CPU.
    pub global_ready: bool,
    /// Reboot instead of halting when the last thread exits.
    pub reboot_on_last_exit: bool,
}

impl KernelConfig {
    pub const fn new() -> Self {
        Self {
            quantum: DEFAULT_QUANTUM_TICKS,
            protocol: Protocol::None,
            global_ready: false,
            reboot_on_last_exit: false,
        }
    }

    pub const fn quantum(mut self, ticks: u32) -> Self {
        self.quantum = ticks;
        self
    }

    pub const fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub const fn global_ready(mut self, global: bool) -> Self {
        self.global_ready = global;
        self
    }

    pub const fn reboot_on_last_exit(mut self, reboot: bool) -> Self {
        self.reboot_on_last_exit = reboot;
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct SchedState {
    pub(crate) ready: ReadyQueue,
    /// The RUNNING thread of each CPU.
    pub(crate) running: Vec<Option<Thread>>,
    /// Per-CPU idle threads; rank IDLE, never linked into `ready`.
    pub(crate) idle: Vec<Option<Thread>>,
    /// FINISHING threads with no joiner, reaped by the idle loop.
    pub(crate) zombies: Vec<Thread>,
}

/// The scheduler object: ready structure, per-CPU running slots, idle
/// threads, stack pool, alarm and time slicer, behind one guard.
pub struct Kernel<A: Arch> {
    config: KernelConfig,
    stack_pool: StackPool,
    alarm: Alarm,
    slicer: SchedulerTimer,
    sched: spin::Mutex<SchedState>,
    initialized: AtomicBool,
    finished: AtomicBool,
    next_thread_id: AtomicU64,
    thread_count: AtomicUsize,
    _arch: PhantomData<A>,
}

unsafe impl<A: Arch> Send for Kernel<A> {}
unsafe impl<A: Arch> Sync for Kernel<A> {}

impl<A: Arch> Kernel<A> {
    pub fn new(config: KernelConfig) -> Self {
        let cpus = A::cores();
        Self {
            config,
            stack_pool: StackPool::new(),
            alarm: Alarm::new(),
            slicer: SchedulerTimer::new(config.quantum, cpus),
            sched: spin::Mutex::new(SchedState {
                ready: ReadyQueue::new(cpus, config.global_ready),
                running: (0..cpus).map(|_| None).collect(),
                idle: (0..cpus).map(|_| None).collect(),
                zombies: Vec::new(),
            }),
            initialized: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            next_thread_id: AtomicU64::new(1),
            thread_count: AtomicUsize::new(0),
            _arch: PhantomData,
        }
    }

    /// Initialize the kernel on the boot CPU: create the per-CPU idle
    /// threads and adopt the calling context as the MAIN thread.
    ///
    /// Secondary CPUs call [`Kernel::start_first_thread`] instead.
    pub fn init(&'static self) -> Result<(), ScheduleError> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ScheduleError::AlreadyInitialized);
        }
        register_global(self);

        let cpu = A::cpu_id();
        let mut idle_threads = Vec::with_capacity(A::cores());
        for k in 0..A::cores() {
            idle_threads.push(self.build_idle(k));
        }

        let main = Thread::new(
            self.allocate_id(),
            ThreadState::Running,
            Criterion::main(),
            None,
            core::ptr::null_mut(),
        );
        self.thread_count.fetch_add(1, Ordering::AcqRel);

        let mut st = self.lock();
        let now = self.alarm.elapsed();
        main.with_criterion(|c| {
            c.assign_queue(cpu);
            c.collect(Event::Create, now, cpu);
            c.collect(Event::Dispatch, now, cpu);
        });
        main.set_last_cpu(cpu);
        for (k, idle) in idle_threads.into_iter().enumerate() {
            st.idle[k] = idle;
        }
        st.running[cpu] = Some(main);
        drop(st);
        A::enable_interrupts();

        info!(
            "kernel up: {} CPUs, quantum {} ticks, protocol {:?}",
            A::cores(),
            self.config.quantum,
            self.config.protocol
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// True once the last non-idle thread has exited.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// The alarm driving every scheduling-time decision.
    pub fn alarm(&self) -> &Alarm {
        &self.alarm
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Number of live threads (idle threads excluded).
    pub fn thread_count(&self) -> usize {
        self.thread_count.load(Ordering::Acquire)
    }

    /// The RUNNING thread of the calling CPU.
    pub fn current(&self) -> Option<Thread> {
        let st = self.lock();
        let current = st.running[A::cpu_id()].clone();
        drop(st);
        A::enable_interrupts();
        current
    }

    // ------------------------------------------------------------------
    // Thread construction
    // ------------------------------------------------------------------

    /// Spawn a READY thread at NORMAL priority with the default stack.
    pub fn spawn<F>(&self, entry: F) -> Result<JoinHandle, SpawnError>
    where
        F: FnOnce() -> i32 + Send + 'static,
    {
        self.spawn_with(Configuration::new(), entry)
    }

    /// Spawn a thread under an explicit configuration.
    ///
    /// A READY thread is linked into the ready structure immediately and
    /// preempts a less urgent runner; a SUSPENDED thread stays unlinked
    /// until resumed.
    pub fn spawn_with<F>(&self, conf: Configuration, entry: F) -> Result<JoinHandle, SpawnError>
    where
        F: FnOnce() -> i32 + Send + 'static,
    {
        if !self.is_initialized() {
            return Err(SpawnError::NotInitialized);
        }
        assert!(
            matches!(conf.state, ThreadState::Ready | ThreadState::Suspended),
            "threads start READY or SUSPENDED"
        );
        let (thread, handle) = self.build_thread(conf, entry)?;
        self.thread_count.fetch_add(1, Ordering::AcqRel);

        let cpu = A::cpu_id();
        let mut st = self.lock();
        let now = self.alarm.elapsed();
        let home = self.place(&st);
        thread.with_criterion(|c| {
            if !c.global() {
                c.assign_queue(home);
            }
            c.collect(Event::Create, now, cpu);
        });
        debug!("spawned thread {} at rank {}", thread.id(), thread.rank());

        if thread.state() == ThreadState::Ready {
            st.ready.insert(thread.clone());
            self.preempt_or_unlock(st, &thread);
        } else {
            drop(st);
            A::enable_interrupts();
        }
        Ok(handle)
    }

    fn build_thread<F>(
        &self,
        conf: Configuration,
        entry: F,
    ) -> Result<(Thread, JoinHandle), SpawnError>
    where
        F: FnOnce() -> i32 + Send + 'static,
    {
        let class = StackSizeClass::for_size(conf.stack_size)
            .ok_or(SpawnError::InvalidStackSize(conf.stack_size))?;
        let stack = self
            .stack_pool
            .allocate(class)
            .ok_or(SpawnError::OutOfMemory)?;

        let closure = Box::into_raw(Box::new(entry));
        let context = unsafe {
            A::init_stack(
                stack.stack_top(),
                thread_trampoline::<F> as usize,
                closure as usize,
            )
        };

        let thread = Thread::new(
            self.allocate_id(),
            conf.state,
            conf.criterion,
            Some(stack),
            context,
        );
        let handle = JoinHandle::new(thread.clone());
        Ok((thread, handle))
    }

    fn build_idle(&'static self, cpu: usize) -> Option<Thread> {
        let conf = Configuration::new()
            .criterion(Criterion::idle())
            .stack_size(StackSizeClass::Small.size());
        let kernel = self;
        let built = self.build_thread(conf, move || -> i32 {
            loop {
                kernel.reap();
                A::wait_for_interrupt();
            }
        });
        match built {
            Ok((thread, _handle)) => {
                thread.with_criterion(|c| c.assign_queue(cpu));
                thread.set_last_cpu(cpu);
                Some(thread)
            }
            Err(_) => None,
        }
    }

    fn allocate_id(&self) -> ThreadId {
        let id = self.next_thread_id.fetch_add(1, Ordering::AcqRel);
        unsafe { ThreadId::new_unchecked(id) }
    }

    /// Home queue for a new per-CPU thread: the least loaded one.
    fn place(&self, st: &SchedState) -> usize {
        if self.config.global_ready {
            return A::cpu_id();
        }
        (0..A::cores())
            .min_by_key(|&cpu| st.ready.queue_len(cpu))
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Scheduler guard
    // ------------------------------------------------------------------

    fn lock(&self) -> SchedGuard<'_> {
        A::disable_interrupts();
        self.sched.lock()
    }

    fn unlock(&self, guard: SchedGuard<'_>) {
        drop(guard);
        A::enable_interrupts();
    }

    /// Release the guard left held across a context switch.
    ///
    /// Called by the incoming side of every switch: either the line
    /// after `context_switch` in `dispatch`, or the first statement of
    /// the trampoline for a thread entered for the first time.
    fn dispatch_epilogue(&self) {
        // Safety: the dispatch that switched to this thread forgot its
        // guard; this is the matching release.
        unsafe { self.sched.force_unlock() };
        A::enable_interrupts();
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Reschedule the calling CPU.
    pub fn reschedule(&self) {
        if !self.is_initialized() {
            return;
        }
        let st = self.lock();
        self.dispatch(st, None);
    }

    /// IPI entry: remote CPUs are asked to reschedule through this, the
    /// same way a timer tick enters.
    pub fn reschedule_ipi(&self) {
        self.reschedule();
    }

    /// Demote the calling thread from RUNNING to READY and reschedule.
    pub fn yield_now(&self) {
        self.reschedule();
    }

    /// Account the outgoing thread, pick the next (or honor `forced`),
    /// and switch contexts.
    fn dispatch(&self, mut st: SchedGuard<'_>, forced: Option<Thread>) {
        let cpu = A::cpu_id();
        let now = self.alarm.elapsed();

        let prev = st.running[cpu].take();
        if let Some(prev) = prev.as_ref() {
            prev.with_criterion(|c| {
                c.update(now);
                c.collect(Event::Leave, now, cpu);
            });
            // A thread still RUNNING here was preempted or yielded and
            // stays eligible; blocked, suspended and finishing threads
            // were already unlinked by their transition.
            if prev.state() == ThreadState::Running {
                prev.set_state(ThreadState::Ready);
                if !prev.is_idle() {
                    st.ready.insert(prev.clone());
                }
            }
        }

        // Laxity decays with elapsed time: refresh every dynamic rank
        // from this dispatch's snapshot before choosing.
        st.ready.update_all(now, cpu);

        let next = forced
            .or_else(|| st.ready.take_chosen(cpu))
            .or_else(|| st.idle[cpu].clone())
            .expect("no runnable thread and no idle thread on this CPU");
        next.set_state(ThreadState::Running);
        next.set_last_cpu(cpu);
        next.with_criterion(|c| c.collect(Event::Dispatch, now, cpu));

        let same = prev.as_ref() == Some(&next);
        st.running[cpu] = Some(next.clone());

        if same {
            self.unlock(st);
            return;
        }
        trace!("cpu{}: dispatch -> thread {}", cpu, next.id());

        let next_context = next.context();
        match prev {
            Some(prev) => {
                let prev_slot = prev.context_slot();
                // The guard stays held across the switch; the incoming
                // thread's epilogue releases it.
                mem::forget(st);
                unsafe { A::context_switch(prev_slot, next_context) };
                // Execution resumes here when `prev` is dispatched
                // again, with the guard of whoever switched to it held.
                self.dispatch_epilogue();
            }
            None => {
                // Bootstrap switch: the discarded boot context is saved
                // on the boot stack and never resumed.
                let mut boot_context: *mut u8 = core::ptr::null_mut();
                mem::forget(st);
                unsafe { A::context_switch(&mut boot_context, next_context) };
                self.dispatch_epilogue();
            }
        }
    }

    /// First dispatch on a secondary CPU.
    pub fn start_first_thread(&self) {
        if !self.is_initialized() {
            return;
        }
        let st = self.lock();
        if st.running[A::cpu_id()].is_some() {
            self.unlock(st);
            return;
        }
        self.dispatch(st, None);
    }

    /// After linking `candidate` as READY, preempt the least urgent
    /// runner it outranks, locally or by IPI; otherwise just unlock.
    fn preempt_or_unlock(&self, st: SchedGuard<'_>, candidate: &Thread) {
        let (rank, preemptive, home) =
            candidate.with_criterion(|c| (c.rank(), c.preemptive(), c.queue()));
        if !preemptive {
            self.unlock(st);
            return;
        }

        let this_cpu = A::cpu_id();
        let targets = if self.config.global_ready {
            0..A::cores()
        } else {
            home..home + 1
        };
        let mut victim: Option<(usize, Rank)> = None;
        for cpu in targets {
            if let Some(runner) = st.running[cpu].as_ref() {
                let runner_rank = runner.rank();
                if runner_rank > rank && victim.map_or(true, |(_, r)| runner_rank > r) {
                    victim = Some((cpu, runner_rank));
                }
            }
        }

        match victim {
            Some((cpu, _)) if cpu == this_cpu => self.dispatch(st, None),
            Some((cpu, _)) => {
                self.unlock(st);
                trace!("preempting cpu{} for thread {}", cpu, candidate.id());
                A::send_reschedule_ipi(cpu);
            }
            None => self.unlock(st),
        }
    }

    /// After `thread`'s rank changed in place, reschedule whichever CPU
    /// the change affects.
    fn reschedule_after_rank_change(&self, st: SchedGuard<'_>, thread: &Thread) {
        match thread.state() {
            ThreadState::Ready => self.preempt_or_unlock(st, thread),
            ThreadState::Running => {
                let rank = thread.rank();
                let cpu = (0..A::cores()).find(|&k| st.running[k].as_ref() == Some(thread));
                match cpu {
                    Some(cpu) => {
                        let outranked = st
                            .ready
                            .head_rank(cpu)
                            .map_or(false, |head| head < rank);
                        if !outranked {
                            self.unlock(st);
                        } else if cpu == A::cpu_id() {
                            self.dispatch(st, None);
                        } else {
                            self.unlock(st);
                            A::send_reschedule_ipi(cpu);
                        }
                    }
                    None => self.unlock(st),
                }
            }
            _ => self.unlock(st),
        }
    }

    // ------------------------------------------------------------------
    // Thread operations
    // ------------------------------------------------------------------

    /// Block until `handle`'s thread terminates, then reap it and return
    /// its exit status. Returns immediately when the thread has already
    /// terminated.
    pub fn join(&self, handle: JoinHandle) -> i32 {
        let target = handle.into_thread();
        let cpu = A::cpu_id();
        let st = self.lock();
        let current = st.running[cpu].clone().expect("join from outside a thread");
        assert!(current != target, "thread {} cannot join itself", target.id());

        if target.state() == ThreadState::Finishing {
            self.unlock(st);
        } else {
            target.set_joiner(current.clone());
            current.set_state(ThreadState::Suspended);
            self.dispatch(st, None);
            // Resumed by the target's exit.
        }

        self.reap_thread(&target);
        target.exit_status()
    }

    /// Terminate the calling thread with `status`: wake the joiner (or
    /// leave a zombie for the idle reaper) and reschedule. On hardware
    /// this does not return.
    pub fn exit_current(&self, status: i32) {
        let cpu = A::cpu_id();
        let mut st = self.lock();
        let current = st.running[cpu].clone().expect("exit from outside a thread");
        assert!(!current.is_idle(), "idle thread cannot exit");

        let now = self.alarm.elapsed();
        current.set_exit_status(status);
        current.set_state(ThreadState::Finishing);
        current.with_criterion(|c| c.collect(Event::Finish, now, cpu));
        debug!("thread {} exited with status {}", current.id(), status);

        if let Some(joiner) = current.take_joiner() {
            joiner.set_state(ThreadState::Ready);
            st.ready.insert(joiner);
        } else {
            st.zombies.push(current.clone());
        }

        if self.thread_count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finished.store(true, Ordering::Release);
            if self.config.reboot_on_last_exit {
                info!("last thread exited, rebooting");
            } else {
                info!("last thread exited, halting");
            }
        }

        self.dispatch(st, None);
    }

    /// Donate the CPU: make a READY `target` the calling CPU's RUNNING
    /// thread and demote the caller to READY. No-op when the target is
    /// not READY.
    pub fn pass(&self, target: &Thread) {
        let mut st = self.lock();
        if target.state() != ThreadState::Ready {
            self.unlock(st);
            return;
        }
        match st.ready.remove(target.id()) {
            Some(target) => self.dispatch(st, Some(target)),
            None => self.unlock(st),
        }
    }

    /// Move a thread to SUSPENDED, unlinking it from the ready structure
    /// or its wait queue; a RUNNING target triggers a reschedule.
    pub fn suspend(&self, thread: &Thread) {
        assert!(!thread.is_idle(), "idle thread cannot be suspended");
        let mut st = self.lock();
        match thread.state() {
            ThreadState::Ready => {
                st.ready.remove(thread.id());
                thread.set_state(ThreadState::Suspended);
                self.unlock(st);
            }
            ThreadState::Waiting => {
                if let Some(queue) = thread.take_waiting() {
                    queue.queue.lock().remove(thread.id());
                }
                thread.set_state(ThreadState::Suspended);
                self.unlock(st);
            }
            ThreadState::Running => {
                thread.set_state(ThreadState::Suspended);
                let cpu = (0..A::cores()).find(|&k| st.running[k].as_ref() == Some(thread));
                match cpu {
                    Some(cpu) if cpu == A::cpu_id() => self.dispatch(st, None),
                    Some(cpu) => {
                        self.unlock(st);
                        A::send_reschedule_ipi(cpu);
                    }
                    None => self.unlock(st),
                }
            }
            ThreadState::Suspended | ThreadState::Finishing => self.unlock(st),
        }
    }

    /// Move a SUSPENDED thread back to READY, preempting a less urgent
    /// runner. No-op on any other state.
    pub fn resume(&self, thread: &Thread) {
        let mut st = self.lock();
        if thread.state() != ThreadState::Suspended {
            self.unlock(st);
            return;
        }
        thread.set_state(ThreadState::Ready);
        st.ready.insert(thread.clone());
        self.preempt_or_unlock(st, thread);
    }

    /// Replace a thread's criterion, re-sorting whatever queue it is
    /// linked into, and reschedule if the change displaces someone.
    pub fn set_priority(&self, thread: &Thread, criterion: Criterion) {
        let cpu = A::cpu_id();
        let mut st = self.lock();
        let now = self.alarm.elapsed();

        let mut criterion = criterion;
        let home = thread.with_criterion(|c| c.queue());
        criterion.assign_queue(home);
        criterion.collect(Event::Create, now, cpu);
        let rank = criterion.rank();
        thread.replace_criterion(criterion);

        match thread.state() {
            ThreadState::Ready => {
                st.ready.resort(thread.id(), rank);
                self.preempt_or_unlock(st, thread);
            }
            ThreadState::Waiting => {
                if let Some(queue) = thread.waiting_queue() {
                    queue.queue.lock().resort(thread.id(), rank);
                }
                self.unlock(st);
            }
            ThreadState::Running => self.reschedule_after_rank_change(st, thread),
            _ => self.unlock(st),
        }
    }

    // ------------------------------------------------------------------
    // Sleep / wakeup
    // ------------------------------------------------------------------

    /// Block the calling thread on `queue` and reschedule.
    pub fn sleep(&self, queue: &WaitQueue) {
        let cpu = A::cpu_id();
        let st = self.lock();
        let current = st.running[cpu]
            .clone()
            .expect("sleep from outside a thread");
        assert!(!current.is_idle(), "idle thread cannot sleep");

        current.set_state(ThreadState::Waiting);
        current.set_waiting(queue.inner().clone());
        queue.push(current);
        self.dispatch(st, None);
        // Resumed by a wakeup on `queue`.
    }

    /// Release the most urgent waiter on `queue`, preempting a less
    /// urgent runner. Returns false when the queue is empty.
    pub fn wakeup(&self, queue: &WaitQueue) -> bool {
        let mut st = self.lock();
        match queue.pop_front() {
            None => {
                self.unlock(st);
                false
            }
            Some(thread) => {
                thread.take_waiting();
                thread.set_state(ThreadState::Ready);
                st.ready.insert(thread.clone());
                self.preempt_or_unlock(st, &thread);
                true
            }
        }
    }

    /// Release every waiter on `queue`.
    pub fn wakeup_all(&self, queue: &WaitQueue) {
        let mut st = self.lock();
        let mut most_urgent: Option<Thread> = None;
        while let Some(thread) = queue.pop_front() {
            thread.take_waiting();
            thread.set_state(ThreadState::Ready);
            st.ready.insert(thread.clone());
            if most_urgent.is_none() {
                most_urgent = Some(thread);
            }
        }
        match most_urgent {
            Some(thread) => self.preempt_or_unlock(st, &thread),
            None => self.unlock(st),
        }
    }

    // ------------------------------------------------------------------
    // Priority inversion avoidance
    // ------------------------------------------------------------------

    /// Boost a resource holder against the waiters on `queue`, per the
    /// configured protocol: to the most urgent waiter's rank under
    /// INHERITANCE, to CEILING under CEILING. The holder's natural
    /// priority is saved for [`Kernel::deprioritize`].
    pub fn prioritize(&self, holder: &Thread, queue: &WaitQueue) {
        if self.config.protocol == Protocol::None {
            return;
        }
        let mut st = self.lock();
        let boost = match self.config.protocol {
            Protocol::Ceiling => Some(CEILING),
            Protocol::Inheritance => queue.front_rank().filter(|&r| r < holder.rank()),
            Protocol::None => None,
        };
        match boost {
            Some(rank) => {
                holder.save_natural_priority();
                holder.with_criterion(|c| c.set_rank(rank));
                Self::relink(&mut st, holder, rank);
                trace!("thread {} boosted to rank {}", holder.id(), rank);
                self.reschedule_after_rank_change(st, holder);
            }
            None => self.unlock(st),
        }
    }

    /// Restore a holder's natural priority saved by `prioritize`.
    pub fn deprioritize(&self, holder: &Thread) {
        let mut st = self.lock();
        if !holder.restore_natural_priority() {
            self.unlock(st);
            return;
        }
        let rank = holder.rank();
        Self::relink(&mut st, holder, rank);
        trace!("thread {} restored to rank {}", holder.id(), rank);
        self.reschedule_after_rank_change(st, holder);
    }

    /// Re-sort a linked thread under a new rank.
    fn relink(st: &mut SchedState, thread: &Thread, rank: Rank) {
        match thread.state() {
            ThreadState::Ready => {
                st.ready.resort(thread.id(), rank);
            }
            ThreadState::Waiting => {
                if let Some(queue) = thread.waiting_queue() {
                    queue.queue.lock().resort(thread.id(), rank);
                }
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Timer
    // ------------------------------------------------------------------

    /// Per-CPU periodic tick entry. CPU 0's tick also advances the
    /// alarm; every CPU's tick charges its quantum countdown.
    pub fn timer_tick(&self) {
        if !self.is_initialized() {
            return;
        }
        let cpu = A::cpu_id();
        if cpu == 0 {
            self.alarm.tick();
        }
        if self.slicer.on_tick(cpu) {
            self.slicer.reset(cpu);
            self.time_slicer();
        }
    }

    /// Quantum expiry: preempt if the running criterion consents; a
    /// cooperative criterion's tick only refreshes statistics. An idle
    /// CPU redispatches whenever work is linked.
    fn time_slicer(&self) {
        let cpu = A::cpu_id();
        let st = self.lock();
        let charge = match st.running[cpu].as_ref() {
            Some(runner) if runner.is_idle() => st.ready.head_rank(cpu).is_some(),
            Some(runner) => runner.with_criterion(|c| c.charge()),
            None => false,
        };
        if charge {
            self.dispatch(st, None);
        } else {
            let now = self.alarm.elapsed();
            if let Some(runner) = st.running[cpu].as_ref() {
                runner.with_criterion(|c| c.collect(Event::Update, now, cpu));
            }
            self.unlock(st);
        }
    }

    /// Rewrite every linked dynamic rank from a fresh snapshot. The
    /// dispatcher does this on every decision; alarm handlers may also
    /// call it between decisions.
    pub fn update_all_priorities(&self) {
        let mut st = self.lock();
        let now = self.alarm.elapsed();
        st.ready.update_all(now, A::cpu_id());
        self.unlock(st);
    }

    // ------------------------------------------------------------------
    // Reaping
    // ------------------------------------------------------------------

    /// Return the stacks of unjoined FINISHING threads to the pool.
    /// Driven by the idle loop.
    pub fn reap(&self) {
        let mut st = self.lock();
        let zombies = mem::take(&mut st.zombies);
        self.unlock(st);
        for zombie in zombies {
            if let Some(stack) = zombie.take_stack() {
                self.stack_pool.deallocate(stack);
            }
        }
    }

    /// Reap one joined thread: its stack returns to the pool before the
    /// joiner continues. Acquiring the guard here orders the reap after
    /// the target's final switch-out.
    fn reap_thread(&self, target: &Thread) {
        debug_assert_eq!(target.state(), ThreadState::Finishing);
        let mut st = self.lock();
        st.zombies.retain(|z| z != target);
        self.unlock(st);
        if let Some(stack) = target.take_stack() {
            self.stack_pool.deallocate(stack);
        }
    }

    #[cfg(test)]
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut SchedState) -> R) -> R {
        let mut st = self.lock();
        let result = f(&mut *st);
        self.unlock(st);
        result
    }

    #[cfg(test)]
    pub(crate) fn stack_pool_stats(&self) -> (usize, usize, usize) {
        self.stack_pool.stats()
    }
}

impl<A: Arch> KernelOps for Kernel<A> {
    fn yield_thread(&self) {
        self.yield_now();
    }

    fn exit_thread(&self, status: i32) {
        self.exit_current(status);
    }

    fn switch_epilogue(&self) {
        self.dispatch_epilogue();
    }
}

/// The operations thread trampolines need from whatever kernel is
/// registered, without knowing its architecture parameter.
pub(crate) trait KernelOps: Sync {
    fn yield_thread(&self);
    fn exit_thread(&self, status: i32);
    fn switch_epilogue(&self);
}

static GLOBAL_KERNEL: spin::Once<&'static dyn KernelOps> = spin::Once::new();

fn register_global(kernel: &'static dyn KernelOps) {
    GLOBAL_KERNEL.call_once(|| kernel);
}

pub(crate) fn global_kernel() -> Option<&'static dyn KernelOps> {
    GLOBAL_KERNEL.get().copied()
}

/// First code of every spawned thread, entered on its fabricated stack:
/// release the dispatch guard, run the entry closure, exit with its
/// status.
fn thread_trampoline<F: FnOnce() -> i32 + Send + 'static>(arg: usize) {
    let kernel = global_kernel().expect("thread started before kernel registration");
    kernel.switch_epilogue();

    let entry = unsafe { Box::from_raw(arg as *mut F) };
    let status = entry();

    kernel.exit_thread(status);
    // exit never returns to a FINISHING thread
    loop {
        core::hint::spin_loop();
    }
}

// With the no-op architecture, context switches do nothing and the test
// body keeps executing while the kernel's bookkeeping tracks which
// thread holds the (single) CPU. The tests below drive dispatch
// decisions and assert on that bookkeeping.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::NoOpArch;
    use crate::sched::criterion::{CEILING, HIGH, LOW, MAIN, NORMAL};
    use crate::time::{Duration, Tick};

    fn kernel_with(config: KernelConfig) -> &'static Kernel<NoOpArch> {
        let kernel: &'static Kernel<NoOpArch> = Box::leak(Box::new(Kernel::new(config)));
        kernel.init().unwrap();
        kernel
    }

    fn kernel() -> &'static Kernel<NoOpArch> {
        kernel_with(KernelConfig::new())
    }

    #[test]
    fn test_init_adopts_main_thread() {
        let k = kernel();
        let main = k.current().unwrap();

        assert_eq!(main.state(), ThreadState::Running);
        assert_eq!(main.rank(), MAIN);
        assert_eq!(k.thread_count(), 1);
        assert!(k.init().is_err(), "second init must fail");
    }

    #[test]
    fn test_spawn_requires_init() {
        let k: Kernel<NoOpArch> = Kernel::new(KernelConfig::new());
        assert!(matches!(k.spawn(|| 0), Err(SpawnError::NotInitialized)));
    }

    #[test]
    fn test_spawn_links_ready_thread() {
        let k = kernel();
        let handle = k.spawn(|| 0).unwrap();
        let thread = handle.thread().clone();

        assert_eq!(thread.state(), ThreadState::Ready);
        assert_eq!(thread.rank(), NORMAL);
        assert!(k.with_state(|st| st.ready.contains(thread.id())));
        // MAIN outranks NORMAL: the spawner keeps its CPU.
        assert_eq!(k.current().unwrap().rank(), MAIN);
        assert_eq!(k.thread_count(), 2);
    }

    #[test]
    fn test_yield_redispatches_most_urgent() {
        let k = kernel();
        let main = k.current().unwrap();
        k.spawn(|| 0).unwrap();

        k.yield_now();
        assert_eq!(k.current().unwrap(), main);
        assert!(!k.with_state(|st| st.ready.contains(main.id())));
    }

    #[test]
    fn test_pass_donates_cpu() {
        let k = kernel();
        let main = k.current().unwrap();
        let handle = k.spawn(|| 0).unwrap();
        let thread = handle.thread().clone();

        k.pass(&thread);
        assert_eq!(k.current().unwrap(), thread);
        assert_eq!(main.state(), ThreadState::Ready);
        assert!(k.with_state(|st| st.ready.contains(main.id())));

        // pass to a non-runnable target is a no-op
        let suspended = k
            .spawn_with(Configuration::new().suspended(), || 0)
            .unwrap();
        k.pass(suspended.thread());
        assert_eq!(k.current().unwrap(), thread);
    }

    #[test]
    fn test_suspend_resume_ready_thread_roundtrip() {
        let k = kernel();
        let handle = k.spawn(|| 0).unwrap();
        let thread = handle.thread().clone();

        k.suspend(&thread);
        assert_eq!(thread.state(), ThreadState::Suspended);
        assert!(!k.with_state(|st| st.ready.contains(thread.id())));

        k.resume(&thread);
        assert_eq!(thread.state(), ThreadState::Ready);
        assert!(k.with_state(|st| st.ready.contains(thread.id())));
        assert_eq!(thread.rank(), NORMAL);

        // resume of a thread that is not SUSPENDED is a no-op
        k.resume(&thread);
        assert_eq!(k.with_state(|st| st.ready.len()), 1);
    }

    #[test]
    fn test_suspend_running_thread_reschedules() {
        let k = kernel();
        let main = k.current().unwrap();
        let handle = k.spawn(|| 0).unwrap();
        let thread = handle.thread().clone();

        k.pass(&thread);
        k.suspend(&thread);
        assert_eq!(thread.state(), ThreadState::Suspended);
        assert_eq!(k.current().unwrap(), main);
    }

    #[test]
    fn test_resume_preempts_less_urgent_runner() {
        let k = kernel();
        let main = k.current().unwrap();
        let handle = k
            .spawn_with(Configuration::new().criterion(Criterion::low()), || 0)
            .unwrap();
        let low = handle.thread().clone();

        k.pass(&low);
        k.suspend(&main);
        assert_eq!(k.current().unwrap(), low);

        k.resume(&main);
        assert_eq!(k.current().unwrap(), main);
        assert_eq!(low.state(), ThreadState::Ready);
    }

    #[test]
    fn test_yield_alternates_equal_ranks() {
        let k = kernel();
        let main = k.current().unwrap();
        let h1 = k.spawn(|| 0).unwrap();
        let h2 = k.spawn(|| 0).unwrap();
        let t1 = h1.thread().clone();
        let t2 = h2.thread().clone();

        k.suspend(&main);
        assert_eq!(k.current().unwrap(), t1);

        // Equal ranks requeue behind each other: cooperative yields
        // alternate 1, 2, 1, 2, ...
        k.yield_now();
        assert_eq!(k.current().unwrap(), t2);
        k.yield_now();
        assert_eq!(k.current().unwrap(), t1);
        k.yield_now();
        assert_eq!(k.current().unwrap(), t2);
    }

    #[test]
    fn test_round_robin_time_slicing_alternates() {
        let k = kernel_with(KernelConfig::new().quantum(1));
        let main = k.current().unwrap();
        let h1 = k
            .spawn_with(
                Configuration::new().criterion(Criterion::round_robin(NORMAL)),
                || 0,
            )
            .unwrap();
        let h2 = k
            .spawn_with(
                Configuration::new().criterion(Criterion::round_robin(NORMAL)),
                || 0,
            )
            .unwrap();
        let t1 = h1.thread().clone();
        let t2 = h2.thread().clone();

        k.suspend(&main);
        assert_eq!(k.current().unwrap(), t1, "FIFO among equal ranks");

        k.timer_tick();
        assert_eq!(k.current().unwrap(), t2);
        k.timer_tick();
        assert_eq!(k.current().unwrap(), t1);
        k.timer_tick();
        assert_eq!(k.current().unwrap(), t2);

        k.resume(&main);
        assert_eq!(k.current().unwrap(), main);
    }

    #[test]
    fn test_cooperative_criterion_declines_time_slice() {
        let k = kernel_with(KernelConfig::new().quantum(1));
        let handle = k
            .spawn_with(Configuration::new().criterion(Criterion::fcfs()), || 0)
            .unwrap();
        let thread = handle.thread().clone();

        k.pass(&thread);
        k.timer_tick();
        // FCFS is cooperative: the tick updates statistics only.
        assert_eq!(k.current().unwrap(), thread);
    }

    #[test]
    fn test_exit_and_join_return_status() {
        let k = kernel();
        let main = k.current().unwrap();
        let handle = k.spawn(|| 0).unwrap();
        let thread = handle.thread().clone();

        k.pass(&thread);
        k.exit_current(42);

        assert_eq!(thread.state(), ThreadState::Finishing);
        assert_eq!(k.current().unwrap(), main);
        assert_eq!(k.thread_count(), 1);
        assert_eq!(handle.try_status(), Some(42));

        let status = k.join(handle);
        assert_eq!(status, 42);
        // the stack was released before join returned
        assert!(!thread.has_stack());
        assert!(k.with_state(|st| st.zombies.is_empty()));
    }

    #[test]
    fn test_exit_wakes_joiner() {
        let k = kernel();
        let main = k.current().unwrap();
        let handle = k.spawn(|| 0).unwrap();
        let worker = handle.thread().clone();

        k.pass(&worker);
        // Simulate main blocked in join on the worker.
        k.with_state(|st| {
            st.ready.remove(main.id());
            main.set_state(ThreadState::Suspended);
            worker.set_joiner(main.clone());
        });

        k.exit_current(7);
        assert_eq!(worker.state(), ThreadState::Finishing);
        assert_eq!(k.current().unwrap(), main);
        assert_eq!(k.join(handle), 7);
    }

    #[test]
    fn test_idle_runs_when_nothing_ready_and_reaps_zombies() {
        let k = kernel();
        let main = k.current().unwrap();
        let handle = k.spawn(|| 0).unwrap();
        let thread = handle.thread().clone();

        k.pass(&thread);
        k.with_state(|st| {
            st.ready.remove(main.id());
            main.set_state(ThreadState::Suspended);
        });
        k.exit_current(0);

        let current = k.current().unwrap();
        assert!(current.is_idle());
        assert!(k.with_state(|st| st.zombies.len() == 1));

        let (_, _, in_use_before) = k.stack_pool_stats();
        k.reap();
        assert!(!thread.has_stack());
        let (_, _, in_use_after) = k.stack_pool_stats();
        assert_eq!(in_use_after, in_use_before - 1);

        k.resume(&main);
        assert_eq!(k.current().unwrap(), main);
    }

    #[test]
    fn test_sleep_wakeup_releases_most_urgent_first() {
        let k = kernel();
        let main = k.current().unwrap();
        let queue = WaitQueue::new();
        let h_low = k
            .spawn_with(Configuration::new().criterion(Criterion::low()), || 0)
            .unwrap();
        let h_high = k
            .spawn_with(Configuration::new().criterion(Criterion::high()), || 0)
            .unwrap();
        let low = h_low.thread().clone();
        let high = h_high.thread().clone();

        k.pass(&low);
        k.sleep(&queue);
        assert_eq!(low.state(), ThreadState::Waiting);
        assert_eq!(low.waiting_on(), Some(queue.id()));
        assert_eq!(k.current().unwrap(), main);

        k.pass(&high);
        k.sleep(&queue);
        assert_eq!(k.current().unwrap(), main);
        assert_eq!(queue.len(), 2);

        assert!(k.wakeup(&queue));
        assert_eq!(high.state(), ThreadState::Ready);
        assert_eq!(high.waiting_on(), None);
        assert_eq!(low.state(), ThreadState::Waiting);

        assert!(k.wakeup(&queue));
        assert_eq!(low.state(), ThreadState::Ready);
        assert!(!k.wakeup(&queue), "wakeup on an empty queue");
    }

    #[test]
    fn test_wakeup_all_drains_queue() {
        let k = kernel();
        let queue = WaitQueue::new();
        let h_a = k.spawn(|| 0).unwrap();
        let h_b = k.spawn(|| 0).unwrap();
        let a = h_a.thread().clone();
        let b = h_b.thread().clone();

        k.pass(&a);
        k.sleep(&queue);
        k.pass(&b);
        k.sleep(&queue);
        assert_eq!(queue.len(), 2);

        k.wakeup_all(&queue);
        assert!(queue.is_empty());
        assert_eq!(a.state(), ThreadState::Ready);
        assert_eq!(b.state(), ThreadState::Ready);
        assert!(k.with_state(|st| st.ready.contains(a.id()) && st.ready.contains(b.id())));
    }

    #[test]
    fn test_edf_dispatches_earliest_deadline_first() {
        let k = kernel();
        let main = k.current().unwrap();
        let edf = |ms: u64| {
            Criterion::edf(
                Duration::from_millis(ms),
                Duration::from_millis(ms),
                Duration::from_millis(ms / 5),
            )
        };
        let h_a = k
            .spawn_with(Configuration::new().criterion(edf(100)), || 0)
            .unwrap();
        let h_c = k
            .spawn_with(Configuration::new().criterion(edf(350)), || 0)
            .unwrap();
        let h_b = k
            .spawn_with(Configuration::new().criterion(edf(150)), || 0)
            .unwrap();

        k.suspend(&main);
        assert_eq!(k.current().unwrap().id(), h_a.id());
        k.exit_current(0);
        assert_eq!(k.current().unwrap().id(), h_b.id());
        k.exit_current(0);
        assert_eq!(k.current().unwrap().id(), h_c.id());
    }

    #[test]
    fn test_edf_feasible_periodic_set_meets_all_deadlines() {
        const MS: Tick = 1_000;

        struct PeriodicJob {
            thread: Thread,
            period: Tick,
            capacity: Tick,
            remaining: Tick,
            deadline: Tick,
            next_release: Tick,
            completions: u32,
            misses: u32,
        }

        // Quantum of one tick: every boundary tick re-evaluates the
        // ready EDF ranks, the time-sliced behavior of the criterion.
        let k = kernel_with(KernelConfig::new().quantum(1));
        let main = k.current().unwrap();

        let spawn_periodic = |period_ms: u64, capacity_ms: u64| -> PeriodicJob {
            let handle = k
                .spawn_with(
                    Configuration::new().criterion(Criterion::edf(
                        Duration::from_millis(period_ms),
                        Duration::from_millis(period_ms),
                        Duration::from_millis(capacity_ms),
                    )),
                    || 0,
                )
                .unwrap();
            PeriodicJob {
                thread: handle.thread().clone(),
                period: period_ms * MS,
                capacity: capacity_ms * MS,
                remaining: capacity_ms * MS,
                deadline: period_ms * MS,
                next_release: period_ms * MS,
                completions: 0,
                misses: 0,
            }
        };
        let mut jobs = [
            spawn_periodic(100, 20),
            spawn_periodic(150, 30),
            spawn_periodic(350, 100),
        ];
        k.suspend(&main);

        // Run 1000 ms in one-millisecond grains. Every job event lands
        // on a grain boundary, and a grain belongs to the thread holding
        // the CPU when it starts. A completed job leaves the ready
        // structure until its next period, which renews its budget and
        // deadline the way a periodic wrapper would.
        let horizon = 1_000 * MS;
        for ms in 0..1_000u64 {
            let now_end = (ms + 1) * MS;
            let runner = k.current().unwrap();

            for _ in 0..MS - 1 {
                k.alarm().tick();
            }
            k.timer_tick();

            if let Some(job) = jobs.iter_mut().find(|j| j.thread == runner) {
                job.remaining -= MS;
                if job.remaining == 0 {
                    if now_end > job.deadline {
                        job.misses += 1;
                    } else if job.deadline <= horizon {
                        job.completions += 1;
                    }
                    k.suspend(&job.thread);
                }
            }

            // A release landing exactly on the horizon is outside the run.
            for job in jobs.iter_mut() {
                if job.next_release == now_end && now_end < horizon {
                    job.remaining = job.capacity;
                    job.deadline = now_end + job.period;
                    job.next_release += job.period;
                    job.thread.with_criterion(|c| c.next_job(now_end));
                    k.resume(&job.thread);
                }
            }
        }

        // Utilization 20/100 + 30/150 + 100/350 ≈ 0.69 on one CPU:
        // feasible, so nothing misses, and the jobs due within the run
        // complete 10, 6 and 2 times.
        assert_eq!(jobs.iter().map(|j| j.misses).sum::<u32>(), 0);
        assert_eq!(jobs[0].completions, 10);
        assert_eq!(jobs[1].completions, 6);
        assert_eq!(jobs[2].completions, 2);
        // 10 jobs of 20 ms each, accounted across every switch-out.
        assert_eq!(jobs[0].thread.statistics().execution_time, 200 * MS);
        assert!(k.current().unwrap().is_idle());
    }

    #[test]
    fn test_llf_keeps_minimal_laxity_running_and_accounts_time() {
        let k = kernel_with(KernelConfig::new().quantum(5));
        let main = k.current().unwrap();
        let h_a = k
            .spawn_with(
                Configuration::new().criterion(Criterion::llf(
                    Duration::from_millis(10),
                    Duration::from_millis(10),
                    Duration::from_millis(8),
                )),
                || 0,
            )
            .unwrap();
        let h_b = k
            .spawn_with(
                Configuration::new().criterion(Criterion::llf(
                    Duration::from_millis(20),
                    Duration::from_millis(20),
                    Duration::from_millis(4),
                )),
                || 0,
            )
            .unwrap();
        let a = h_a.thread().clone();
        let b = h_b.thread().clone();

        k.suspend(&main);
        // laxities at t=0: a = 2000, b = 16000
        assert_eq!(k.current().unwrap(), a);

        // One quantum: a is preempted, charged, and re-chosen — a
        // running thread's laxity is constant, a waiting one's decays.
        for _ in 0..5 {
            k.timer_tick();
        }
        assert_eq!(k.current().unwrap(), a);
        assert_eq!(a.statistics().execution_time, 5);
        assert_eq!(a.criterion().capacity(), 7_995);
        assert_eq!(b.rank(), 20_000 - (5 + 4_000));
    }

    #[test]
    fn test_priority_inheritance_boosts_holder() {
        let k = kernel_with(KernelConfig::new().protocol(Protocol::Inheritance));
        let main = k.current().unwrap();
        let queue = WaitQueue::new();
        let h_l = k
            .spawn_with(Configuration::new().criterion(Criterion::low()), || 0)
            .unwrap();
        let h_h = k
            .spawn_with(Configuration::new().criterion(Criterion::high()), || 0)
            .unwrap();
        let holder = h_l.thread().clone();
        let urgent = h_h.thread().clone();

        // The urgent thread blocks on the held resource.
        k.pass(&urgent);
        k.sleep(&queue);
        assert_eq!(k.current().unwrap(), main);

        // A NORMAL bystander would otherwise run ahead of the LOW holder.
        let h_m = k.spawn(|| 0).unwrap();
        assert_eq!(k.with_state(|st| st.ready.chosen(0).unwrap().id()), h_m.id());

        k.prioritize(&holder, &queue);
        assert_eq!(holder.rank(), HIGH);
        assert_eq!(
            k.with_state(|st| st.ready.chosen(0).unwrap().id()),
            holder.id(),
            "boosted holder re-sorted ahead of the bystander"
        );

        k.deprioritize(&holder);
        assert_eq!(holder.rank(), LOW);
        assert_eq!(k.with_state(|st| st.ready.chosen(0).unwrap().id()), h_m.id());
    }

    #[test]
    fn test_priority_ceiling_boosts_and_preempts() {
        let k = kernel_with(KernelConfig::new().protocol(Protocol::Ceiling));
        let main = k.current().unwrap();
        let queue = WaitQueue::new();
        let handle = k
            .spawn_with(Configuration::new().criterion(Criterion::low()), || 0)
            .unwrap();
        let holder = handle.thread().clone();

        k.prioritize(&holder, &queue);
        assert_eq!(holder.rank(), CEILING);
        // CEILING outranks even MAIN: the holder takes the CPU.
        assert_eq!(k.current().unwrap(), holder);

        k.deprioritize(&holder);
        assert_eq!(holder.rank(), LOW);
        // Dropping the boost hands the CPU back.
        assert_eq!(k.current().unwrap(), main);
        assert_eq!(holder.state(), ThreadState::Ready);
    }

    #[test]
    fn test_set_priority_resorts_and_preempts() {
        let k = kernel();
        let h_a = k.spawn(|| 0).unwrap();
        let h_b = k
            .spawn_with(Configuration::new().criterion(Criterion::low()), || 0)
            .unwrap();
        let a = h_a.thread().clone();
        let b = h_b.thread().clone();

        assert_eq!(k.with_state(|st| st.ready.chosen(0).unwrap().id()), a.id());

        k.set_priority(&b, Criterion::high());
        assert_eq!(b.rank(), HIGH);
        assert_eq!(k.with_state(|st| st.ready.chosen(0).unwrap().id()), b.id());

        // Raising above MAIN preempts the running thread.
        k.set_priority(&b, Criterion::priority(MAIN - 1));
        assert_eq!(k.current().unwrap(), b);
    }

    mod smp {
        use super::*;

        static IPI_TARGET: AtomicUsize = AtomicUsize::new(usize::MAX);

        /// Two-CPU no-op architecture recording reschedule IPIs.
        struct SmpTestArch;

        impl Arch for SmpTestArch {
            unsafe fn init_stack(stack_top: *mut u8, _entry: usize, _arg: usize) -> *mut u8 {
                stack_top
            }

            unsafe fn context_switch(_prev_slot: *mut *mut u8, _next: *mut u8) {}

            fn cpu_id() -> usize {
                0
            }

            fn cores() -> usize {
                2
            }

            fn enable_interrupts() {}

            fn disable_interrupts() {}

            fn interrupts_enabled() -> bool {
                true
            }

            fn send_reschedule_ipi(cpu: usize) {
                IPI_TARGET.store(cpu, Ordering::SeqCst);
            }

            fn wait_for_interrupt() {}
        }

        #[test]
        fn test_remote_preemption_sends_ipi() {
            let k: &'static Kernel<SmpTestArch> =
                Box::leak(Box::new(Kernel::new(KernelConfig::new().global_ready(true))));
            k.init().unwrap();

            // Install a LOW thread as CPU 1's runner by hand.
            let handle = k
                .spawn_with(Configuration::new().criterion(Criterion::low()), || 0)
                .unwrap();
            let low = handle.thread().clone();
            k.with_state(|st| {
                st.ready.remove(low.id());
                low.set_state(ThreadState::Running);
                low.set_last_cpu(1);
                st.running[1] = Some(low.clone());
            });

            // A HIGH arrival outranks CPU 1's runner but not CPU 0's
            // MAIN thread: CPU 1 gets the IPI.
            k.spawn_with(Configuration::new().criterion(Criterion::high()), || 0)
                .unwrap();
            assert_eq!(IPI_TARGET.load(Ordering::SeqCst), 1);
            assert_eq!(k.current().unwrap().rank(), MAIN);
        }

        #[test]
        fn test_gllf_heads_distribute_across_cpus() {
            let k: &'static Kernel<SmpTestArch> =
                Box::leak(Box::new(Kernel::new(KernelConfig::new().global_ready(true))));
            k.init().unwrap();

            let gllf = |capacity_ms: u64| {
                Criterion::gllf(
                    Duration::from_millis(10),
                    Duration::from_millis(10),
                    Duration::from_millis(capacity_ms),
                )
            };
            // Laxities 5, 7 and 9 ms.
            let h_tight = k
                .spawn_with(Configuration::new().criterion(gllf(5)), || 0)
                .unwrap();
            let h_mid = k
                .spawn_with(Configuration::new().criterion(gllf(3)), || 0)
                .unwrap();
            let h_loose = k
                .spawn_with(Configuration::new().criterion(gllf(1)), || 0)
                .unwrap();

            k.with_state(|st| {
                assert_eq!(st.ready.chosen(0).unwrap().id(), h_tight.id());
                assert_eq!(st.ready.chosen(1).unwrap().id(), h_mid.id());

                // Both CPUs dispatch: distinct threads, the loosest waits.
                let first = st.ready.take_chosen(0).unwrap();
                let second = st.ready.take_chosen(1).unwrap();
                assert_eq!(first.id(), h_tight.id());
                assert_eq!(second.id(), h_mid.id());
                assert_eq!(st.ready.chosen(0).unwrap().id(), h_loose.id());
            });
        }
    }
}
