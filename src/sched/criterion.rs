//! Scheduling criteria: the policy value carried by every thread.
//!
//! A criterion yields the rank that orders its thread in the ready
//! structure and mutates on scheduling events. Fixed-priority, FCFS and
//! round-robin ranks never change; the real-time criteria (EDF, LLF and
//! the multicore global-LLF) rewrite their rank from a tick snapshot the
//! dispatcher passes in. Criteria never read a clock themselves: the
//! dispatcher takes one snapshot per scheduling decision, under the
//! scheduler guard, so every rank rewritten in that decision agrees on
//! what time it is.

use crate::time::{Alarm, Duration, Tick};

/// Comparable scheduling rank. Lower is more urgent.
pub type Rank = i64;

/// Reserved for threads boosted by the priority-ceiling protocol.
pub const CEILING: Rank = -1_000;
/// Most urgent non-real-time rank, held by the bootstrap thread.
pub const MAIN: Rank = -1;
pub const HIGH: Rank = 0;
pub const NORMAL: Rank = 1_000;
pub const LOW: Rank = 2_000;
/// Least urgent rank, used only by the per-CPU idle threads.
pub const IDLE: Rank = Rank::MAX;

/// Lower bound of the dynamic band: ranks in `PERIODIC..APERIODIC` are
/// rewritten by [`Criterion::update`].
pub const PERIODIC: Rank = HIGH;
/// Upper bound (exclusive) of the dynamic band.
pub const APERIODIC: Rank = Rank::MAX / 2;

/// Number of CPUs the per-CPU execution statistics can account for.
pub const MAX_CPUS: usize = 8;

/// Scheduling events reported to [`Criterion::collect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Thread created and about to be linked.
    Create,
    /// Thread installed as RUNNING on a CPU.
    Dispatch,
    /// Thread switched out (preempted, yielded, blocked or finished).
    Leave,
    /// Thread terminated.
    Finish,
    /// Rank rewritten during a bulk update sweep.
    Update,
}

/// Per-criterion scheduling statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct Statistics {
    /// Tick at which the thread was last installed on a CPU.
    pub last_dispatch: Tick,
    /// Tick of the last job activation.
    pub last_activation: Tick,
    /// Tick of the last bulk rank update.
    pub last_update: Tick,
    /// Total execution time, in ticks.
    pub execution_time: Tick,
    /// Execution time accounted per CPU.
    pub execution_per_cpu: [Tick; MAX_CPUS],
    /// Execution time consumed by the current job.
    pub job_utilization: Tick,
    /// Number of dispatches.
    pub dispatches: u64,
    /// Number of job activations.
    pub activations: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    Priority,
    Fcfs,
    RoundRobin,
    Edf,
    Llf,
    Gllf,
}

/// Scheduling criterion: policy, current rank and real-time parameters.
#[derive(Debug, Clone)]
pub struct Criterion {
    policy: Policy,
    rank: Rank,
    /// Relative deadline, in ticks.
    deadline: Tick,
    /// Activation period, in ticks.
    period: Tick,
    /// Remaining execution budget of the current job, in ticks.
    capacity: Tick,
    /// Budget restored at each job activation.
    initial_capacity: Tick,
    /// Home sub-queue for per-CPU criteria.
    queue: usize,
    stats: Statistics,
}

impl Criterion {
    fn with_policy(policy: Policy, rank: Rank) -> Self {
        Self {
            policy,
            rank,
            deadline: 0,
            period: 0,
            capacity: 0,
            initial_capacity: 0,
            queue: 0,
            stats: Statistics::default(),
        }
    }

    /// Fixed-priority criterion with an explicit rank.
    pub fn priority(rank: Rank) -> Self {
        Self::with_policy(Policy::Priority, rank)
    }

    /// Rank of the bootstrap thread.
    pub fn main() -> Self {
        Self::priority(MAIN)
    }

    pub fn high() -> Self {
        Self::priority(HIGH)
    }

    pub fn normal() -> Self {
        Self::priority(NORMAL)
    }

    pub fn low() -> Self {
        Self::priority(LOW)
    }

    /// Criterion of the per-CPU idle threads.
    pub fn idle() -> Self {
        Self::with_policy(Policy::Priority, IDLE)
    }

    /// First-come-first-served: the rank is stamped with the elapsed-tick
    /// snapshot when the thread is created, so queue order is arrival
    /// order. Never preempts.
    pub fn fcfs() -> Self {
        Self::with_policy(Policy::Fcfs, 0)
    }

    /// Round-robin within one rank, time-sliced by the quantum.
    pub fn round_robin(rank: Rank) -> Self {
        Self::with_policy(Policy::RoundRobin, rank)
    }

    fn real_time(policy: Policy, deadline: Duration, period: Duration, capacity: Duration) -> Self {
        let deadline = Alarm::ticks(deadline);
        let period = Alarm::ticks(period);
        let capacity = Alarm::ticks(capacity);
        let rank = match policy {
            Policy::Edf => deadline as Rank,
            _ => (deadline as Rank - capacity as Rank).max(PERIODIC),
        };
        Self {
            policy,
            rank,
            deadline,
            period,
            capacity,
            initial_capacity: capacity,
            queue: 0,
            stats: Statistics::default(),
        }
    }

    /// Earliest-deadline-first.
    pub fn edf(deadline: Duration, period: Duration, capacity: Duration) -> Self {
        Self::real_time(Policy::Edf, deadline, period, capacity)
    }

    /// Least-laxity-first.
    pub fn llf(deadline: Duration, period: Duration, capacity: Duration) -> Self {
        Self::real_time(Policy::Llf, deadline, period, capacity)
    }

    /// Global least-laxity-first: LLF ranks in the shared multi-head
    /// queue, so any CPU may dispatch the thread.
    pub fn gllf(deadline: Duration, period: Duration, capacity: Duration) -> Self {
        Self::real_time(Policy::Gllf, deadline, period, capacity)
    }

    /// Current rank.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub(crate) fn set_rank(&mut self, rank: Rank) {
        self.rank = rank;
    }

    /// Relative deadline in ticks.
    pub fn deadline(&self) -> Tick {
        self.deadline
    }

    /// Activation period in ticks.
    pub fn period(&self) -> Tick {
        self.period
    }

    /// Remaining execution budget of the current job, in ticks.
    pub fn capacity(&self) -> Tick {
        self.capacity
    }

    /// True for the idle criterion.
    pub fn is_idle(&self) -> bool {
        self.rank == IDLE
    }

    /// Whether a more urgent arrival may displace a running thread under
    /// this policy.
    pub fn preemptive(&self) -> bool {
        self.policy != Policy::Fcfs
    }

    /// Whether the quantum tick preempts this thread.
    pub fn time_sliced(&self) -> bool {
        matches!(
            self.policy,
            Policy::RoundRobin | Policy::Edf | Policy::Llf | Policy::Gllf
        )
    }

    /// Whether the rank is rewritten on scheduling events.
    pub fn dynamic(&self) -> bool {
        matches!(self.policy, Policy::Edf | Policy::Llf | Policy::Gllf)
    }

    /// Whether the thread lives in the shared multi-head queue.
    pub fn global(&self) -> bool {
        self.policy == Policy::Gllf
    }

    /// Target sub-queue in the ready structure.
    pub fn queue(&self) -> usize {
        if self.global() {
            0
        } else {
            self.queue
        }
    }

    pub(crate) fn assign_queue(&mut self, queue: usize) {
        self.queue = queue;
    }

    /// Rewrite the rank from the elapsed-tick snapshot `now`.
    ///
    /// Only ranks inside the `PERIODIC..APERIODIC` band are rewritten.
    /// A job past its laxity is clamped to the band floor: it stays the
    /// most urgent dynamic rank and keeps updating.
    pub fn update(&mut self, now: Tick) {
        if !(self.rank >= PERIODIC && self.rank < APERIODIC) {
            return;
        }
        match self.policy {
            Policy::Edf => {
                self.rank = (now + self.deadline) as Rank;
            }
            Policy::Llf | Policy::Gllf => {
                let laxity = self.deadline as Rank - (now + self.capacity) as Rank;
                self.rank = laxity.max(PERIODIC);
            }
            _ => {}
        }
    }

    /// Account a scheduling event at the elapsed-tick snapshot `now` on
    /// CPU `cpu`.
    pub fn collect(&mut self, event: Event, now: Tick, cpu: usize) {
        match event {
            Event::Create => {
                self.stats.last_activation = now;
                self.stats.activations = 1;
                match self.policy {
                    Policy::Fcfs if self.rank != IDLE => self.rank = now as Rank,
                    Policy::Edf | Policy::Llf | Policy::Gllf => self.update(now),
                    _ => {}
                }
            }
            Event::Dispatch => {
                self.stats.last_dispatch = now;
                self.stats.dispatches += 1;
            }
            Event::Leave => {
                let ran = now.saturating_sub(self.stats.last_dispatch);
                self.stats.execution_time += ran;
                if cpu < MAX_CPUS {
                    self.stats.execution_per_cpu[cpu] += ran;
                }
                self.stats.job_utilization += ran;
                // LLF-class laxity depends on the budget left, so each
                // switch-out charges the time just consumed.
                if self.dynamic() {
                    self.capacity = self.capacity.saturating_sub(ran);
                }
            }
            Event::Update => {
                self.stats.last_update = now;
            }
            Event::Finish => {}
        }
    }

    /// Whether the quantum tick may preempt the running thread.
    ///
    /// Cooperative policies decline and the tick only updates statistics.
    pub fn charge(&self) -> bool {
        self.time_sliced()
    }

    /// Grant extra execution budget to the current job.
    pub fn award(&mut self, ticks: Tick) {
        if self.dynamic() {
            self.capacity += ticks;
        }
    }

    /// Start the next job: restore the execution budget and reset the
    /// per-job accounting. Called by periodic wrappers at each period
    /// boundary.
    pub fn next_job(&mut self, now: Tick) {
        self.capacity = self.initial_capacity;
        self.stats.job_utilization = 0;
        self.stats.last_activation = now;
        self.stats.activations += 1;
        self.update(now);
    }

    /// Scheduling statistics for this criterion.
    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }
}
