//! Scheduling policies and the ordered structures they rank.

pub mod criterion;
pub mod queue;

pub use criterion::{Criterion, Event, Rank, Statistics};
pub use queue::{ReadyQueue, WaitQueue};
