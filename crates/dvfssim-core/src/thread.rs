//! Thread model for the multicore simulation.
//!
//! Each [`SimThread`] is a unit of work measured in clock cycles. A thread
//! placed on a core retires cycles at the core's frequency, shared equally
//! with any other threads on the same core, so frequency decisions translate
//! directly into completion times.

use dvfssim_policies::{CoreId, Frequency};
use serde::{Deserialize, Serialize};

pub type ThreadId = u64;

/// A thread arriving in the simulated system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimThread {
    pub id: ThreadId,
    /// Arrival time in simulation nanoseconds.
    pub arrival_time_ns: u64,
    /// Work in clock cycles.
    pub cycles: u64,
    /// Optional label (benchmark name etc.).
    #[serde(default)]
    pub name: Option<String>,
}

/// Tracking state for a thread placed on a core.
#[derive(Debug, Clone)]
pub struct ActiveThread {
    pub thread: SimThread,
    pub core: CoreId,
    pub start_time_ns: u64,
    pub cycles_done: f64,
}

impl ActiveThread {
    pub fn new(thread: SimThread, core: CoreId, start_time_ns: u64) -> Self {
        Self {
            thread,
            core,
            start_time_ns,
            cycles_done: 0.0,
        }
    }

    pub fn remaining_cycles(&self) -> f64 {
        (self.thread.cycles as f64 - self.cycles_done).max(0.0)
    }

    /// Retire cycles for `delta_ns` at `frequency`, sharing the core with
    /// `sharers` threads in total.
    pub fn advance(&mut self, delta_ns: u64, frequency: Frequency, sharers: u32) {
        self.cycles_done += cycles_per_ns(frequency, sharers) * delta_ns as f64;
    }

    /// Nanoseconds until completion at the given rate, rounded up.
    pub fn time_to_completion_ns(&self, frequency: Frequency, sharers: u32) -> Option<u64> {
        let rate = cycles_per_ns(frequency, sharers);
        if rate <= 0.0 {
            return None;
        }
        Some((self.remaining_cycles() / rate).ceil() as u64)
    }

    /// Whether all cycles are retired, with a small tolerance for float error.
    pub fn is_complete(&self) -> bool {
        self.remaining_cycles() < 0.5
    }
}

/// Cycles retired per nanosecond by one of `sharers` threads on a core.
/// 1 MHz is 1e-3 cycles per ns.
fn cycles_per_ns(frequency: Frequency, sharers: u32) -> f64 {
    frequency as f64 / 1000.0 / sharers.max(1) as f64
}
