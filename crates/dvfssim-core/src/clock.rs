//! Virtual clock for discrete-event simulation.
//!
//! The [`SimClock`] tracks simulated time independently of wall-clock time,
//! advancing only when events are processed. DVFS epochs are configured in
//! nanoseconds, so the clock keeps nanosecond resolution internally.

use serde::{Deserialize, Serialize};

/// Virtual simulation clock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimClock {
    /// Current simulation time in nanoseconds.
    current_ns: u64,
}

impl SimClock {
    /// Create a new clock starting at time zero.
    pub fn new() -> Self {
        Self { current_ns: 0 }
    }

    /// Create a clock starting at a specific time in nanoseconds.
    pub fn starting_at_ns(ns: u64) -> Self {
        Self { current_ns: ns }
    }

    /// Current time in nanoseconds.
    pub fn now_ns(&self) -> u64 {
        self.current_ns
    }

    /// Current time in microseconds.
    pub fn now_us(&self) -> u64 {
        self.current_ns / 1_000
    }

    /// Current time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.current_ns / 1_000_000
    }

    /// Advance the clock to a specific time in nanoseconds.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `ns` is in the past.
    pub fn advance_to_ns(&mut self, ns: u64) {
        debug_assert!(
            ns >= self.current_ns,
            "Cannot move clock backwards: current={}ns, target={}ns",
            self.current_ns,
            ns,
        );
        self.current_ns = ns;
    }

    /// Advance the clock by a duration in nanoseconds.
    pub fn advance_by_ns(&mut self, delta_ns: u64) {
        self.current_ns += delta_ns;
    }
}
