//! Per-core power model.
//!
//! Power grows linearly with utilization and with frequency relative to the
//! maximum frequency, on top of a constant static component:
//!
//! `P = static_power + dynamic_power * utilization * (f / f_max)`

use dvfssim_policies::Frequency;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerModel {
    /// Leakage power in W, drawn even by idle cores.
    pub static_power_w: f64,
    /// Dynamic power in W at full utilization and maximum frequency.
    pub dynamic_power_w: f64,
    /// Frequency at which `dynamic_power_w` is reached.
    pub max_frequency: Frequency,
}

impl PowerModel {
    pub fn new(static_power_w: f64, dynamic_power_w: f64, max_frequency: Frequency) -> Self {
        Self {
            static_power_w,
            dynamic_power_w,
            max_frequency,
        }
    }

    /// Power of one core in W.
    pub fn core_power(&self, frequency: Frequency, utilization: f64) -> f64 {
        let utilization = utilization.clamp(0.0, 1.0);
        let relative = if self.max_frequency == 0 {
            0.0
        } else {
            frequency as f64 / self.max_frequency as f64
        };
        self.static_power_w + self.dynamic_power_w * utilization * relative
    }
}
