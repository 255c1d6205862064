//! Fixed per-core power budget policy.
//!
//! Every active core gets the same power budget. The policy estimates each
//! core's power at candidate frequencies from its last measured power and
//! picks the highest step-aligned frequency that stays within budget. Idle
//! cores are parked at the minimum frequency.

use crate::traits::*;

/// Power-budget-constrained frequency selection.
pub struct FixedPower {
    num_cores: usize,
    range: FrequencyRange,
    per_core_power_budget: f64,
}

impl FixedPower {
    pub fn new(grid: CoreGrid, range: FrequencyRange, per_core_power_budget: f64) -> Self {
        Self {
            num_cores: grid.num_cores(),
            range,
            per_core_power_budget,
        }
    }

    pub fn per_core_power_budget(&self) -> f64 {
        self.per_core_power_budget
    }
}

impl FrequencyPolicy for FixedPower {
    fn get_frequencies(
        &mut self,
        old_frequencies: &[Frequency],
        active_cores: &[bool],
        counters: &dyn PerformanceCounters,
    ) -> Vec<Frequency> {
        (0..self.num_cores)
            .map(|core| {
                if !active_cores[core] {
                    return self.range.min;
                }
                frequency_for_budget(
                    &self.range,
                    old_frequencies[core],
                    counters.power_of_core(core),
                    self.per_core_power_budget,
                )
            })
            .collect()
    }

    fn name(&self) -> &str {
        "fixedPower"
    }
}
