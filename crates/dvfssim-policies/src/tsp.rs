//! Thermal Safe Power (TSP) policy.
//!
//! Recomputes a per-core power budget every epoch from the thermal model for
//! the current set of active cores, then selects frequencies against that
//! budget the same way [`FixedPower`](crate::FixedPower) does. The budget
//! shrinks as more neighbouring cores become active.

use crate::traits::*;
use std::sync::Arc;

/// Thermal-model-constrained frequency selection.
pub struct ThermalSafePower {
    num_cores: usize,
    range: FrequencyRange,
    thermal_model: Arc<dyn ThermalModel>,
    last_budget: Option<f64>,
}

impl ThermalSafePower {
    pub fn new(grid: CoreGrid, range: FrequencyRange, thermal_model: Arc<dyn ThermalModel>) -> Self {
        Self {
            num_cores: grid.num_cores(),
            range,
            thermal_model,
            last_budget: None,
        }
    }

    /// Per-core budget computed in the most recent epoch.
    pub fn last_budget(&self) -> Option<f64> {
        self.last_budget
    }
}

impl FrequencyPolicy for ThermalSafePower {
    fn get_frequencies(
        &mut self,
        old_frequencies: &[Frequency],
        active_cores: &[bool],
        counters: &dyn PerformanceCounters,
    ) -> Vec<Frequency> {
        let budget = self.thermal_model.thermal_safe_power(active_cores);
        self.last_budget = Some(budget);
        log::trace!(
            "TSP budget for {} active cores: {:.3} W",
            active_cores.iter().filter(|a| **a).count(),
            budget
        );

        (0..self.num_cores)
            .map(|core| {
                if !active_cores[core] {
                    return self.range.min;
                }
                frequency_for_budget(
                    &self.range,
                    old_frequencies[core],
                    counters.power_of_core(core),
                    budget,
                )
            })
            .collect()
    }

    fn name(&self) -> &str {
        "tsp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::FakeCounters;
    use approx::assert_abs_diff_eq;

    /// Budget falls by 1 W for every active core.
    struct CountingThermal;

    impl ThermalModel for CountingThermal {
        fn thermal_safe_power(&self, active_cores: &[bool]) -> f64 {
            10.0 - active_cores.iter().filter(|a| **a).count() as f64
        }

        fn steady_state_temperatures(&self, power: &[f64]) -> Vec<f64> {
            power.iter().map(|p| 45.0 + p).collect()
        }
    }

    #[test]
    fn test_budget_follows_active_set() {
        let range = FrequencyRange::new(1000, 4000, 250);
        let mut policy = ThermalSafePower::new(CoreGrid::new(1, 4), range, Arc::new(CountingThermal));
        let mut counters = FakeCounters::new(4);
        counters.power = vec![8.0; 4];

        // One active core: budget 9 W at 2 mW/MHz -> 4000 (capped at max).
        let one = policy.get_frequencies(&[4000; 4], &[true, false, false, false], &counters);
        assert_eq!(one[0], 4000);
        assert_abs_diff_eq!(policy.last_budget().unwrap(), 9.0);

        // Four active cores: budget 6 W -> 3000 MHz.
        let four = policy.get_frequencies(&[4000; 4], &[true; 4], &counters);
        assert_eq!(four, vec![3000; 4]);
        assert_abs_diff_eq!(policy.last_budget().unwrap(), 6.0);
    }
}
