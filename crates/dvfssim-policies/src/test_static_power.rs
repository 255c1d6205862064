//! Deterministic policy for static-power experiments.
//!
//! Busy cores run at the maximum frequency and idle cores drop to the
//! minimum, so the static share of the power trace can be read directly off
//! the idle cores.

use crate::traits::*;

/// Active cores at `max_frequency`, idle cores at `min_frequency`.
pub struct TestStaticPower {
    num_cores: usize,
    min_frequency: Frequency,
    max_frequency: Frequency,
}

impl TestStaticPower {
    pub fn new(grid: CoreGrid, min_frequency: Frequency, max_frequency: Frequency) -> Self {
        Self {
            num_cores: grid.num_cores(),
            min_frequency,
            max_frequency,
        }
    }
}

impl FrequencyPolicy for TestStaticPower {
    fn get_frequencies(
        &mut self,
        _old_frequencies: &[Frequency],
        active_cores: &[bool],
        _counters: &dyn PerformanceCounters,
    ) -> Vec<Frequency> {
        (0..self.num_cores)
            .map(|core| {
                if active_cores.get(core).copied().unwrap_or(false) {
                    self.max_frequency
                } else {
                    self.min_frequency
                }
            })
            .collect()
    }

    fn name(&self) -> &str {
        "testStaticPower"
    }
}
