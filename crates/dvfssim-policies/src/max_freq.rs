//! Maximum-frequency policy.
//!
//! Runs every core at the highest allowed frequency regardless of load.
//! Serves as the performance upper bound when comparing policies.

use crate::traits::*;

/// Pins all cores to `max_frequency`.
pub struct MaxFrequency {
    num_cores: usize,
    max_frequency: Frequency,
}

impl MaxFrequency {
    pub fn new(grid: CoreGrid, max_frequency: Frequency) -> Self {
        Self {
            num_cores: grid.num_cores(),
            max_frequency,
        }
    }
}

impl FrequencyPolicy for MaxFrequency {
    fn get_frequencies(
        &mut self,
        _old_frequencies: &[Frequency],
        _active_cores: &[bool],
        _counters: &dyn PerformanceCounters,
    ) -> Vec<Frequency> {
        vec![self.max_frequency; self.num_cores]
    }

    fn name(&self) -> &str {
        "maxFreq"
    }
}
