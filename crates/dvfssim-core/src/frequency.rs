//! Simulated per-core frequency state.
//!
//! [`FrequencyControl`] is the narrow accessor/mutator interface the DVFS
//! engine uses to read the frequency actually in effect on a core and to
//! change it. [`CoreFrequencies`] is the in-simulator implementation.

use dvfssim_policies::{CoreId, Frequency};
use serde::{Deserialize, Serialize};

/// Ground-truth frequency state of the modeled cores.
pub trait FrequencyControl {
    /// Frequency currently in effect on `core`.
    fn frequency(&self, core: CoreId) -> Frequency;

    /// Change the frequency of `core`.
    fn set_frequency(&mut self, core: CoreId, frequency: Frequency);

    fn num_cores(&self) -> usize;

    /// Frequencies of all cores in core-index order.
    fn snapshot(&self) -> Vec<Frequency> {
        (0..self.num_cores()).map(|core| self.frequency(core)).collect()
    }
}

/// Per-core frequency registers with a transition counter per core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreFrequencies {
    frequencies: Vec<Frequency>,
    transitions: Vec<u64>,
}

impl CoreFrequencies {
    /// All cores start at `initial`.
    pub fn new(num_cores: usize, initial: Frequency) -> Self {
        Self {
            frequencies: vec![initial; num_cores],
            transitions: vec![0; num_cores],
        }
    }

    pub fn from_frequencies(frequencies: Vec<Frequency>) -> Self {
        let transitions = vec![0; frequencies.len()];
        Self {
            frequencies,
            transitions,
        }
    }

    /// Number of `set_frequency` calls seen for `core`.
    pub fn transitions(&self, core: CoreId) -> u64 {
        self.transitions[core]
    }

    pub fn total_transitions(&self) -> u64 {
        self.transitions.iter().sum()
    }

    pub fn per_core_transitions(&self) -> &[u64] {
        &self.transitions
    }
}

impl FrequencyControl for CoreFrequencies {
    fn frequency(&self, core: CoreId) -> Frequency {
        assert!(
            core < self.frequencies.len(),
            "core {} out of range ({} cores)",
            core,
            self.frequencies.len()
        );
        self.frequencies[core]
    }

    fn set_frequency(&mut self, core: CoreId, frequency: Frequency) {
        assert!(
            core < self.frequencies.len(),
            "core {} out of range ({} cores)",
            core,
            self.frequencies.len()
        );
        self.frequencies[core] = frequency;
        self.transitions[core] += 1;
    }

    fn num_cores(&self) -> usize {
        self.frequencies.len()
    }
}
