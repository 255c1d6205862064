//! Performance-counter store.
//!
//! Holds the per-core telemetry policies read (power, utilization,
//! temperature) and the frequency vector the DVFS engine reports after every
//! epoch.

use dvfssim_policies::{CoreId, Frequency, PerformanceCounters};

#[derive(Debug, Clone)]
pub struct CounterStore {
    power: Vec<f64>,
    utilization: Vec<f64>,
    temperature: Vec<f64>,
    reported_frequencies: Option<Vec<Frequency>>,
    reports: u64,
}

impl CounterStore {
    pub fn new(num_cores: usize, ambient_c: f64) -> Self {
        Self {
            power: vec![0.0; num_cores],
            utilization: vec![0.0; num_cores],
            temperature: vec![ambient_c; num_cores],
            reported_frequencies: None,
            reports: 0,
        }
    }

    pub fn num_cores(&self) -> usize {
        self.power.len()
    }

    /// Record the power and utilization measured for a core.
    pub fn update_core(&mut self, core: CoreId, power: f64, utilization: f64) {
        self.power[core] = power;
        self.utilization[core] = utilization;
    }

    pub fn set_temperatures(&mut self, temperatures: &[f64]) {
        self.temperature.copy_from_slice(temperatures);
    }

    pub fn power(&self) -> &[f64] {
        &self.power
    }

    pub fn total_power(&self) -> f64 {
        self.power.iter().sum()
    }

    pub fn temperatures(&self) -> &[f64] {
        &self.temperature
    }

    /// Frequencies from the most recent DVFS report.
    pub fn reported_frequencies(&self) -> Option<&[Frequency]> {
        self.reported_frequencies.as_deref()
    }

    /// Number of DVFS reports received.
    pub fn reports(&self) -> u64 {
        self.reports
    }
}

impl PerformanceCounters for CounterStore {
    fn power_of_core(&self, core: CoreId) -> f64 {
        self.power[core]
    }

    fn utilization_of_core(&self, core: CoreId) -> f64 {
        self.utilization[core]
    }

    fn temperature_of_core(&self, core: CoreId) -> f64 {
        self.temperature[core]
    }

    fn frequency_of_core(&self, core: CoreId) -> Option<Frequency> {
        self.reported_frequencies.as_ref().map(|f| f[core])
    }

    fn notify_freqs_of_cores(&mut self, frequencies: &[Frequency]) {
        self.reported_frequencies = Some(frequencies.to_vec());
        self.reports += 1;
    }
}
