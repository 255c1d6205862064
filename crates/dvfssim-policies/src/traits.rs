//! Frequency policy trait definitions.
//!
//! All policies implement the [`FrequencyPolicy`] trait, which receives the
//! previous frequency of every core, the activity mask, and read access to the
//! simulator's performance counters, and proposes one target frequency per core.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Index of a modeled core, in `[0, rows * columns)`.
pub type CoreId = usize;

/// Clock frequency in MHz.
pub type Frequency = u32;

/// Row-major core grid geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreGrid {
    pub rows: usize,
    pub columns: usize,
}

impl CoreGrid {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self { rows, columns }
    }

    pub fn num_cores(&self) -> usize {
        self.rows * self.columns
    }

    /// Grid neighbours (up/down/left/right) of a core.
    pub fn neighbors(&self, core: CoreId) -> Vec<CoreId> {
        let row = core / self.columns;
        let col = core % self.columns;
        let mut out = Vec::with_capacity(4);
        if row > 0 {
            out.push(core - self.columns);
        }
        if row + 1 < self.rows {
            out.push(core + self.columns);
        }
        if col > 0 {
            out.push(core - 1);
        }
        if col + 1 < self.columns {
            out.push(core + 1);
        }
        out
    }
}

/// Allowed frequency range and the step size policies quantize to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub min: Frequency,
    pub max: Frequency,
    pub step: Frequency,
}

impl FrequencyRange {
    pub fn new(min: Frequency, max: Frequency, step: Frequency) -> Self {
        Self { min, max, step }
    }

    /// Clamp a frequency into `[min, max]`.
    pub fn clamp(&self, frequency: Frequency) -> Frequency {
        frequency.clamp(self.min, self.max)
    }

    /// Highest level `min + k * step` that does not exceed `limit`.
    ///
    /// Returns `max` when the limit is at or above it and `min` when the limit
    /// is below the range.
    pub fn highest_level_at_most(&self, limit: f64) -> Frequency {
        if limit >= self.max as f64 {
            return self.max;
        }
        if limit <= self.min as f64 || self.step == 0 {
            return self.min;
        }
        let steps = ((limit - self.min as f64) / self.step as f64).floor() as u32;
        self.clamp(self.min + steps * self.step)
    }
}

/// Read access to per-core telemetry, plus the frequency report channel the
/// DVFS engine writes after each epoch.
pub trait PerformanceCounters {
    /// Power consumption of a core in W, measured over the last interval.
    fn power_of_core(&self, core: CoreId) -> f64;

    /// Utilization of a core in `[0, 1]`.
    fn utilization_of_core(&self, core: CoreId) -> f64;

    /// Temperature of a core in °C.
    fn temperature_of_core(&self, core: CoreId) -> f64;

    /// Frequency last reported through [`notify_freqs_of_cores`](Self::notify_freqs_of_cores).
    fn frequency_of_core(&self, core: CoreId) -> Option<Frequency>;

    /// Record the frequencies in effect after a DVFS epoch.
    fn notify_freqs_of_cores(&mut self, frequencies: &[Frequency]);
}

/// Thermal model of the core grid.
pub trait ThermalModel: Send + Sync {
    /// Per-core power budget (W) under which no core exceeds the DTM
    /// threshold when exactly the cores set in `active_cores` are busy.
    fn thermal_safe_power(&self, active_cores: &[bool]) -> f64;

    /// Steady-state temperature of every core for a given power map.
    fn steady_state_temperatures(&self, power: &[f64]) -> Vec<f64>;
}

/// Policy-specific construction parameters.
///
/// Every option a policy may need is passed here explicitly; policies that
/// do not use an option ignore it.
#[derive(Clone, Default)]
pub struct PolicyParams {
    /// Per-core power budget in W (`fixedPower`).
    pub per_core_power_budget: Option<f64>,
    /// Thermal model (`tsp`).
    pub thermal_model: Option<Arc<dyn ThermalModel>>,
}

impl std::fmt::Debug for PolicyParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyParams")
            .field("per_core_power_budget", &self.per_core_power_budget)
            .field("thermal_model", &self.thermal_model.is_some())
            .finish()
    }
}

/// The core frequency policy trait.
///
/// The DVFS engine calls [`get_frequencies`](Self::get_frequencies) once per
/// epoch. Implementations must return exactly one target per core; the engine
/// is responsible for clamping, rate limiting and hysteresis.
pub trait FrequencyPolicy: Send + Sync {
    fn get_frequencies(
        &mut self,
        old_frequencies: &[Frequency],
        active_cores: &[bool],
        counters: &dyn PerformanceCounters,
    ) -> Vec<Frequency>;

    /// Configuration name of the policy.
    fn name(&self) -> &str;
}

/// Highest step-aligned frequency whose estimated power fits `budget`.
///
/// Power is assumed to scale linearly with frequency from the sample
/// (`power` at `frequency`). Without a usable sample the core may run at `max`.
pub fn frequency_for_budget(
    range: &FrequencyRange,
    frequency: Frequency,
    power: f64,
    budget: f64,
) -> Frequency {
    if frequency == 0 || power <= 0.0 {
        return range.max;
    }
    range.highest_level_at_most(budget * frequency as f64 / power)
}
