//! Steady-state grid thermal model.
//!
//! Each core's temperature rises above ambient in proportion to its own power
//! (through `self_resistance`) and to the power of its four grid neighbours
//! (through `neighbor_resistance`). Both resistances are in °C/W.
//!
//! The Thermal Safe Power for an activity mask is the largest uniform power
//! per active core such that, with idle cores drawing `idle_power_w`, no core
//! exceeds the DTM threshold.

use dvfssim_policies::{CoreGrid, ThermalModel};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridThermalModel {
    pub grid: CoreGrid,
    pub ambient_c: f64,
    pub dtm_threshold_c: f64,
    pub self_resistance: f64,
    pub neighbor_resistance: f64,
    /// Power assumed for idle cores when computing TSP.
    pub idle_power_w: f64,
}

impl GridThermalModel {
    pub fn new(
        grid: CoreGrid,
        ambient_c: f64,
        dtm_threshold_c: f64,
        self_resistance: f64,
        neighbor_resistance: f64,
        idle_power_w: f64,
    ) -> Self {
        Self {
            grid,
            ambient_c,
            dtm_threshold_c,
            self_resistance,
            neighbor_resistance,
            idle_power_w,
        }
    }

    /// Hottest core temperature for a power map.
    pub fn peak_temperature(&self, power: &[f64]) -> f64 {
        self.steady_state_temperatures(power)
            .into_iter()
            .fold(self.ambient_c, f64::max)
    }
}

impl ThermalModel for GridThermalModel {
    fn thermal_safe_power(&self, active_cores: &[bool]) -> f64 {
        let headroom = self.dtm_threshold_c - self.ambient_c;
        let mut budget = f64::INFINITY;

        for core in 0..self.grid.num_cores() {
            let neighbors = self.grid.neighbors(core);
            let active_nb = neighbors.iter().filter(|&&n| active_cores[n]).count() as f64;
            let idle_nb = neighbors.len() as f64 - active_nb;
            let idle_heat = self.neighbor_resistance * self.idle_power_w * idle_nb;

            // Temperature of this core as a linear function of P: fixed + slope * P.
            let (fixed, slope) = if active_cores[core] {
                (
                    idle_heat,
                    self.self_resistance + self.neighbor_resistance * active_nb,
                )
            } else {
                (
                    idle_heat + self.self_resistance * self.idle_power_w,
                    self.neighbor_resistance * active_nb,
                )
            };
            if slope > 0.0 {
                budget = budget.min((headroom - fixed) / slope);
            }
        }

        budget.max(0.0)
    }

    fn steady_state_temperatures(&self, power: &[f64]) -> Vec<f64> {
        (0..self.grid.num_cores())
            .map(|core| {
                let coupled: f64 = self
                    .grid
                    .neighbors(core)
                    .into_iter()
                    .map(|n| power[n])
                    .sum();
                self.ambient_c
                    + self.self_resistance * power[core]
                    + self.neighbor_resistance * coupled
            })
            .collect()
    }
}
