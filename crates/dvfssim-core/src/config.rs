//! TOML configuration parsing for DVFSSim.
//!
//! Defines the complete configuration schema for simulation runs, including
//! the core grid, DVFS parameters, power and thermal models, scheduler and
//! workload source.

use crate::dvfs::DvfsSettings;
use crate::power::PowerModel;
use crate::scheduler::{available_schedulers, SchedulerSettings};
use crate::thermal::GridThermalModel;
use dvfssim_policies::{CoreGrid, Frequency, PolicyParams};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub simulation: SimulationSection,
    pub cores: CoresSection,
    #[serde(default)]
    pub dvfs: DvfsSection,
    #[serde(default)]
    pub power: PowerSection,
    #[serde(default)]
    pub thermal: ThermalSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub workload: WorkloadSection,
}

/// General simulation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSection {
    /// Human-readable name for this simulation.
    #[serde(default = "default_sim_name")]
    pub name: String,
    /// Random seed for synthetic workloads.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Stop the simulation at this time even if threads are still running.
    #[serde(default)]
    pub max_time_ms: Option<u64>,
}

fn default_sim_name() -> String {
    "simulation".to_string()
}

fn default_seed() -> u64 {
    42
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            name: default_sim_name(),
            seed: default_seed(),
            max_time_ms: None,
        }
    }
}

/// Core grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoresSection {
    pub rows: usize,
    pub columns: usize,
    /// Frequency every core starts at; defaults to `dvfs.max_frequency`.
    #[serde(default)]
    pub initial_frequency: Option<Frequency>,
}

/// DVFS control loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DvfsSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_policy")]
    pub policy: String,
    #[serde(default = "default_min_frequency")]
    pub min_frequency: Frequency,
    #[serde(default = "default_max_frequency")]
    pub max_frequency: Frequency,
    #[serde(default = "default_step")]
    pub frequency_step_size: Frequency,
    /// Epoch length in nanoseconds.
    #[serde(default = "default_epoch_ns")]
    pub epoch_ns: u64,
    #[serde(default = "default_patience")]
    pub max_patience: u32,
    #[serde(default)]
    pub fixed_power: FixedPowerSection,
}

fn default_true() -> bool {
    true
}
fn default_policy() -> String {
    "maxFreq".to_string()
}
fn default_min_frequency() -> Frequency {
    1000
}
fn default_max_frequency() -> Frequency {
    4000
}
fn default_step() -> Frequency {
    100
}
fn default_epoch_ns() -> u64 {
    1_000_000
}
fn default_patience() -> u32 {
    3
}

impl Default for DvfsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: default_policy(),
            min_frequency: default_min_frequency(),
            max_frequency: default_max_frequency(),
            frequency_step_size: default_step(),
            epoch_ns: default_epoch_ns(),
            max_patience: default_patience(),
            fixed_power: FixedPowerSection::default(),
        }
    }
}

/// Parameters of the `fixedPower` policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixedPowerSection {
    /// Power budget per active core in watts.
    pub per_core_power_budget: Option<f64>,
}

/// Per-core power model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerSection {
    #[serde(default = "default_static_power")]
    pub static_power_w: f64,
    /// Dynamic power of a fully utilized core at `max_frequency`.
    #[serde(default = "default_dynamic_power")]
    pub dynamic_power_w: f64,
}

fn default_static_power() -> f64 {
    0.5
}
fn default_dynamic_power() -> f64 {
    4.5
}

impl Default for PowerSection {
    fn default() -> Self {
        Self {
            static_power_w: default_static_power(),
            dynamic_power_w: default_dynamic_power(),
        }
    }
}

/// Grid thermal model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalSection {
    #[serde(default = "default_ambient")]
    pub ambient_c: f64,
    #[serde(default = "default_dtm_threshold")]
    pub dtm_threshold_c: f64,
    /// °C per watt dissipated by the core itself.
    #[serde(default = "default_self_resistance")]
    pub self_resistance: f64,
    /// °C per watt dissipated by each grid neighbour.
    #[serde(default = "default_neighbor_resistance")]
    pub neighbor_resistance: f64,
}

fn default_ambient() -> f64 {
    45.0
}
fn default_dtm_threshold() -> f64 {
    80.0
}
fn default_self_resistance() -> f64 {
    5.0
}
fn default_neighbor_resistance() -> f64 {
    1.0
}

impl Default for ThermalSection {
    fn default() -> Self {
        Self {
            ambient_c: default_ambient(),
            dtm_threshold_c: default_dtm_threshold(),
            self_resistance: default_self_resistance(),
            neighbor_resistance: default_neighbor_resistance(),
        }
    }
}

/// Scheduler selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    /// "first_free" or "round_robin".
    #[serde(rename = "type", default = "default_scheduler")]
    pub scheduler_type: String,
}

fn default_scheduler() -> String {
    "first_free".to_string()
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            scheduler_type: default_scheduler(),
        }
    }
}

/// Workload source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSection {
    /// Path to a workload trace; may be overridden on the command line.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_workload_format")]
    pub format: String,
}

fn default_workload_format() -> String {
    "jsonl".to_string()
}

impl Default for WorkloadSection {
    fn default() -> Self {
        Self {
            path: None,
            format: default_workload_format(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency.
    ///
    /// The policy name is not checked here: an unknown policy is reported when
    /// the DVFS engine is constructed.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.cores.rows == 0 || self.cores.columns == 0 {
            return Err(ConfigError::Validation(
                "cores.rows and cores.columns must be > 0".to_string(),
            ));
        }
        let dvfs = &self.dvfs;
        if dvfs.min_frequency > dvfs.max_frequency {
            return Err(ConfigError::Validation(format!(
                "min_frequency ({}) must not exceed max_frequency ({})",
                dvfs.min_frequency, dvfs.max_frequency
            )));
        }
        if dvfs.max_frequency == 0 {
            return Err(ConfigError::Validation(
                "max_frequency must be > 0".to_string(),
            ));
        }
        if dvfs.frequency_step_size == 0 {
            return Err(ConfigError::Validation(
                "frequency_step_size must be > 0".to_string(),
            ));
        }
        if dvfs.epoch_ns == 0 {
            return Err(ConfigError::Validation("epoch_ns must be > 0".to_string()));
        }
        if let Some(f) = self.cores.initial_frequency {
            if f < dvfs.min_frequency || f > dvfs.max_frequency {
                return Err(ConfigError::Validation(format!(
                    "initial_frequency ({}) outside [{}, {}]",
                    f, dvfs.min_frequency, dvfs.max_frequency
                )));
            }
        }
        if let Some(budget) = dvfs.fixed_power.per_core_power_budget {
            if budget <= 0.0 {
                return Err(ConfigError::Validation(
                    "per_core_power_budget must be > 0".to_string(),
                ));
            }
        }
        if self.power.static_power_w < 0.0 || self.power.dynamic_power_w < 0.0 {
            return Err(ConfigError::Validation(
                "power model coefficients must be >= 0".to_string(),
            ));
        }
        if self.thermal.self_resistance <= 0.0 || self.thermal.neighbor_resistance < 0.0 {
            return Err(ConfigError::Validation(
                "self_resistance must be > 0 and neighbor_resistance >= 0".to_string(),
            ));
        }
        if self.thermal.dtm_threshold_c <= self.thermal.ambient_c {
            return Err(ConfigError::Validation(format!(
                "dtm_threshold_c ({}) must exceed ambient_c ({})",
                self.thermal.dtm_threshold_c, self.thermal.ambient_c
            )));
        }
        if !available_schedulers().contains(&self.scheduler.scheduler_type.as_str()) {
            return Err(ConfigError::Validation(format!(
                "unknown scheduler type: {}",
                self.scheduler.scheduler_type
            )));
        }
        if self.workload.format != "jsonl" {
            return Err(ConfigError::Validation(format!(
                "unsupported workload format: {}",
                self.workload.format
            )));
        }
        Ok(())
    }

    pub fn grid(&self) -> CoreGrid {
        CoreGrid::new(self.cores.rows, self.cores.columns)
    }

    pub fn initial_frequency(&self) -> Frequency {
        self.cores
            .initial_frequency
            .unwrap_or(self.dvfs.max_frequency)
    }

    pub fn max_time_ns(&self) -> Option<u64> {
        self.simulation.max_time_ms.map(|ms| ms * 1_000_000)
    }

    /// DVFS engine settings, or `None` when DVFS is disabled.
    pub fn dvfs_settings(&self) -> Option<DvfsSettings> {
        if !self.dvfs.enabled {
            return None;
        }
        Some(DvfsSettings {
            core_rows: self.cores.rows,
            core_columns: self.cores.columns,
            min_frequency: self.dvfs.min_frequency,
            max_frequency: self.dvfs.max_frequency,
            frequency_step_size: self.dvfs.frequency_step_size,
            dvfs_epoch: self.dvfs.epoch_ns,
            max_dvfs_patience: self.dvfs.max_patience,
            policy: self.dvfs.policy.clone(),
        })
    }

    pub fn power_model(&self) -> PowerModel {
        PowerModel::new(
            self.power.static_power_w,
            self.power.dynamic_power_w,
            self.dvfs.max_frequency,
        )
    }

    /// Thermal model; idle cores are assumed to draw static power.
    pub fn thermal_model(&self) -> GridThermalModel {
        GridThermalModel::new(
            self.grid(),
            self.thermal.ambient_c,
            self.thermal.dtm_threshold_c,
            self.thermal.self_resistance,
            self.thermal.neighbor_resistance,
            self.power.static_power_w,
        )
    }

    pub fn policy_params(&self) -> PolicyParams {
        PolicyParams {
            per_core_power_budget: self.dvfs.fixed_power.per_core_power_budget,
            thermal_model: Some(Arc::new(self.thermal_model())),
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            grid: self.grid(),
            dvfs: self.dvfs_settings(),
            policy_params: self.policy_params(),
        }
    }

    /// Copy of this configuration running a different DVFS policy.
    pub fn with_policy(&self, policy: &str) -> Self {
        let mut config = self.clone();
        config.dvfs.policy = policy.to_string();
        config
    }
}
