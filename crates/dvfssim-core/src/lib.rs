//! DVFSSim: DVFS control loop and epoch-driven multicore simulator.
//!
//! This crate provides the DVFS engine ([`Dvfs`]), the scheduler contract it
//! is driven through, and a discrete-event simulation that models per-core
//! frequency, power and temperature. Frequency policies from
//! `dvfssim-policies` are plugged in to decide per-core target frequencies
//! every epoch.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐     ┌───────────┐     ┌──────────────┐
//! │ Workload │────▶│  Engine   │────▶│   Metrics    │
//! │  (JSONL) │     │ (Events)  │     │  Collection  │
//! └──────────┘     └─────┬─────┘     └──────────────┘
//!                        │ epoch
//!                ┌───────┴───────┐
//!                │   Scheduler   │
//!                └───────┬───────┘
//!                        │ execute_dvfs_policy
//!                ┌───────┴───────┐     ┌──────────────┐
//!                │     Dvfs      │────▶│    Policy    │
//!                │ (rate, bound, │◀────│  (targets)   │
//!                │  hysteresis)  │     └──────────────┘
//!                └───────┬───────┘
//!          ┌─────────────┼─────────────┐
//!          ▼             ▼             ▼
//!    ┌──────────┐  ┌──────────┐  ┌──────────┐
//!    │  Core 0  │  │  Core 1  │  │  Core N  │
//!    │ freq/pwr │  │ freq/pwr │  │ freq/pwr │
//!    └──────────┘  └──────────┘  └──────────┘
//! ```

pub mod clock;
pub mod config;
pub mod counters;
pub mod dvfs;
pub mod engine;
pub mod frequency;
pub mod metrics;
pub mod power;
pub mod scheduler;
pub mod thermal;
pub mod thread;
pub mod trace;

// Re-export key types for convenience.
pub use clock::SimClock;
pub use config::SimConfig;
pub use counters::CounterStore;
pub use dvfs::{Dvfs, DvfsError, DvfsSettings, DvfsStats, Transition, MAX_FREQUENCY_RAMP};
pub use engine::{SimEvent, SimulationEngine};
pub use frequency::{CoreFrequencies, FrequencyControl};
pub use metrics::{MetricsCollector, SimulationMetrics};
pub use power::PowerModel;
pub use scheduler::{
    scheduler_by_name, CpuSet, FirstFreeScheduler, RoundRobinScheduler, Scheduler,
    SchedulerBase, SchedulerError, SchedulerSettings,
};
pub use thermal::GridThermalModel;
pub use thread::{SimThread, ThreadId};
pub use trace::{load_workload, write_jsonl};

/// Run a complete simulation with the given config and workload.
pub fn run_simulation(
    config: &SimConfig,
    workload: Vec<SimThread>,
) -> Result<SimulationMetrics, SchedulerError> {
    let mut engine = SimulationEngine::new(config)?;
    engine.load_workload(workload);
    Ok(engine.run())
}

/// Run the same workload and config under each named DVFS policy.
pub fn compare_policies(
    config: &SimConfig,
    workload: &[SimThread],
    policy_names: &[&str],
) -> Result<Vec<SimulationMetrics>, SchedulerError> {
    policy_names
        .iter()
        .map(|name| run_simulation(&config.with_policy(name), workload.to_vec()))
        .collect()
}
