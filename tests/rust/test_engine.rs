/// Integration tests for the simulation engine.
use dvfssim_core::config::SimConfig;
use dvfssim_core::trace::SyntheticWorkload;
use dvfssim_core::{
    CpuSet, FrequencyControl, RoundRobinScheduler, Scheduler, SchedulerError, SimThread,
    SimulationEngine,
};

fn production_config(policy: &str, scheduler: &str) -> SimConfig {
    SimConfig::from_str(&format!(
        r#"
[simulation]
name = "integration-test"
seed = 42

[cores]
rows = 4
columns = 4
initial_frequency = 2000

[dvfs]
enabled = true
policy = "{}"
min_frequency = 1000
max_frequency = 4000
frequency_step_size = 100
epoch_ns = 1000000
max_patience = 2

[dvfs.fixed_power]
per_core_power_budget = 3.0

[power]
static_power_w = 0.5
dynamic_power_w = 4.5

[thermal]
ambient_c = 45
dtm_threshold_c = 80
self_resistance = 5.0
neighbor_resistance = 1.0

[scheduler]
type = "{}"
"#,
        policy, scheduler
    ))
    .unwrap()
}

fn mixed_workload(n: u64) -> Vec<SimThread> {
    SyntheticWorkload {
        seed: 42,
        threads: n,
        mean_interarrival_ns: 300_000,
        cycles_mean: 6e6,
        cycles_spread: 3e6,
    }
    .generate()
}

#[test]
fn test_full_simulation_every_policy() {
    let _ = env_logger::builder().is_test(true).try_init();
    let workload = mixed_workload(60);

    for policy in dvfssim_policies::available_policies() {
        let config = production_config(policy, "first_free");
        let metrics = dvfssim_core::run_simulation(&config, workload.clone()).unwrap();
        assert_eq!(metrics.policy, policy);
        assert_eq!(metrics.completed_threads, 60, "policy {}", policy);
        assert_eq!(metrics.unfinished_threads, 0);
        assert!(metrics.dvfs.epochs > 0);
        assert!(metrics.energy_j > 0.0);
        assert!(metrics.frequency_mhz.min >= 1000.0);
        assert!(metrics.frequency_mhz.max <= 4000.0);
    }
}

#[test]
fn test_max_freq_is_fastest() {
    let workload = mixed_workload(40);
    let results = dvfssim_core::compare_policies(
        &production_config("maxFreq", "first_free"),
        &workload,
        &["maxFreq", "fixedPower"],
    )
    .unwrap();

    assert_eq!(results.len(), 2);
    let (max_freq, fixed) = (&results[0], &results[1]);
    assert!(max_freq.turnaround_ms.mean <= fixed.turnaround_ms.mean);
    assert!(max_freq.peak_power_w >= fixed.peak_power_w);
}

#[test]
fn test_tsp_parks_idle_cores() {
    let workload = mixed_workload(80);
    let config = production_config("tsp", "round_robin");
    let max_freq = dvfssim_core::run_simulation(&config.with_policy("maxFreq"), workload.clone())
        .unwrap();
    let tsp = dvfssim_core::run_simulation(&config, workload).unwrap();
    // Idle cores are parked at the minimum under TSP.
    assert!(tsp.frequency_mhz.mean < max_freq.frequency_mhz.mean);
    assert_eq!(tsp.completed_threads, 80);
}

#[test]
fn test_deterministic_runs() {
    let workload = mixed_workload(30);
    let config = production_config("tsp", "round_robin");
    let a = dvfssim_core::run_simulation(&config, workload.clone()).unwrap();
    let b = dvfssim_core::run_simulation(&config, workload).unwrap();
    assert_eq!(a.dvfs, b.dvfs);
    assert_eq!(a.per_core_transitions, b.per_core_transitions);
    assert_eq!(a.energy_j, b.energy_j);
}

#[test]
fn test_dvfs_disabled_keeps_initial_frequency() {
    let mut config = production_config("maxFreq", "first_free");
    config.dvfs.enabled = false;
    let mut engine = SimulationEngine::new(&config).unwrap();
    engine.load_workload(mixed_workload(10));
    let metrics = engine.run();

    assert_eq!(metrics.policy, "none");
    assert_eq!(metrics.completed_threads, 10);
    assert_eq!(metrics.total_transitions, 0);
    assert!(engine.frequencies.snapshot().iter().all(|&f| f == 2000));
    assert_eq!(engine.counters.reports(), 0);
}

#[test]
fn test_unknown_policy_is_fatal() {
    let config = production_config("bogus", "first_free");
    assert!(matches!(
        dvfssim_core::run_simulation(&config, mixed_workload(1)),
        Err(SchedulerError::Dvfs(_))
    ));
}

#[test]
fn test_custom_scheduler_with_affinity() {
    let config = production_config("maxFreq", "round_robin");
    let mut scheduler = RoundRobinScheduler::new(config.scheduler_settings()).unwrap();
    for id in 0..4 {
        assert!(scheduler.thread_set_affinity(0, id, &CpuSet::from_cores(16, &[15])));
    }

    let mut engine = SimulationEngine::with_scheduler(&config, Box::new(scheduler));
    engine.load_workload(mixed_workload(4));
    let metrics = engine.run();

    assert_eq!(metrics.completed_threads, 4);
    assert!(engine.metrics.records().iter().all(|r| r.core == 15));
}
