/// Integration tests for the built-in frequency policies against the
/// simulator's counter store and thermal model.
use dvfssim_core::config::SimConfig;
use dvfssim_core::{CounterStore, GridThermalModel};
use dvfssim_policies::*;
use std::sync::Arc;

fn range() -> FrequencyRange {
    FrequencyRange::new(1000, 4000, 100)
}

fn busy_counters(grid: CoreGrid, power: f64) -> CounterStore {
    let mut counters = CounterStore::new(grid.num_cores(), 45.0);
    for core in 0..grid.num_cores() {
        counters.update_core(core, power, 1.0);
    }
    counters
}

#[test]
fn test_all_policies_constructible_by_name() {
    let config = SimConfig::from_str(
        r#"
[cores]
rows = 2
columns = 2
[dvfs.fixed_power]
per_core_power_budget = 2.5
"#,
    )
    .unwrap();

    for name in available_policies() {
        let policy = policy_by_name(name, config.grid(), range(), config.policy_params()).unwrap();
        assert_eq!(policy.name(), name);
    }
}

#[test]
fn test_unknown_policy_name() {
    let err = policy_by_name("bogus", CoreGrid::new(1, 1), range(), PolicyParams::default())
        .err()
        .unwrap();
    assert!(err.to_string().contains("bogus"));
}

#[test]
fn test_every_policy_returns_one_target_per_core() {
    let grid = CoreGrid::new(3, 3);
    let thermal = GridThermalModel::new(grid, 45.0, 80.0, 5.0, 1.0, 0.5);
    let params = PolicyParams {
        per_core_power_budget: Some(3.0),
        thermal_model: Some(Arc::new(thermal)),
    };
    let counters = busy_counters(grid, 4.0);
    let old = vec![3000; grid.num_cores()];
    let active: Vec<bool> = (0..grid.num_cores()).map(|c| c % 2 == 0).collect();

    for name in available_policies() {
        let mut policy = policy_by_name(name, grid, range(), params.clone()).unwrap();
        let targets = policy.get_frequencies(&old, &active, &counters);
        assert_eq!(targets.len(), grid.num_cores(), "policy {}", name);
        assert!(
            targets.iter().all(|&f| (1000..=4000).contains(&f)),
            "policy {} out of range: {:?}",
            name,
            targets
        );
    }
}

#[test]
fn test_fixed_power_scales_with_measured_power() {
    let grid = CoreGrid::new(1, 2);
    let mut policy = FixedPower::new(grid, range(), 3.0);
    let mut counters = CounterStore::new(2, 45.0);
    // Core 0 draws 4 W at 2000 MHz: 3 W fits at 1500 MHz.
    counters.update_core(0, 4.0, 1.0);
    counters.update_core(1, 0.5, 0.0);

    let targets = policy.get_frequencies(&[2000, 2000], &[true, false], &counters);
    assert_eq!(targets, vec![1500, 1000]);
}

#[test]
fn test_tsp_budget_tightens_with_more_active_cores() {
    let grid = CoreGrid::new(2, 2);
    let thermal = Arc::new(GridThermalModel::new(grid, 45.0, 80.0, 5.0, 1.0, 0.0));
    let mut policy = ThermalSafePower::new(grid, range(), thermal);
    let counters = busy_counters(grid, 7.0);
    let old = vec![4000; 4];

    // One active core: budget 7 W, current power 7 W -> stays at max.
    let one = policy.get_frequencies(&old, &[true, false, false, false], &counters);
    assert_eq!(one[0], 4000);
    let single_budget = policy.last_budget().unwrap();

    // All active: budget 35 / 7 = 5 W -> 4000 * 5 / 7 = 2857 -> 2800.
    let all = policy.get_frequencies(&old, &[true; 4], &counters);
    assert_eq!(all, vec![2800; 4]);
    assert!(policy.last_budget().unwrap() < single_budget);
}

#[test]
fn test_test_static_power_follows_activity() {
    let grid = CoreGrid::new(1, 3);
    let mut policy = TestStaticPower::new(grid, 1000, 4000);
    let counters = busy_counters(grid, 1.0);
    let targets = policy.get_frequencies(&[2000; 3], &[true, false, true], &counters);
    assert_eq!(targets, vec![4000, 1000, 4000]);
}
