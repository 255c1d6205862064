/// Integration tests for the DVFS control loop: rate limit, bounds,
/// hysteresis and reporting.
use dvfssim_core::dvfs::Direction;
use dvfssim_core::{
    CoreFrequencies, CounterStore, Dvfs, DvfsError, DvfsSettings, FrequencyControl, Transition,
    MAX_FREQUENCY_RAMP,
};
use dvfssim_policies::{
    CoreGrid, Frequency, FrequencyPolicy, PerformanceCounters, PolicyError, PolicyParams,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn settings(rows: usize, columns: usize, min: Frequency, max: Frequency, step: Frequency, patience: u32) -> DvfsSettings {
    DvfsSettings {
        core_rows: rows,
        core_columns: columns,
        min_frequency: min,
        max_frequency: max,
        frequency_step_size: step,
        dvfs_epoch: 1_000_000,
        max_dvfs_patience: patience,
        policy: "maxFreq".to_string(),
    }
}

/// Replays a fixed list of per-epoch targets, repeating the last one.
struct Scripted {
    script: Vec<Vec<Frequency>>,
    epoch: usize,
}

impl Scripted {
    fn boxed(script: Vec<Vec<Frequency>>) -> Box<dyn FrequencyPolicy> {
        Box::new(Self { script, epoch: 0 })
    }
}

impl FrequencyPolicy for Scripted {
    fn get_frequencies(
        &mut self,
        _old: &[Frequency],
        _active: &[bool],
        _counters: &dyn PerformanceCounters,
    ) -> Vec<Frequency> {
        let idx = self.epoch.min(self.script.len() - 1);
        self.epoch += 1;
        self.script[idx].clone()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn run_epoch(dvfs: &mut Dvfs, hw: &mut CoreFrequencies, counters: &mut CounterStore) {
    let old = hw.snapshot();
    let active = vec![true; old.len()];
    dvfs.execute_policy(&old, &active, hw, counters);
}

#[test]
fn test_scenario_a_single_step_down_is_delayed_twice() {
    init_logging();
    let mut dvfs =
        Dvfs::with_policy(settings(1, 1, 1000, 3000, 200, 2), Scripted::boxed(vec![vec![1800]]))
            .unwrap();
    let mut hw = CoreFrequencies::new(1, 2000);
    let mut counters = CounterStore::new(1, 45.0);

    run_epoch(&mut dvfs, &mut hw, &mut counters);
    assert_eq!(hw.frequency(0), 2000);
    assert_eq!(dvfs.downscaling_patience(0), 1);

    run_epoch(&mut dvfs, &mut hw, &mut counters);
    assert_eq!(hw.frequency(0), 2000);
    assert_eq!(dvfs.downscaling_patience(0), 0);

    run_epoch(&mut dvfs, &mut hw, &mut counters);
    assert_eq!(hw.frequency(0), 1800);
    assert_eq!(dvfs.downscaling_patience(0), 2);
    assert_eq!(dvfs.upscaling_patience(0), 2);
    assert_eq!(hw.transitions(0), 1);
    assert_eq!(dvfs.stats().delayed, 2);
    assert_eq!(dvfs.stats().applied, 1);
}

#[test]
fn test_scenario_b_multi_step_applies_immediately() {
    let mut dvfs =
        Dvfs::with_policy(settings(1, 1, 1000, 3000, 200, 5), Scripted::boxed(vec![vec![2600]]))
            .unwrap();
    let mut hw = CoreFrequencies::new(1, 2000);

    let t = dvfs.set_frequency(0, 2600, &mut hw);
    assert_eq!(t, Transition::Applied { from: 2000, to: 2600 });
    assert_eq!(dvfs.upscaling_patience(0), 5);
    assert_eq!(dvfs.stats().rate_limited, 0);
}

#[test]
fn test_scenario_c_clamped_to_current_is_noop() {
    let mut dvfs =
        Dvfs::with_policy(settings(1, 1, 1000, 3000, 200, 2), Scripted::boxed(vec![vec![800]]))
            .unwrap();
    let mut hw = CoreFrequencies::new(1, 1200);

    // Burn one unit of downscale patience first.
    assert!(matches!(
        dvfs.set_frequency(0, 1000, &mut hw),
        Transition::Delayed { direction: Direction::Down, .. }
    ));
    let mut hw = CoreFrequencies::new(1, 1000);
    assert_eq!(dvfs.set_frequency(0, 800, &mut hw), Transition::Unchanged);
    assert_eq!(dvfs.downscaling_patience(0), 2);
    assert_eq!(hw.transitions(0), 0);
}

#[test]
fn test_scenario_d_unknown_policy() {
    let mut s = settings(2, 2, 1000, 3000, 100, 1);
    s.policy = "bogus".to_string();
    match Dvfs::new(s, PolicyParams::default()) {
        Err(DvfsError::Policy(PolicyError::UnknownPolicy(name))) => assert_eq!(name, "bogus"),
        other => panic!("expected unknown policy error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_policy_parameter() {
    let mut s = settings(2, 2, 1000, 3000, 100, 1);
    s.policy = "fixedPower".to_string();
    assert!(matches!(
        Dvfs::new(s, PolicyParams::default()),
        Err(DvfsError::Policy(PolicyError::MissingParameter { .. }))
    ));
}

#[test]
fn test_hysteresis_liveness() {
    for patience in 0..5u32 {
        let mut dvfs = Dvfs::with_policy(
            settings(1, 1, 1000, 3000, 100, patience),
            Scripted::boxed(vec![vec![2100]]),
        )
        .unwrap();
        let mut hw = CoreFrequencies::new(1, 2000);
        let mut counters = CounterStore::new(1, 45.0);

        let mut epochs = 0;
        while hw.frequency(0) == 2000 {
            run_epoch(&mut dvfs, &mut hw, &mut counters);
            epochs += 1;
            assert!(epochs <= patience + 1, "stuck after {} epochs", epochs);
        }
        assert_eq!(epochs, patience + 1);
        assert_eq!(hw.frequency(0), 2100);
    }
}

#[test]
fn test_noop_resets_patience() {
    let mut dvfs =
        Dvfs::with_policy(settings(1, 1, 1000, 3000, 100, 3), Scripted::boxed(vec![vec![2000]]))
            .unwrap();
    let mut hw = CoreFrequencies::new(1, 2000);

    dvfs.set_frequency(0, 1900, &mut hw);
    dvfs.set_frequency(0, 2100, &mut hw);
    assert_eq!(dvfs.downscaling_patience(0), 2);
    assert_eq!(dvfs.upscaling_patience(0), 2);

    assert_eq!(dvfs.set_frequency(0, 2000, &mut hw), Transition::Unchanged);
    assert_eq!(dvfs.downscaling_patience(0), 3);
    assert_eq!(dvfs.upscaling_patience(0), 3);
}

#[test]
fn test_directions_are_independent() {
    let mut dvfs =
        Dvfs::with_policy(settings(1, 1, 1000, 3000, 100, 2), Scripted::boxed(vec![vec![2000]]))
            .unwrap();
    let mut hw = CoreFrequencies::new(1, 2000);

    assert!(matches!(
        dvfs.set_frequency(0, 2100, &mut hw),
        Transition::Delayed { direction: Direction::Up, .. }
    ));
    assert_eq!(dvfs.upscaling_patience(0), 1);
    assert_eq!(dvfs.downscaling_patience(0), 2);
}

#[test]
fn test_rate_limit_both_directions() {
    let mut dvfs = Dvfs::with_policy(
        settings(1, 2, 500, 5000, 100, 0),
        Scripted::boxed(vec![vec![5000, 500]]),
    )
    .unwrap();
    let mut hw = CoreFrequencies::from_frequencies(vec![2000, 4000]);
    let mut counters = CounterStore::new(2, 45.0);

    run_epoch(&mut dvfs, &mut hw, &mut counters);
    assert_eq!(hw.snapshot(), vec![2000 + MAX_FREQUENCY_RAMP, 4000 - MAX_FREQUENCY_RAMP]);
    assert_eq!(dvfs.stats().rate_limited, 2);

    run_epoch(&mut dvfs, &mut hw, &mut counters);
    run_epoch(&mut dvfs, &mut hw, &mut counters);
    assert_eq!(hw.snapshot(), vec![5000, 1000]);
}

#[test]
fn test_reports_applied_frequencies() {
    let mut dvfs = Dvfs::with_policy(
        settings(1, 2, 1000, 3000, 100, 1),
        Scripted::boxed(vec![vec![2100, 2600]]),
    )
    .unwrap();
    let mut hw = CoreFrequencies::new(2, 2000);
    let mut counters = CounterStore::new(2, 45.0);

    run_epoch(&mut dvfs, &mut hw, &mut counters);
    // Core 0 single step delayed, core 1 applied.
    assert_eq!(counters.reported_frequencies(), Some(&[2000, 2600][..]));
    assert_eq!(counters.frequency_of_core(1), Some(2600));
    assert_eq!(dvfs.stats().epochs, 1);
}

#[test]
#[should_panic]
fn test_out_of_range_core_panics() {
    let mut dvfs =
        Dvfs::with_policy(settings(2, 2, 1000, 3000, 100, 1), Scripted::boxed(vec![vec![0; 4]]))
            .unwrap();
    let mut hw = CoreFrequencies::new(4, 2000);
    dvfs.set_frequency(4, 2000, &mut hw);
}

#[test]
fn test_invariants_hold_for_random_requests() {
    let grid = CoreGrid::new(2, 2);
    let (min, max, step, patience) = (800, 4200, 100, 3);
    let mut dvfs = Dvfs::with_policy(
        settings(grid.rows, grid.columns, min, max, step, patience),
        Scripted::boxed(vec![vec![0; 4]]),
    )
    .unwrap();
    let mut hw = CoreFrequencies::new(grid.num_cores(), 2000);
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for _ in 0..5_000 {
        let core = rng.gen_range(0..grid.num_cores());
        let before = hw.frequency(core);
        // Mix single steps with arbitrary jumps.
        let requested = match rng.gen_range(0..3) {
            0 => before + step,
            1 => before.saturating_sub(step),
            _ => rng.gen_range(0..6000),
        };
        dvfs.set_frequency(core, requested, &mut hw);
        let after = hw.frequency(core);

        assert!(after >= min && after <= max, "{} outside bounds", after);
        assert!(before.abs_diff(after) <= MAX_FREQUENCY_RAMP);
        assert!(dvfs.downscaling_patience(core) <= patience);
        assert!(dvfs.upscaling_patience(core) <= patience);
    }
}
