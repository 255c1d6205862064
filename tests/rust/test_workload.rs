/// Integration tests for workload ingestion and the bundled configuration.
use dvfssim_core::config::SimConfig;
use dvfssim_core::trace::{self, SyntheticWorkload, TraceError};
use dvfssim_core::SimThread;
use std::path::PathBuf;

fn repo_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(relative)
}

#[test]
fn test_load_example_workload() {
    let path = repo_path("workloads/example.jsonl");
    if !path.exists() {
        return;
    }
    let threads = trace::load_workload(&path, "jsonl").unwrap();
    assert!(!threads.is_empty());

    for i in 1..threads.len() {
        assert!(threads[i].arrival_time_ns >= threads[i - 1].arrival_time_ns);
    }
}

#[test]
fn test_default_config_runs_example_workload() {
    let config_path = repo_path("configs/default.toml");
    let workload_path = repo_path("workloads/example.jsonl");
    if !config_path.exists() || !workload_path.exists() {
        return;
    }
    let config = SimConfig::from_file(&config_path).unwrap();
    let threads = trace::load_workload(&workload_path, &config.workload.format).unwrap();
    let total = threads.len() as u64;

    let metrics = dvfssim_core::run_simulation(&config, threads).unwrap();
    assert_eq!(metrics.policy, "tsp");
    assert_eq!(metrics.scheduler, "round_robin");
    assert_eq!(metrics.completed_threads, total);
}

#[test]
fn test_write_and_read_workload() {
    let tmp_path = std::env::temp_dir().join("dvfssim_test_workload.jsonl");

    let threads = vec![
        SimThread {
            id: 0,
            arrival_time_ns: 0,
            cycles: 1_000_000,
            name: Some("blackscholes".to_string()),
        },
        SimThread {
            id: 1,
            arrival_time_ns: 250_000,
            cycles: 3_000_000,
            name: None,
        },
    ];

    trace::write_jsonl(&threads, &tmp_path).unwrap();
    let loaded = trace::load_workload(&tmp_path, "jsonl").unwrap();
    assert_eq!(loaded, threads);

    let _ = std::fs::remove_file(&tmp_path);
}

#[test]
fn test_generated_workload_round_trips_through_file() {
    let tmp_path = std::env::temp_dir().join("dvfssim_test_synthetic.jsonl");
    let generated = SyntheticWorkload {
        seed: 11,
        threads: 50,
        mean_interarrival_ns: 100_000,
        cycles_mean: 2e6,
        cycles_spread: 1e6,
    }
    .generate();

    trace::write_jsonl(&generated, &tmp_path).unwrap();
    let loaded = trace::load_workload(&tmp_path, "jsonl").unwrap();
    assert_eq!(loaded.len(), 50);
    assert_eq!(loaded.iter().map(|t| t.cycles).sum::<u64>(), generated.iter().map(|t| t.cycles).sum::<u64>());

    let _ = std::fs::remove_file(&tmp_path);
}

#[test]
fn test_missing_file() {
    let err = trace::load_workload(&repo_path("workloads/does-not-exist.jsonl"), "jsonl")
        .unwrap_err();
    assert!(matches!(err, TraceError::Io(_)));
}
