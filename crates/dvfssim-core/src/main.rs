//! DVFSSim CLI: evaluate DVFS policies on simulated multicore workloads.

use clap::{Parser, Subcommand};
use dvfssim_core::config::SimConfig;
use dvfssim_core::metrics::{self, SimulationMetrics};
use dvfssim_core::scheduler::available_schedulers;
use dvfssim_core::thread::SimThread;
use dvfssim_core::trace::{self, SyntheticWorkload};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "dvfssim",
    about = "Evaluate DVFS policies on simulated multicore workloads",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation with a single policy.
    Run {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Path to workload file (overrides workload.path).
        #[arg(short, long)]
        workload: Option<PathBuf>,
        /// DVFS policy name (overrides dvfs.policy).
        #[arg(short, long)]
        policy: Option<String>,
        /// Output results to JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare multiple policies on the same workload.
    Compare {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Path to workload file (overrides workload.path).
        #[arg(short, long)]
        workload: Option<PathBuf>,
        /// Comma-separated list of policy names (default: all).
        #[arg(short = 'P', long, value_delimiter = ',')]
        policies: Vec<String>,
        /// Output results to JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate a synthetic workload.
    GenWorkload {
        /// Number of threads.
        #[arg(long, default_value = "64")]
        threads: u64,
        /// Mean time between arrivals in microseconds.
        #[arg(long, default_value = "250")]
        interarrival_us: u64,
        /// Mean work per thread in cycles.
        #[arg(long, default_value = "5000000")]
        cycles_mean: f64,
        /// Half-width of the uniform spread around the mean, in cycles.
        #[arg(long, default_value = "2000000")]
        cycles_spread: f64,
        /// Random seed.
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Output file path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List available policies and schedulers.
    ListPolicies,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            workload,
            policy,
            output,
        } => {
            let mut sim_config = load_config(&config);
            if let Some(policy) = policy {
                sim_config = sim_config.with_policy(&policy);
            }

            let threads = load_threads(&sim_config, workload.as_deref());
            let result = dvfssim_core::run_simulation(&sim_config, threads).unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            });
            println!("{}", metrics::format_table(&result));

            if let Some(output_path) = output {
                write_json(&result, &output_path);
            }
        }
        Commands::Compare {
            config,
            workload,
            policies,
            output,
        } => {
            let sim_config = load_config(&config);
            let threads = load_threads(&sim_config, workload.as_deref());
            let policy_names: Vec<&str> = if policies.is_empty() {
                dvfssim_policies::available_policies()
            } else {
                policies.iter().map(|s| s.as_str()).collect()
            };

            let results: Vec<SimulationMetrics> =
                dvfssim_core::compare_policies(&sim_config, &threads, &policy_names)
                    .unwrap_or_else(|e| {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    });
            println!("{}", metrics::format_comparison_table(&results));

            for result in &results {
                println!("{}", metrics::format_table(result));
            }

            if let Some(output_path) = output {
                write_json(&results, &output_path);
            }
        }
        Commands::GenWorkload {
            threads,
            interarrival_us,
            cycles_mean,
            cycles_spread,
            seed,
            output,
        } => {
            let generator = SyntheticWorkload {
                seed,
                threads,
                mean_interarrival_ns: interarrival_us * 1000,
                cycles_mean,
                cycles_spread,
            };
            let workload = generator.generate();
            trace::write_jsonl(&workload, &output).unwrap_or_else(|e| {
                eprintln!("Error writing workload: {}", e);
                std::process::exit(1);
            });
            println!(
                "Generated {} threads to {}",
                workload.len(),
                output.display()
            );
        }
        Commands::ListPolicies => {
            println!("Available DVFS policies:");
            for name in dvfssim_policies::available_policies() {
                println!("  - {}", name);
            }
            println!("Available schedulers:");
            for name in available_schedulers() {
                println!("  - {}", name);
            }
        }
    }
}

fn load_config(path: &Path) -> SimConfig {
    SimConfig::from_file(path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    })
}

fn load_threads(config: &SimConfig, workload_path: Option<&Path>) -> Vec<SimThread> {
    let path = workload_path
        .map(PathBuf::from)
        .or_else(|| config.workload.path.as_ref().map(PathBuf::from));

    match path {
        Some(p) => trace::load_workload(&p, &config.workload.format).unwrap_or_else(|e| {
            eprintln!("Error loading workload: {}", e);
            std::process::exit(1);
        }),
        None => {
            eprintln!("No workload file specified. Use --workload or set workload.path in config.");
            std::process::exit(1);
        }
    }
}

fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing results: {}", e);
        std::process::exit(1);
    });
    std::fs::write(path, json).unwrap_or_else(|e| {
        eprintln!("Error writing output: {}", e);
        std::process::exit(1);
    });
    println!("Results written to {}", path.display());
}
