//! Metrics collection and aggregation for simulation runs.
//!
//! Tracks per-thread turnaround, per-epoch frequency samples, energy, peak
//! power and temperature, and the DVFS engine's decision counters.

use crate::dvfs::DvfsStats;
use crate::thread::ThreadId;
use dvfssim_policies::{CoreId, Frequency};
use log::warn;
use serde::{Deserialize, Serialize};

/// Per-thread completion record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMetric {
    pub thread_id: ThreadId,
    pub core: CoreId,
    pub arrival_time_ns: u64,
    pub completion_time_ns: u64,
    pub cycles: u64,
}

impl ThreadMetric {
    pub fn turnaround_ns(&self) -> u64 {
        self.completion_time_ns.saturating_sub(self.arrival_time_ns)
    }
}

/// Percentile values for a distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Percentiles {
    /// Compute percentiles from a slice of values.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                p50: 0.0,
                p90: 0.0,
                p99: 0.0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
            };
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;

        Self {
            p50: percentile_sorted(&sorted, 50.0),
            p90: percentile_sorted(&sorted, 90.0),
            p99: percentile_sorted(&sorted, 99.0),
            min: sorted[0],
            max: sorted[n - 1],
            mean,
        }
    }
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Aggregated metrics for an entire simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationMetrics {
    /// DVFS policy name, or "none" with DVFS disabled.
    pub policy: String,
    pub scheduler: String,
    /// Simulated time in ms.
    pub duration_ms: f64,
    pub total_threads: u64,
    pub completed_threads: u64,
    /// Threads still running (or not yet arrived) when the run stopped.
    pub unfinished_threads: u64,

    // DVFS
    pub dvfs: DvfsStats,
    pub total_transitions: u64,
    pub per_core_transitions: Vec<u64>,
    pub frequency_mhz: Percentiles,
    pub per_core_mean_frequency: Vec<f64>,

    // Performance
    pub turnaround_ms: Percentiles,
    pub threads_per_sec: f64,

    // Energy and thermals
    pub energy_j: f64,
    pub energy_per_thread_j: f64,
    pub avg_power_w: f64,
    pub peak_power_w: f64,
    pub peak_temperature_c: f64,
}

/// Collector that accumulates samples during simulation.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    records: Vec<ThreadMetric>,
    /// Every per-core frequency sampled at epoch boundaries.
    frequency_samples: Vec<f64>,
    per_core_frequency_sum: Vec<f64>,
    epoch_samples: u64,
    energy_j: f64,
    peak_power_w: f64,
    peak_temperature_c: f64,
}

impl MetricsCollector {
    pub fn new(num_cores: usize, ambient_c: f64) -> Self {
        Self {
            records: Vec::new(),
            frequency_samples: Vec::new(),
            per_core_frequency_sum: vec![0.0; num_cores],
            epoch_samples: 0,
            energy_j: 0.0,
            peak_power_w: 0.0,
            peak_temperature_c: ambient_c,
        }
    }

    /// Record a completed thread.
    pub fn record(&mut self, metric: ThreadMetric) {
        self.records.push(metric);
    }

    /// Accumulate energy for `delta_ns` at constant `total_power_w`.
    pub fn add_energy(&mut self, total_power_w: f64, delta_ns: u64) {
        self.energy_j += total_power_w * delta_ns as f64 * 1e-9;
    }

    /// Track the instantaneous chip power and temperatures.
    pub fn observe_power(&mut self, total_power_w: f64, temperatures: &[f64]) {
        self.peak_power_w = self.peak_power_w.max(total_power_w);
        self.peak_temperature_c = temperatures
            .iter()
            .copied()
            .fold(self.peak_temperature_c, f64::max);
    }

    /// Sample the frequencies in effect at an epoch boundary.
    pub fn sample_frequencies(&mut self, frequencies: &[Frequency]) {
        for (sum, &f) in self.per_core_frequency_sum.iter_mut().zip(frequencies) {
            *sum += f as f64;
            self.frequency_samples.push(f as f64);
        }
        self.epoch_samples += 1;
    }

    pub fn completed_count(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn records(&self) -> &[ThreadMetric] {
        &self.records
    }

    pub fn energy_j(&self) -> f64 {
        self.energy_j
    }

    /// Aggregate all samples into a summary.
    pub fn aggregate(&self, run: RunSummary<'_>) -> SimulationMetrics {
        let completed = self.completed_count();
        if run.total_threads > 0 && completed == 0 {
            warn!(
                "no thread completed out of {}; turnaround metrics will be zero",
                run.total_threads
            );
        }
        if self.epoch_samples == 0 {
            warn!("simulation ended before the first epoch; no frequency samples");
        }

        let turnaround: Vec<f64> = self
            .records
            .iter()
            .map(|r| r.turnaround_ns() as f64 / 1e6)
            .collect();

        let duration_s = run.duration_ns as f64 * 1e-9;
        let per_core_mean_frequency = self
            .per_core_frequency_sum
            .iter()
            .map(|&sum| {
                if self.epoch_samples > 0 {
                    sum / self.epoch_samples as f64
                } else {
                    0.0
                }
            })
            .collect();

        SimulationMetrics {
            policy: run.policy.to_string(),
            scheduler: run.scheduler.to_string(),
            duration_ms: run.duration_ns as f64 / 1e6,
            total_threads: run.total_threads,
            completed_threads: completed,
            unfinished_threads: run.total_threads.saturating_sub(completed),
            dvfs: run.dvfs.cloned().unwrap_or_default(),
            total_transitions: run.per_core_transitions.iter().sum(),
            per_core_transitions: run.per_core_transitions.to_vec(),
            frequency_mhz: Percentiles::from_values(&self.frequency_samples),
            per_core_mean_frequency,
            turnaround_ms: Percentiles::from_values(&turnaround),
            threads_per_sec: if duration_s > 0.0 {
                completed as f64 / duration_s
            } else {
                0.0
            },
            energy_j: self.energy_j,
            energy_per_thread_j: if completed > 0 {
                self.energy_j / completed as f64
            } else {
                0.0
            },
            avg_power_w: if duration_s > 0.0 {
                self.energy_j / duration_s
            } else {
                0.0
            },
            peak_power_w: self.peak_power_w,
            peak_temperature_c: self.peak_temperature_c,
        }
    }
}

/// Run-level facts the collector does not observe itself.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary<'a> {
    pub policy: &'a str,
    pub scheduler: &'a str,
    pub duration_ns: u64,
    pub total_threads: u64,
    pub dvfs: Option<&'a DvfsStats>,
    pub per_core_transitions: &'a [u64],
}

/// Format metrics as a pretty-printed table string.
pub fn format_table(metrics: &SimulationMetrics) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{:=<70}\n",
        format!("  {} / {} Results  ", metrics.policy, metrics.scheduler)
    ));
    out.push_str(&format!(
        "  Duration: {:.3}ms | Threads: {} ({} unfinished)\n",
        metrics.duration_ms, metrics.total_threads, metrics.unfinished_threads
    ));
    out.push_str(&format!("{:-<70}\n", "  DVFS  "));
    out.push_str(&format!(
        "  Epochs: {}  Applied: {}  Delayed: {}  Unchanged: {}\n",
        metrics.dvfs.epochs, metrics.dvfs.applied, metrics.dvfs.delayed, metrics.dvfs.unchanged
    ));
    out.push_str(&format!(
        "  Rate-limited: {}  Clamped: {}  Transitions: {}\n",
        metrics.dvfs.rate_limited, metrics.dvfs.bound_clamped, metrics.total_transitions
    ));
    out.push_str(&format!(
        "  Freq (MHz)      P50={:>8.0}  P90={:>8.0}  Mean={:>8.0}\n",
        metrics.frequency_mhz.p50, metrics.frequency_mhz.p90, metrics.frequency_mhz.mean
    ));
    out.push_str(&format!("{:-<70}\n", "  Performance  "));
    out.push_str(&format!(
        "  Turnaround (ms) P50={:>8.3}  P90={:>8.3}  P99={:>8.3}\n",
        metrics.turnaround_ms.p50, metrics.turnaround_ms.p90, metrics.turnaround_ms.p99
    ));
    out.push_str(&format!(
        "  Threads/sec: {:.1}\n",
        metrics.threads_per_sec
    ));
    out.push_str(&format!("{:-<70}\n", "  Energy  "));
    out.push_str(&format!(
        "  Energy: {:.4}J ({:.4}J/thread)  Avg power: {:.2}W  Peak: {:.2}W\n",
        metrics.energy_j, metrics.energy_per_thread_j, metrics.avg_power_w, metrics.peak_power_w
    ));
    out.push_str(&format!(
        "  Peak temperature: {:.1}°C\n",
        metrics.peak_temperature_c
    ));
    out.push_str(&format!("{:=<70}\n", ""));
    out
}

/// Format a comparison table of multiple policy results.
pub fn format_comparison_table(results: &[SimulationMetrics]) -> String {
    if results.is_empty() {
        return String::from("No results to compare.\n");
    }

    let mut out = String::new();
    out.push_str(&format!("\n{:=<90}\n", "  Policy Comparison  "));
    out.push_str(&format!(
        "{:<18} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}\n",
        "Policy", "Freq p50", "TA p50", "TA p99", "Energy J", "Peak W", "Peak °C", "Delayed"
    ));
    out.push_str(&format!("{:-<90}\n", ""));

    for m in results {
        out.push_str(&format!(
            "{:<18} {:>9.0} {:>9.3} {:>9.3} {:>9.4} {:>9.2} {:>9.1} {:>9}\n",
            m.policy,
            m.frequency_mhz.p50,
            m.turnaround_ms.p50,
            m.turnaround_ms.p99,
            m.energy_j,
            m.peak_power_w,
            m.peak_temperature_c,
            m.dvfs.delayed,
        ));
    }
    out.push_str(&format!("{:=<90}\n", ""));
    out
}
