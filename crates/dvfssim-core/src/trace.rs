//! Workload ingestion for DVFSSim.
//!
//! A workload is a JSONL file with one thread arrival per line:
//!
//! ```text
//! {"ts_ns": 0, "cycles": 2000000, "name": "blackscholes"}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Threads are returned
//! sorted by arrival time and numbered in file order.

use crate::thread::SimThread;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Failed to read workload file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse JSON at line {line}: {source}")]
    JsonParse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("Unsupported workload format: {0}")]
    UnsupportedFormat(String),
}

/// One line of a JSONL workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadRecord {
    /// Arrival timestamp in nanoseconds.
    pub ts_ns: u64,
    /// Work in clock cycles.
    pub cycles: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Load a workload from a file.
pub fn load_workload(path: &Path, format: &str) -> Result<Vec<SimThread>, TraceError> {
    match format {
        "jsonl" => load_jsonl(path),
        other => Err(TraceError::UnsupportedFormat(other.to_string())),
    }
}

pub fn load_jsonl(path: &Path) -> Result<Vec<SimThread>, TraceError> {
    let file = std::fs::File::open(path)?;
    parse_jsonl(BufReader::new(file))
}

/// Parse a JSONL workload from any reader.
pub fn parse_jsonl<R: Read>(reader: BufReader<R>) -> Result<Vec<SimThread>, TraceError> {
    let mut threads = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: WorkloadRecord =
            serde_json::from_str(trimmed).map_err(|e| TraceError::JsonParse {
                line: line_num + 1,
                source: e,
            })?;
        threads.push(SimThread {
            id: threads.len() as u64,
            arrival_time_ns: record.ts_ns,
            cycles: record.cycles,
            name: record.name,
        });
    }

    threads.sort_by_key(|t| t.arrival_time_ns);
    Ok(threads)
}

/// Write threads as a JSONL workload.
pub fn write_jsonl(threads: &[SimThread], path: &Path) -> Result<(), TraceError> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);

    for thread in threads {
        let record = WorkloadRecord {
            ts_ns: thread.arrival_time_ns,
            cycles: thread.cycles,
            name: thread.name.clone(),
        };
        serde_json::to_writer(&mut writer, &record)
            .map_err(|e| TraceError::JsonParse { line: 0, source: e })?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Parameters for a seeded synthetic workload.
#[derive(Debug, Clone)]
pub struct SyntheticWorkload {
    pub seed: u64,
    pub threads: u64,
    /// Mean gap between arrivals in nanoseconds (uniform in `[0, 2*mean]`).
    pub mean_interarrival_ns: u64,
    pub cycles_mean: f64,
    pub cycles_spread: f64,
}

impl SyntheticWorkload {
    pub fn generate(&self) -> Vec<SimThread> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut arrival_ns = 0u64;

        (0..self.threads)
            .map(|id| {
                if id > 0 {
                    arrival_ns += rng.gen_range(0..=self.mean_interarrival_ns * 2);
                }
                let cycles = (self.cycles_mean + rng.gen::<f64>() * self.cycles_spread * 2.0
                    - self.cycles_spread)
                    .max(1.0) as u64;
                SimThread {
                    id,
                    arrival_time_ns: arrival_ns,
                    cycles,
                    name: Some(format!("synthetic-{}", id)),
                }
            })
            .collect()
    }
}
