//! Scheduler contract and built-in thread-placement schedulers.
//!
//! The simulation engine programs against the [`Scheduler`] trait. Every
//! scheduler must place new threads (`thread_create`); yield and CPU affinity
//! are optional and unsupported by default. Schedulers that run DVFS own a
//! [`Dvfs`] engine through [`SchedulerBase`] and override
//! [`Scheduler::execute_dvfs_policy`], which the engine calls once per epoch.
//!
//! | Scheduler | Placement |
//! |-----------|-----------|
//! | [`FirstFreeScheduler`] | Lowest-index free core |
//! | [`RoundRobinScheduler`] | Next free core after the last one used, honouring affinity |
//!
//! Both fall back to the least-loaded core when every core is busy.

use crate::dvfs::{Dvfs, DvfsError, DvfsSettings};
use crate::frequency::FrequencyControl;
use crate::thread::ThreadId;
use dvfssim_policies::{CoreGrid, CoreId, PerformanceCounters, PolicyParams};
use log::debug;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Unknown scheduler: {0}")]
    UnknownScheduler(String),
    #[error(transparent)]
    Dvfs(#[from] DvfsError),
}

/// Set of cores a thread may run on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuSet {
    cores: Vec<bool>,
}

impl CpuSet {
    pub fn empty(num_cores: usize) -> Self {
        Self {
            cores: vec![false; num_cores],
        }
    }

    pub fn all(num_cores: usize) -> Self {
        Self {
            cores: vec![true; num_cores],
        }
    }

    pub fn from_cores(num_cores: usize, cores: &[CoreId]) -> Self {
        let mut set = Self::empty(num_cores);
        for &core in cores {
            set.insert(core);
        }
        set
    }

    pub fn insert(&mut self, core: CoreId) {
        self.cores[core] = true;
    }

    pub fn contains(&self, core: CoreId) -> bool {
        self.cores.get(core).copied().unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        !self.cores.iter().any(|&c| c)
    }

    /// Size of the set's universe, not the number of members.
    pub fn num_cores(&self) -> usize {
        self.cores.len()
    }
}

/// The scheduler trait.
pub trait Scheduler {
    /// Choose a core for a newly created thread.
    fn thread_create(&mut self, thread_id: ThreadId) -> CoreId;

    /// A thread finished and releases its core.
    fn thread_exit(&mut self, _thread_id: ThreadId) {}

    /// The thread offers up its core.
    fn thread_yield(&mut self, _thread_id: ThreadId) {}

    /// Restrict the cores `thread_id` may run on. Returns `false` when the
    /// scheduler does not support affinity or rejects the mask.
    fn thread_set_affinity(
        &mut self,
        _calling_thread: ThreadId,
        _thread_id: ThreadId,
        _mask: &CpuSet,
    ) -> bool {
        false
    }

    /// Affinity mask of `thread_id`; `None` when unsupported or unset.
    fn thread_get_affinity(&self, _thread_id: ThreadId) -> Option<CpuSet> {
        None
    }

    /// Called by the simulation once per DVFS epoch. No-op unless the
    /// scheduler runs DVFS.
    fn execute_dvfs_policy(
        &mut self,
        _hw: &mut dyn FrequencyControl,
        _counters: &mut dyn PerformanceCounters,
    ) {
    }

    /// The owned DVFS engine, if DVFS is enabled.
    fn dvfs(&self) -> Option<&Dvfs> {
        None
    }

    /// Epoch length in nanoseconds, if DVFS is enabled.
    fn dvfs_epoch(&self) -> Option<u64> {
        self.dvfs().map(Dvfs::epoch)
    }

    /// Human-readable name for reports.
    fn name(&self) -> &str;
}

/// Construction parameters shared by all schedulers.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub grid: CoreGrid,
    /// `None` disables DVFS.
    pub dvfs: Option<DvfsSettings>,
    pub policy_params: PolicyParams,
}

/// State and utilities common to all schedulers: core occupancy and the
/// optional DVFS engine.
#[derive(Debug)]
pub struct SchedulerBase {
    grid: CoreGrid,
    dvfs: Option<Dvfs>,
    core_threads: Vec<Vec<ThreadId>>,
    thread_core: HashMap<ThreadId, CoreId>,
}

impl SchedulerBase {
    pub fn new(settings: SchedulerSettings) -> Result<Self, DvfsError> {
        let dvfs = match settings.dvfs {
            Some(dvfs_settings) => Some(Dvfs::new(dvfs_settings, settings.policy_params)?),
            None => None,
        };
        Ok(Self {
            grid: settings.grid,
            dvfs,
            core_threads: vec![Vec::new(); settings.grid.num_cores()],
            thread_core: HashMap::new(),
        })
    }

    pub fn num_cores(&self) -> usize {
        self.grid.num_cores()
    }

    pub fn dvfs(&self) -> Option<&Dvfs> {
        self.dvfs.as_ref()
    }

    /// Lowest-index core without threads.
    pub fn find_first_free_core(&self) -> Option<CoreId> {
        self.core_threads.iter().position(|t| t.is_empty())
    }

    /// Core with the fewest threads among those accepted by `allowed`.
    pub fn least_loaded_core(&self, allowed: impl Fn(CoreId) -> bool) -> Option<CoreId> {
        (0..self.num_cores())
            .filter(|&core| allowed(core))
            .min_by_key(|&core| self.core_threads[core].len())
    }

    pub fn place(&mut self, thread_id: ThreadId, core: CoreId) {
        self.core_threads[core].push(thread_id);
        self.thread_core.insert(thread_id, core);
        debug!("thread {} placed on core {}", thread_id, core);
    }

    pub fn remove(&mut self, thread_id: ThreadId) -> Option<CoreId> {
        let core = self.thread_core.remove(&thread_id)?;
        self.core_threads[core].retain(|&t| t != thread_id);
        Some(core)
    }

    pub fn core_of(&self, thread_id: ThreadId) -> Option<CoreId> {
        self.thread_core.get(&thread_id).copied()
    }

    pub fn threads_on(&self, core: CoreId) -> &[ThreadId] {
        &self.core_threads[core]
    }

    /// Cores currently running at least one thread.
    pub fn active_cores(&self) -> Vec<bool> {
        self.core_threads.iter().map(|t| !t.is_empty()).collect()
    }

    /// Log the thread-to-core mapping as a grid.
    pub fn log_mapping(&self) {
        for row in 0..self.grid.rows {
            let cells: Vec<String> = (0..self.grid.columns)
                .map(|col| {
                    let core = row * self.grid.columns + col;
                    match self.core_threads[core].as_slice() {
                        [] => " . ".to_string(),
                        threads => format!("{:^3}", threads.len()),
                    }
                })
                .collect();
            debug!("mapping row {}: [{}]", row, cells.join("|"));
        }
    }

    /// Snapshot frequencies and activity and run one DVFS epoch.
    pub fn execute_dvfs(
        &mut self,
        hw: &mut dyn FrequencyControl,
        counters: &mut dyn PerformanceCounters,
    ) {
        let active = self.active_cores();
        if let Some(dvfs) = self.dvfs.as_mut() {
            let old_frequencies: Vec<_> = (0..active.len()).map(|core| hw.frequency(core)).collect();
            dvfs.execute_policy(&old_frequencies, &active, hw, counters);
        }
    }
}

/// Places each thread on the lowest-index free core.
#[derive(Debug)]
pub struct FirstFreeScheduler {
    base: SchedulerBase,
}

impl FirstFreeScheduler {
    pub fn new(settings: SchedulerSettings) -> Result<Self, DvfsError> {
        Ok(Self {
            base: SchedulerBase::new(settings)?,
        })
    }

    pub fn base(&self) -> &SchedulerBase {
        &self.base
    }
}

impl Scheduler for FirstFreeScheduler {
    fn thread_create(&mut self, thread_id: ThreadId) -> CoreId {
        let core = self
            .base
            .find_first_free_core()
            .or_else(|| self.base.least_loaded_core(|_| true))
            .unwrap_or(0);
        self.base.place(thread_id, core);
        self.base.log_mapping();
        core
    }

    fn thread_exit(&mut self, thread_id: ThreadId) {
        self.base.remove(thread_id);
    }

    fn execute_dvfs_policy(
        &mut self,
        hw: &mut dyn FrequencyControl,
        counters: &mut dyn PerformanceCounters,
    ) {
        self.base.execute_dvfs(hw, counters);
    }

    fn dvfs(&self) -> Option<&Dvfs> {
        self.base.dvfs()
    }

    fn name(&self) -> &str {
        "first_free"
    }
}

/// Rotates placements across cores.
///
/// Tracks the last-used core by index, so consecutive threads spread over the
/// chip instead of packing into the low cores. Affinity masks restrict the
/// cores considered when a thread is created; threads already placed are not
/// migrated.
#[derive(Debug)]
pub struct RoundRobinScheduler {
    base: SchedulerBase,
    last_core: Option<CoreId>,
    affinity: HashMap<ThreadId, CpuSet>,
}

impl RoundRobinScheduler {
    pub fn new(settings: SchedulerSettings) -> Result<Self, DvfsError> {
        Ok(Self {
            base: SchedulerBase::new(settings)?,
            last_core: None,
            affinity: HashMap::new(),
        })
    }

    pub fn base(&self) -> &SchedulerBase {
        &self.base
    }
}

impl Scheduler for RoundRobinScheduler {
    fn thread_create(&mut self, thread_id: ThreadId) -> CoreId {
        let num_cores = self.base.num_cores();
        let mask = self
            .affinity
            .get(&thread_id)
            .cloned()
            .unwrap_or_else(|| CpuSet::all(num_cores));

        let free: Vec<CoreId> = (0..num_cores)
            .filter(|&core| mask.contains(core) && self.base.threads_on(core).is_empty())
            .collect();

        // Next free core after the last one used, wrapping around.
        let chosen = match self.last_core {
            Some(last) => free
                .iter()
                .find(|&&core| core > last)
                .or_else(|| free.first())
                .copied(),
            None => free.first().copied(),
        };
        let core = chosen
            .or_else(|| self.base.least_loaded_core(|core| mask.contains(core)))
            .unwrap_or(0);

        self.last_core = Some(core);
        self.base.place(thread_id, core);
        core
    }

    fn thread_exit(&mut self, thread_id: ThreadId) {
        self.base.remove(thread_id);
        self.affinity.remove(&thread_id);
    }

    fn thread_set_affinity(
        &mut self,
        _calling_thread: ThreadId,
        thread_id: ThreadId,
        mask: &CpuSet,
    ) -> bool {
        if mask.is_empty() || mask.num_cores() != self.base.num_cores() {
            return false;
        }
        self.affinity.insert(thread_id, mask.clone());
        true
    }

    fn thread_get_affinity(&self, thread_id: ThreadId) -> Option<CpuSet> {
        self.affinity.get(&thread_id).cloned()
    }

    fn execute_dvfs_policy(
        &mut self,
        hw: &mut dyn FrequencyControl,
        counters: &mut dyn PerformanceCounters,
    ) {
        self.base.execute_dvfs(hw, counters);
    }

    fn dvfs(&self) -> Option<&Dvfs> {
        self.base.dvfs()
    }

    fn name(&self) -> &str {
        "round_robin"
    }
}

/// Create a scheduler by name.
pub fn scheduler_by_name(
    name: &str,
    settings: SchedulerSettings,
) -> Result<Box<dyn Scheduler>, SchedulerError> {
    match name {
        "first_free" => Ok(Box::new(FirstFreeScheduler::new(settings)?)),
        "round_robin" => Ok(Box::new(RoundRobinScheduler::new(settings)?)),
        other => Err(SchedulerError::UnknownScheduler(other.to_string())),
    }
}

/// List all available scheduler names.
pub fn available_schedulers() -> Vec<&'static str> {
    vec!["first_free", "round_robin"]
}
