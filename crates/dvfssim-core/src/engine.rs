//! Discrete-event simulation engine.
//!
//! The engine maintains a priority queue of [`SimEvent`]s sorted by timestamp.
//! Each iteration pops the next event, advances the virtual clock (retiring
//! cycles and accumulating energy for the elapsed interval), processes the
//! event and collects metrics.
//!
//! Thread completion times depend on core frequency and on how many threads
//! share a core, so they are recomputed whenever either changes. Completion
//! events carry the schedule version they were computed under; events from an
//! older version are discarded without advancing the clock, as are epochs
//! after the last thread has finished.

use crate::clock::SimClock;
use crate::config::SimConfig;
use crate::counters::CounterStore;
use crate::frequency::{CoreFrequencies, FrequencyControl};
use crate::metrics::{MetricsCollector, RunSummary, SimulationMetrics, ThreadMetric};
use crate::power::PowerModel;
use crate::scheduler::{scheduler_by_name, Scheduler, SchedulerError};
use crate::thermal::GridThermalModel;
use crate::thread::{ActiveThread, SimThread, ThreadId};
use dvfssim_policies::ThermalModel;
use log::{debug, info};
use std::collections::{BinaryHeap, HashMap};

/// Events in the discrete-event simulation.
#[derive(Debug, Clone)]
pub enum SimEvent {
    /// A thread arrives and is handed to the scheduler.
    ThreadArrival(SimThread),
    /// A thread is expected to retire its last cycle.
    ThreadCompletion { thread_id: ThreadId, version: u64 },
    /// DVFS epoch boundary.
    Epoch,
}

/// A timestamped event for the priority queue.
#[derive(Debug, Clone)]
struct TimedEvent {
    time_ns: u64,
    sequence: u64,
    event: SimEvent,
}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time_ns == other.time_ns && self.sequence == other.sequence
    }
}

impl Eq for TimedEvent {}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; we want min-heap
        other
            .time_ns
            .cmp(&self.time_ns)
            .then(other.sequence.cmp(&self.sequence))
    }
}

/// The main simulation engine.
pub struct SimulationEngine {
    /// Virtual clock.
    pub clock: SimClock,
    event_queue: BinaryHeap<TimedEvent>,
    sequence: u64,
    /// Simulated per-core frequency state.
    pub frequencies: CoreFrequencies,
    /// Telemetry read by policies.
    pub counters: CounterStore,
    pub metrics: MetricsCollector,
    scheduler: Box<dyn Scheduler>,
    power_model: PowerModel,
    thermal_model: GridThermalModel,
    active_threads: HashMap<ThreadId, ActiveThread>,
    /// Bumped whenever completion times must be recomputed.
    schedule_version: u64,
    pending_arrivals: u64,
    total_threads: u64,
    epoch_ns: u64,
    max_time_ns: Option<u64>,
    /// Total events processed.
    pub events_processed: u64,
}

impl SimulationEngine {
    /// Create an engine with the scheduler named in the configuration.
    ///
    /// Fails when the scheduler or its DVFS policy cannot be constructed.
    pub fn new(config: &SimConfig) -> Result<Self, SchedulerError> {
        let scheduler = scheduler_by_name(
            &config.scheduler.scheduler_type,
            config.scheduler_settings(),
        )?;
        Ok(Self::with_scheduler(config, scheduler))
    }

    /// Create an engine around an already constructed scheduler.
    pub fn with_scheduler(config: &SimConfig, scheduler: Box<dyn Scheduler>) -> Self {
        let num_cores = config.grid().num_cores();
        let epoch_ns = scheduler.dvfs_epoch().unwrap_or(config.dvfs.epoch_ns);
        info!(
            "Simulation {}: {} cores, scheduler {}, epoch {} ns",
            config.simulation.name,
            num_cores,
            scheduler.name(),
            epoch_ns
        );

        let mut engine = Self {
            clock: SimClock::new(),
            event_queue: BinaryHeap::new(),
            sequence: 0,
            frequencies: CoreFrequencies::new(num_cores, config.initial_frequency()),
            counters: CounterStore::new(num_cores, config.thermal.ambient_c),
            metrics: MetricsCollector::new(num_cores, config.thermal.ambient_c),
            scheduler,
            power_model: config.power_model(),
            thermal_model: config.thermal_model(),
            active_threads: HashMap::new(),
            schedule_version: 0,
            pending_arrivals: 0,
            total_threads: 0,
            epoch_ns,
            max_time_ns: config.max_time_ns(),
            events_processed: 0,
        };
        engine.refresh_counters();
        engine
    }

    /// Schedule an event at a given time.
    pub fn schedule_event(&mut self, time_ns: u64, event: SimEvent) {
        self.event_queue.push(TimedEvent {
            time_ns,
            sequence: self.sequence,
            event,
        });
        self.sequence += 1;
    }

    /// Load a workload into the event queue.
    pub fn load_workload(&mut self, threads: Vec<SimThread>) {
        for thread in threads {
            let arrival = thread.arrival_time_ns;
            self.pending_arrivals += 1;
            self.total_threads += 1;
            self.schedule_event(arrival, SimEvent::ThreadArrival(thread));
        }
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    /// Run until every thread has completed or the time limit is reached.
    pub fn run(&mut self) -> SimulationMetrics {
        if self.has_work() {
            let first_epoch = self.clock.now_ns() + self.epoch_ns;
            self.schedule_event(first_epoch, SimEvent::Epoch);
        }

        while let Some(timed_event) = self.event_queue.pop() {
            if self.is_stale(&timed_event.event) {
                continue;
            }
            if let Some(limit) = self.max_time_ns {
                if timed_event.time_ns > limit {
                    self.advance_to(limit);
                    info!("time limit reached at {} ns", limit);
                    break;
                }
            }
            self.advance_to(timed_event.time_ns);
            self.process_event(timed_event.event);
            self.events_processed += 1;
        }

        let policy = self
            .scheduler
            .dvfs()
            .map(|dvfs| dvfs.policy_name().to_string())
            .unwrap_or_else(|| "none".to_string());
        self.metrics.aggregate(RunSummary {
            policy: &policy,
            scheduler: self.scheduler.name(),
            duration_ns: self.clock.now_ns(),
            total_threads: self.total_threads,
            dvfs: self.scheduler.dvfs().map(|dvfs| dvfs.stats()),
            per_core_transitions: self.frequencies.per_core_transitions(),
        })
    }

    fn has_work(&self) -> bool {
        self.pending_arrivals > 0 || !self.active_threads.is_empty()
    }

    /// Retire cycles and accumulate energy up to `time_ns`.
    fn advance_to(&mut self, time_ns: u64) {
        let delta = time_ns.saturating_sub(self.clock.now_ns());
        if delta > 0 {
            let sharers = self.threads_per_core();
            for active in self.active_threads.values_mut() {
                let frequency = self.frequencies.frequency(active.core);
                active.advance(delta, frequency, sharers[active.core]);
            }
            self.metrics.add_energy(self.counters.total_power(), delta);
        }
        self.clock.advance_to_ns(time_ns);
    }

    fn is_stale(&self, event: &SimEvent) -> bool {
        match event {
            SimEvent::ThreadArrival(_) => false,
            SimEvent::ThreadCompletion { version, .. } => *version != self.schedule_version,
            SimEvent::Epoch => !self.has_work(),
        }
    }

    fn process_event(&mut self, event: SimEvent) {
        match event {
            SimEvent::ThreadArrival(thread) => self.handle_arrival(thread),
            SimEvent::ThreadCompletion { .. } => self.handle_completions(),
            SimEvent::Epoch => self.handle_epoch(),
        }
    }

    fn handle_arrival(&mut self, thread: SimThread) {
        let now = self.clock.now_ns();
        self.pending_arrivals -= 1;
        let core = self.scheduler.thread_create(thread.id);
        debug!("t={} ns: thread {} arrives on core {}", now, thread.id, core);
        self.active_threads
            .insert(thread.id, ActiveThread::new(thread, core, now));
        self.refresh_counters();
        self.reschedule_completions();
    }

    /// Retire every thread that has finished its cycles.
    fn handle_completions(&mut self) {
        let now = self.clock.now_ns();
        let mut finished: Vec<ThreadId> = self
            .active_threads
            .values()
            .filter(|a| a.is_complete())
            .map(|a| a.thread.id)
            .collect();
        finished.sort_unstable();

        for thread_id in finished {
            if let Some(active) = self.active_threads.remove(&thread_id) {
                self.scheduler.thread_exit(thread_id);
                debug!("t={} ns: thread {} completes on core {}", now, thread_id, active.core);
                self.metrics.record(ThreadMetric {
                    thread_id,
                    core: active.core,
                    arrival_time_ns: active.thread.arrival_time_ns,
                    completion_time_ns: now,
                    cycles: active.thread.cycles,
                });
            }
        }
        self.refresh_counters();
        self.reschedule_completions();
    }

    fn handle_epoch(&mut self) {
        self.scheduler
            .execute_dvfs_policy(&mut self.frequencies, &mut self.counters);
        self.metrics.sample_frequencies(&self.frequencies.snapshot());
        self.refresh_counters();
        self.reschedule_completions();

        if self.has_work() {
            let next = self.clock.now_ns() + self.epoch_ns;
            self.schedule_event(next, SimEvent::Epoch);
        }
    }

    fn threads_per_core(&self) -> Vec<u32> {
        let mut sharers = vec![0u32; self.frequencies.num_cores()];
        for active in self.active_threads.values() {
            sharers[active.core] += 1;
        }
        sharers
    }

    /// Recompute per-core power and temperatures from the current state.
    fn refresh_counters(&mut self) {
        let sharers = self.threads_per_core();
        for (core, &count) in sharers.iter().enumerate() {
            let utilization = if count > 0 { 1.0 } else { 0.0 };
            let power = self
                .power_model
                .core_power(self.frequencies.frequency(core), utilization);
            self.counters.update_core(core, power, utilization);
        }
        let temperatures = self
            .thermal_model
            .steady_state_temperatures(self.counters.power());
        self.counters.set_temperatures(&temperatures);
        self.metrics
            .observe_power(self.counters.total_power(), &temperatures);
    }

    /// Invalidate pending completions and schedule fresh ones.
    fn reschedule_completions(&mut self) {
        self.schedule_version += 1;
        let now = self.clock.now_ns();
        let sharers = self.threads_per_core();

        let mut completions: Vec<(u64, ThreadId)> = self
            .active_threads
            .values()
            .filter_map(|active| {
                let frequency = self.frequencies.frequency(active.core);
                active
                    .time_to_completion_ns(frequency, sharers[active.core])
                    .map(|dt| (now + dt, active.thread.id))
            })
            .collect();
        completions.sort_unstable();

        let version = self.schedule_version;
        for (time_ns, thread_id) in completions {
            self.schedule_event(time_ns, SimEvent::ThreadCompletion { thread_id, version });
        }
    }
}
