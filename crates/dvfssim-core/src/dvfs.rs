//! DVFS control loop.
//!
//! [`Dvfs`] owns the configured [`FrequencyPolicy`] and the per-core
//! hysteresis counters. Once per epoch, [`Dvfs::execute_policy`] asks the
//! policy for target frequencies and passes each target through
//! [`Dvfs::set_frequency`], which applies, in order:
//!
//! 1. a rate limit of [`MAX_FREQUENCY_RAMP`] MHz per epoch,
//! 2. the `[min_frequency, max_frequency]` bounds,
//! 3. hysteresis: an exact one-step move (`current ± step`) is delayed while
//!    the patience counter for that direction is above zero.
//!
//! Patience counters are reset to the ceiling whenever a transition is not
//! delayed (including no-op requests), so no direction can be held back for
//! more than `max_dvfs_patience` consecutive epochs.

use crate::frequency::FrequencyControl;
use dvfssim_policies::{
    policy_by_name, CoreGrid, CoreId, Frequency, FrequencyPolicy, FrequencyRange,
    PerformanceCounters, PolicyError, PolicyParams,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest frequency change (MHz) a core may make in a single epoch.
pub const MAX_FREQUENCY_RAMP: Frequency = 1000;

#[derive(Error, Debug)]
pub enum DvfsError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("Invalid DVFS settings: {0}")]
    Settings(String),
}

/// Immutable parameters of the DVFS engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DvfsSettings {
    pub core_rows: usize,
    pub core_columns: usize,
    pub min_frequency: Frequency,
    pub max_frequency: Frequency,
    pub frequency_step_size: Frequency,
    /// Epoch length in nanoseconds.
    pub dvfs_epoch: u64,
    pub max_dvfs_patience: u32,
    /// Policy name, see [`dvfssim_policies::available_policies`].
    pub policy: String,
}

impl DvfsSettings {
    pub fn grid(&self) -> CoreGrid {
        CoreGrid::new(self.core_rows, self.core_columns)
    }

    pub fn range(&self) -> FrequencyRange {
        FrequencyRange::new(
            self.min_frequency,
            self.max_frequency,
            self.frequency_step_size,
        )
    }

    fn validate(&self) -> Result<(), DvfsError> {
        if self.core_rows == 0 || self.core_columns == 0 {
            return Err(DvfsError::Settings(
                "core grid must have at least one core".to_string(),
            ));
        }
        if self.min_frequency > self.max_frequency {
            return Err(DvfsError::Settings(format!(
                "min_frequency ({}) exceeds max_frequency ({})",
                self.min_frequency, self.max_frequency
            )));
        }
        if self.frequency_step_size == 0 {
            return Err(DvfsError::Settings(
                "frequency_step_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Direction of a single-step transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
}

/// Outcome of one [`Dvfs::set_frequency`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The core now runs at `to`.
    Applied { from: Frequency, to: Frequency },
    /// A single-step move was held back by hysteresis.
    Delayed {
        direction: Direction,
        from: Frequency,
        to: Frequency,
    },
    /// The (clamped) request equals the current frequency.
    Unchanged,
}

/// Decision counters accumulated over the engine's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvfsStats {
    pub epochs: u64,
    pub applied: u64,
    pub delayed: u64,
    pub unchanged: u64,
    /// Requests cut down by the per-epoch ramp limit.
    pub rate_limited: u64,
    /// Requests moved into `[min_frequency, max_frequency]`.
    pub bound_clamped: u64,
}

/// The DVFS engine.
pub struct Dvfs {
    grid: CoreGrid,
    range: FrequencyRange,
    dvfs_epoch: u64,
    max_dvfs_patience: u32,
    policy: Box<dyn FrequencyPolicy>,
    // Remaining epochs a one-step downscale may still be delayed, per core.
    downscaling_patience: Vec<u32>,
    // Remaining epochs a one-step upscale may still be delayed, per core.
    upscaling_patience: Vec<u32>,
    stats: DvfsStats,
}

impl Dvfs {
    /// Create the engine and the policy named in `settings.policy`.
    ///
    /// Fails for an unknown policy name or when the policy is missing one of
    /// its parameters.
    pub fn new(settings: DvfsSettings, params: PolicyParams) -> Result<Self, DvfsError> {
        settings.validate()?;
        let policy = policy_by_name(&settings.policy, settings.grid(), settings.range(), params)?;
        Ok(Self::build(&settings, policy))
    }

    /// Create the engine around an already constructed policy.
    pub fn with_policy(
        settings: DvfsSettings,
        policy: Box<dyn FrequencyPolicy>,
    ) -> Result<Self, DvfsError> {
        settings.validate()?;
        Ok(Self::build(&settings, policy))
    }

    fn build(settings: &DvfsSettings, policy: Box<dyn FrequencyPolicy>) -> Self {
        let grid = settings.grid();
        info!(
            "Initializing DVFS policy {} for {}x{} cores ({}-{} MHz, step {}, patience {})",
            policy.name(),
            grid.rows,
            grid.columns,
            settings.min_frequency,
            settings.max_frequency,
            settings.frequency_step_size,
            settings.max_dvfs_patience,
        );
        Self {
            grid,
            range: settings.range(),
            dvfs_epoch: settings.dvfs_epoch,
            max_dvfs_patience: settings.max_dvfs_patience,
            policy,
            downscaling_patience: vec![settings.max_dvfs_patience; grid.num_cores()],
            upscaling_patience: vec![settings.max_dvfs_patience; grid.num_cores()],
            stats: DvfsStats::default(),
        }
    }

    /// Run one control-loop epoch.
    ///
    /// Cores are processed in ascending index order. After all cores are
    /// handled, the frequencies actually in effect are reported to `counters`.
    pub fn execute_policy(
        &mut self,
        old_frequencies: &[Frequency],
        active_cores: &[bool],
        hw: &mut dyn FrequencyControl,
        counters: &mut dyn PerformanceCounters,
    ) {
        let num_cores = self.num_cores();
        assert_eq!(
            old_frequencies.len(),
            num_cores,
            "expected {} frequencies",
            num_cores
        );
        assert_eq!(
            active_cores.len(),
            num_cores,
            "expected {} activity flags",
            num_cores
        );

        let targets = self
            .policy
            .get_frequencies(old_frequencies, active_cores, &*counters);
        assert_eq!(
            targets.len(),
            num_cores,
            "policy {} returned {} targets for {} cores",
            self.policy.name(),
            targets.len(),
            num_cores
        );

        for (core, &target) in targets.iter().enumerate() {
            self.set_frequency(core, target, hw);
        }

        let applied: Vec<Frequency> = (0..num_cores).map(|core| hw.frequency(core)).collect();
        counters.notify_freqs_of_cores(&applied);
        self.stats.epochs += 1;
    }

    /// Gate one requested frequency through rate limit, bounds and hysteresis.
    ///
    /// # Panics
    ///
    /// Panics if `core` is not a valid core index.
    pub fn set_frequency(
        &mut self,
        core: CoreId,
        requested: Frequency,
        hw: &mut dyn FrequencyControl,
    ) -> Transition {
        assert!(
            core < self.num_cores(),
            "core {} out of range ({} cores)",
            core,
            self.num_cores()
        );

        let current = hw.frequency(core);
        let mut frequency = requested;

        if frequency > current.saturating_add(MAX_FREQUENCY_RAMP) {
            frequency = current.saturating_add(MAX_FREQUENCY_RAMP);
            self.stats.rate_limited += 1;
        } else if frequency < current.saturating_sub(MAX_FREQUENCY_RAMP) {
            frequency = current.saturating_sub(MAX_FREQUENCY_RAMP);
            self.stats.rate_limited += 1;
        }

        let bounded = self.range.clamp(frequency);
        if bounded != frequency {
            self.stats.bound_clamped += 1;
        }
        let frequency = bounded;

        if let Some(direction) = self.single_step(current, frequency) {
            if self.patience(core, direction) > 0 {
                self.transition_delayed(core, direction, current, frequency);
                return Transition::Delayed {
                    direction,
                    from: current,
                    to: frequency,
                };
            }
        }

        self.transition_not_delayed(core);
        if frequency != current {
            hw.set_frequency(core, frequency);
            self.stats.applied += 1;
            Transition::Applied {
                from: current,
                to: frequency,
            }
        } else {
            self.stats.unchanged += 1;
            Transition::Unchanged
        }
    }

    /// Classify an exact one-step move; any other magnitude is `None`.
    fn single_step(&self, current: Frequency, frequency: Frequency) -> Option<Direction> {
        let step = self.range.step;
        if current.checked_sub(step) == Some(frequency) {
            Some(Direction::Down)
        } else if current.checked_add(step) == Some(frequency) {
            Some(Direction::Up)
        } else {
            None
        }
    }

    fn patience(&self, core: CoreId, direction: Direction) -> u32 {
        match direction {
            Direction::Down => self.downscaling_patience[core],
            Direction::Up => self.upscaling_patience[core],
        }
    }

    fn transition_delayed(
        &mut self,
        core: CoreId,
        direction: Direction,
        from: Frequency,
        to: Frequency,
    ) {
        let counter = match direction {
            Direction::Down => &mut self.downscaling_patience[core],
            Direction::Up => &mut self.upscaling_patience[core],
        };
        debug!(
            "core {}: DVFS transition {} -> {} MHz delayed (current patience: {})",
            core, from, to, *counter
        );
        *counter -= 1;
        self.stats.delayed += 1;
    }

    fn transition_not_delayed(&mut self, core: CoreId) {
        self.downscaling_patience[core] = self.max_dvfs_patience;
        self.upscaling_patience[core] = self.max_dvfs_patience;
    }

    /// Epoch length in nanoseconds.
    pub fn epoch(&self) -> u64 {
        self.dvfs_epoch
    }

    pub fn num_cores(&self) -> usize {
        self.grid.num_cores()
    }

    pub fn grid(&self) -> CoreGrid {
        self.grid
    }

    pub fn range(&self) -> FrequencyRange {
        self.range
    }

    pub fn max_dvfs_patience(&self) -> u32 {
        self.max_dvfs_patience
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    pub fn downscaling_patience(&self, core: CoreId) -> u32 {
        self.downscaling_patience[core]
    }

    pub fn upscaling_patience(&self, core: CoreId) -> u32 {
        self.upscaling_patience[core]
    }

    pub fn stats(&self) -> &DvfsStats {
        &self.stats
    }
}

impl std::fmt::Debug for Dvfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dvfs")
            .field("policy", &self.policy.name())
            .field("grid", &self.grid)
            .field("range", &self.range)
            .field("dvfs_epoch", &self.dvfs_epoch)
            .field("max_dvfs_patience", &self.max_dvfs_patience)
            .field("stats", &self.stats)
            .finish()
    }
}
