//! Built-in frequency policies for DVFSSim.
//!
//! This crate provides the [`FrequencyPolicy`] trait and the policies the
//! DVFS control loop can be configured with:
//!
//! | Name | Policy | Strategy |
//! |------|--------|----------|
//! | `maxFreq` | [`MaxFrequency`] | Every core at the maximum frequency |
//! | `testStaticPower` | [`TestStaticPower`] | Busy cores at max, idle cores at min |
//! | `fixedPower` | [`FixedPower`] | Highest frequency within a fixed per-core power budget |
//! | `tsp` | [`ThermalSafePower`] | Highest frequency within the thermal-safe power budget |

pub mod fixed_power;
pub mod max_freq;
pub mod test_static_power;
pub mod traits;
pub mod tsp;

pub use fixed_power::FixedPower;
pub use max_freq::MaxFrequency;
pub use test_static_power::TestStaticPower;
pub use traits::*;
pub use tsp::ThermalSafePower;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Unknown DVFS policy: {0}")]
    UnknownPolicy(String),
    #[error("DVFS policy {policy} requires parameter {parameter}")]
    MissingParameter {
        policy: &'static str,
        parameter: &'static str,
    },
}

/// Create a frequency policy by configuration name.
pub fn policy_by_name(
    name: &str,
    grid: CoreGrid,
    range: FrequencyRange,
    params: PolicyParams,
) -> Result<Box<dyn FrequencyPolicy>, PolicyError> {
    match name {
        "maxFreq" => Ok(Box::new(MaxFrequency::new(grid, range.max))),
        "testStaticPower" => Ok(Box::new(TestStaticPower::new(grid, range.min, range.max))),
        "fixedPower" => {
            let budget = params
                .per_core_power_budget
                .ok_or(PolicyError::MissingParameter {
                    policy: "fixedPower",
                    parameter: "per_core_power_budget",
                })?;
            Ok(Box::new(FixedPower::new(grid, range, budget)))
        }
        "tsp" => {
            let thermal_model = params.thermal_model.ok_or(PolicyError::MissingParameter {
                policy: "tsp",
                parameter: "thermal_model",
            })?;
            Ok(Box::new(ThermalSafePower::new(grid, range, thermal_model)))
        }
        other => Err(PolicyError::UnknownPolicy(other.to_string())),
    }
}

/// List all available built-in policy names.
pub fn available_policies() -> Vec<&'static str> {
    vec!["maxFreq", "testStaticPower", "fixedPower", "tsp"]
}
