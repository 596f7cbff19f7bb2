use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::balance;
use crate::error::ConfigError;

/// Global knobs for the engine model.
///
/// Constructed once (usually from a TOML file) and shared by reference into
/// the resolver, solver and controller. Every field has a default, so an
/// empty document yields [`Settings::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Sandbox-equivalent mode: every tech level and configuration is available
    pub sandbox: bool,
    /// Count and enforce ignitions
    pub limited_ignitions: bool,
    /// Run the per-tick ullage trial
    pub simulate_ullage: bool,
    /// Fault pressure-fed engines when feed pressure drops
    pub pressure_checks: bool,
    /// Enable residual thresholds and tick-level performance variance
    pub variance_and_residuals: bool,
    /// Exponent applied to propellant stability in the ullage trial
    pub ullage_exponent: f64,
    pub throttling_rate: f64,
    pub throttling_clamp: f64,
    pub throttle_accel_mult: f64,
    pub throttle_decel_mult: f64,
    pub startup_rate_mult: f64,
    pub ignite_level: f64,
    pub chamber_temp_rate: f64,
    pub chamber_temp_floor: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sandbox: false,
            limited_ignitions: true,
            simulate_ullage: true,
            pressure_checks: true,
            variance_and_residuals: true,
            ullage_exponent: balance::ULLAGE_EXPONENT,
            throttling_rate: balance::THROTTLING_RATE,
            throttling_clamp: balance::THROTTLING_CLAMP,
            throttle_accel_mult: balance::THROTTLE_ACCEL_MULT,
            throttle_decel_mult: balance::THROTTLE_DECEL_MULT,
            startup_rate_mult: balance::STARTUP_RATE_MULT,
            ignite_level: balance::IGNITE_LEVEL,
            chamber_temp_rate: balance::CHAMBER_TEMP_RATE,
            chamber_temp_floor: balance::CHAMBER_TEMP_FLOOR,
        }
    }
}

impl Settings {
    /// Settings with every failure mechanic switched off. Handy for
    /// deterministic numeric checks.
    pub fn permissive() -> Self {
        Self {
            sandbox: true,
            limited_ignitions: false,
            simulate_ullage: false,
            pressure_checks: false,
            variance_and_residuals: false,
            ..Self::default()
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}
