use serde::{Deserialize, Serialize};

// ==========================================
// Propulsion Class
// ==========================================

/// Broad feed-system class, used to pick variance magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropulsionClass {
    /// Pump-fed liquid engine
    Liquid,
    /// Pressure-fed liquid engine
    PressureFed,
    /// Solid rocket motor
    Solid,
}

impl PropulsionClass {
    pub fn display_name(&self) -> &'static str {
        match self {
            PropulsionClass::Liquid => "Liquid",
            PropulsionClass::PressureFed => "Pressure-Fed",
            PropulsionClass::Solid => "Solid",
        }
    }

    /// Classify from the engine-type tag and the pressure-fed flag.
    /// Solid engine types win over the flag.
    pub fn classify(engine_type: &str, pressure_fed: bool) -> PropulsionClass {
        if is_solid_engine_type(engine_type) {
            PropulsionClass::Solid
        } else if pressure_fed {
            PropulsionClass::PressureFed
        } else {
            PropulsionClass::Liquid
        }
    }
}

/// Solid-booster engine-type tags start with "S".
pub fn is_solid_engine_type(engine_type: &str) -> bool {
    engine_type.starts_with('S')
}

// ==========================================
// Residuals and Variance
// ==========================================

/// Per-class magnitudes for residuals and tick-level performance variance.
/// Variance values are the 1-sigma-ish fractional wobble of each quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceProfile {
    /// Fraction of propellant that is always unusable
    pub residuals_base: f64,
    /// Scale of the random residual term added on top of the base
    pub residuals_variance: f64,
    pub flow: f64,
    pub isp: f64,
    pub mixture_ratio: f64,
}

/// Spread of the normal term fed through the exponential residual link.
pub const RESIDUAL_LOG_SIGMA: f64 = 0.6;

/// Hard cap on the drawn residual threshold.
pub const RESIDUAL_MAX: f64 = 0.5;

/// Default variance profile for a propulsion class.
pub fn variance_profile(class: PropulsionClass) -> VarianceProfile {
    match class {
        PropulsionClass::Liquid => VarianceProfile {
            residuals_base: 0.004,
            residuals_variance: 0.004,
            flow: 0.005,
            isp: 0.003,
            mixture_ratio: 0.005,
        },
        PropulsionClass::PressureFed => VarianceProfile {
            residuals_base: 0.006,
            residuals_variance: 0.006,
            flow: 0.01,
            isp: 0.006,
            mixture_ratio: 0.008,
        },
        PropulsionClass::Solid => VarianceProfile {
            residuals_base: 0.002,
            residuals_variance: 0.002,
            flow: 0.02,
            isp: 0.008,
            mixture_ratio: 0.0,
        },
    }
}

/// Noise time-scale: how many noise lattice cells pass per second of burn.
pub const NOISE_FREQUENCY_HZ: f64 = 0.25;

/// Offsets separating the flow, Isp and mixture-ratio noise channels.
pub const NOISE_CHANNEL_OFFSETS: [f64; 3] = [0.0, 1013.7, 2741.3];

// ==========================================
// Throttle Response
// ==========================================

/// Base throttling rate, in throttle fraction per second before mass scaling.
pub const THROTTLING_RATE: f64 = 10.0;

/// Lower clamp on the log argument so tiny engines do not respond instantly.
pub const THROTTLING_CLAMP: f64 = 1.1;

/// Throttle below this is the startup/shutdown band.
pub const IGNITE_LEVEL: f64 = 0.01;

/// Multiplier on the response rate inside the startup/shutdown band.
pub const STARTUP_RATE_MULT: f64 = 20.0;

pub const THROTTLE_ACCEL_MULT: f64 = 1.0;
pub const THROTTLE_DECEL_MULT: f64 = 1.5;

// ==========================================
// Ullage and Chamber
// ==========================================

/// Default exponent applied to propellant stability before the ullage trial.
pub const ULLAGE_EXPONENT: f64 = 4.0;

/// Floor of the desired chamber temperature ratio while combusting.
pub const CHAMBER_TEMP_FLOOR: f64 = 0.5;

/// Exponential rate (per second) at which chamber temperature approaches its target.
pub const CHAMBER_TEMP_RATE: f64 = 0.75;

/// Additional chamber ratio per Mach of airspeed.
pub const MACH_HEATING_PER_MACH: f64 = 0.01;

// ==========================================
// Flow Multiplier Knee
// ==========================================

/// Default cap above which density/Mach multipliers start to saturate.
pub const FLOW_MULT_CAP: f64 = 1e6;

/// Default sharpness of the saturation knee.
pub const FLOW_MULT_CAP_SHARPNESS: f64 = 1.0;

/// Soft cap: identity below `cap`, then saturating towards twice the cap
/// as the input grows.
pub fn soft_cap(value: f64, cap: f64, sharpness: f64) -> f64 {
    if value <= cap || cap <= 0.0 {
        return value;
    }
    let excess = value - cap;
    cap + excess / (sharpness + excess / cap)
}
