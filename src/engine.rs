/// Physical constants shared by the resolver and the solver
pub mod physics {
    /// Standard gravity in m/s², used to turn Isp into exhaust velocity
    pub const G0: f64 = 9.80665;

    /// Sea-level atmospheric density in kg/m³
    pub const SEA_LEVEL_DENSITY: f64 = 1.225;

    /// Density curves are keyed on density scaled by this factor, so that
    /// sea level on the reference planet lands on 1.0 rather than 1.225
    pub const DENSITY_CURVE_SCALE: f64 = 40.0 / 49.0;

    /// Ambient temperature used when the environment does not provide one, in K
    pub const DEFAULT_AMBIENT_TEMP_K: f64 = 288.15;

    /// Nominal chamber temperature when a configuration does not declare one, in K
    pub const DEFAULT_CHAMBER_TEMP_K: f64 = 3000.0;
}

/// Sentinels and limits used in engine runtime state
pub mod limits {
    /// Tech level value meaning "tech levels disabled for this instance"
    pub const TECH_LEVEL_DISABLED: i32 = -1;

    /// Ignition count meaning "unlimited ignitions"
    pub const UNLIMITED_IGNITIONS: i32 = -1;

    /// Propellant fractions at or below this are treated as empty
    pub const EMPTY_FRACTION_EPSILON: f64 = 1e-9;
}
