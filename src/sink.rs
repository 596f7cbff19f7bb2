use crate::config::{ModuleKind, Propellant, ThrustRating};
use crate::float_curve::FloatCurve;
use crate::resolver::ResolvedParameters;

/// A module whose performance fields are driven by the active configuration.
pub trait EnginePerformanceSink {
    fn module_kind(&self) -> ModuleKind;

    /// Overwrite this module's performance fields from `params`.
    fn apply_resolved(&mut self, params: &ResolvedParameters);

    /// Drop every curve so stale keys never survive a switch.
    fn clear_curves(&mut self);
}

/// Module kind a set of parameters drives when none is named explicitly.
pub fn default_target(params: &ResolvedParameters) -> ModuleKind {
    match params.thrust_rating {
        Some(ThrustRating::ThrusterPower) => ModuleKind::Rcs,
        _ => ModuleKind::Engine,
    }
}

// ==========================================
// Rocket Engine
// ==========================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThrustEngineModule {
    pub max_thrust: f64,
    pub min_thrust: f64,
    pub atmosphere_curve: FloatCurve,
    pub velocity_curve: Option<FloatCurve>,
    pub density_curve: Option<FloatCurve>,
    pub heat_production: f64,
    pub gimbal_range: Option<f64>,
    pub propellants: Vec<Propellant>,
}

impl ThrustEngineModule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EnginePerformanceSink for ThrustEngineModule {
    fn module_kind(&self) -> ModuleKind {
        ModuleKind::Engine
    }

    fn apply_resolved(&mut self, params: &ResolvedParameters) {
        self.clear_curves();
        self.max_thrust = params.max_thrust;
        self.min_thrust = params.min_thrust;
        self.atmosphere_curve = params.atmosphere_curve.clone();
        self.velocity_curve = params.velocity_curve.clone();
        self.density_curve = params.density_curve.clone();
        self.heat_production = params.heat_production;
        if params.gimbal_range.is_some() {
            self.gimbal_range = params.gimbal_range;
        }
        self.propellants = params.propellants.clone();
    }

    fn clear_curves(&mut self) {
        self.atmosphere_curve = FloatCurve::new();
        self.velocity_curve = None;
        self.density_curve = None;
    }
}

// ==========================================
// RCS
// ==========================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RcsModule {
    /// Per-nozzle thrust in kN
    pub thruster_power: f64,
    pub atmosphere_curve: FloatCurve,
    pub propellants: Vec<Propellant>,
}

impl RcsModule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EnginePerformanceSink for RcsModule {
    fn module_kind(&self) -> ModuleKind {
        ModuleKind::Rcs
    }

    fn apply_resolved(&mut self, params: &ResolvedParameters) {
        self.clear_curves();
        self.thruster_power = params.max_thrust;
        self.atmosphere_curve = params.atmosphere_curve.clone();
        self.propellants = params.propellants.clone();
    }

    fn clear_curves(&mut self) {
        self.atmosphere_curve = FloatCurve::new();
    }
}
