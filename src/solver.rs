use std::sync::Arc;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::balance::{variance_profile, PropulsionClass};
use crate::chamber::{target_temperature, ChamberState};
use crate::collaborators::{PropellantNetwork, TickContext, UllageModel};
use crate::engine::limits::EMPTY_FRACTION_EPSILON;
use crate::engine::physics::DEFAULT_AMBIENT_TEMP_K;
use crate::error::{EngineError, IgnitionDenied};
use crate::ignition::{consume_ignition, draw_ignitor_resources, ignition_trial, ullage_trial};
use crate::noise::CoherentNoise;
use crate::performance::{evaluate, propellant_demand, Environment, Performance};
use crate::resolver::ResolvedParameters;
use crate::seed::InstanceSeed;
use crate::settings::Settings;
use crate::throttle::{response_rate, ThrottleResponse};
use crate::variance::{draw_residual_threshold, NoiseSample, PerformanceNoise};

// ==========================================
// States and Faults
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Unignited,
    Igniting,
    Combusting,
    Shutdown,
}

impl EngineState {
    pub fn display_name(&self) -> &'static str {
        match self {
            EngineState::Unignited => "Unignited",
            EngineState::Igniting => "Igniting",
            EngineState::Combusting => "Combusting",
            EngineState::Shutdown => "Shutdown",
        }
    }
}

/// Why a running or starting engine stopped. The `Display` text is the
/// message shown to the player.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineFault {
    #[error("ignition failed: {0}")]
    IgnitionDenied(IgnitionDenied),
    #[error("vapor in feed line, engine shut down")]
    UnstableFeed,
    #[error("lack of feed pressure, engine shut down")]
    LackOfPressure,
    #[error("{propellant} unavailable, engine shut down")]
    PropellantUnavailable { propellant: String },
    #[error("shut down with its symmetry group")]
    SymmetricCutoff,
}

impl EngineFault {
    /// Whether the engine stays unable to relight until the throttle is cut.
    pub fn blocks_reignition(&self) -> bool {
        matches!(
            self,
            EngineFault::IgnitionDenied(_) | EngineFault::UnstableFeed | EngineFault::LackOfPressure
        )
    }

    /// The matching controller-level error, where there is one.
    pub fn as_engine_error(&self) -> Option<EngineError> {
        match self {
            EngineFault::IgnitionDenied(denied) => Some(EngineError::IgnitionDenied(*denied)),
            EngineFault::UnstableFeed => Some(EngineError::UllageFault),
            EngineFault::LackOfPressure => Some(EngineError::PressureFault),
            EngineFault::PropellantUnavailable { .. } | EngineFault::SymmetricCutoff => None,
        }
    }
}

impl From<IgnitionDenied> for EngineFault {
    fn from(denied: IgnitionDenied) -> Self {
        EngineFault::IgnitionDenied(denied)
    }
}

/// Everything one tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub state: EngineState,
    /// Delivered throttle
    pub throttle: f64,
    /// kN
    pub thrust: f64,
    /// Thrust over rated max thrust
    pub thrust_fraction: f64,
    /// s
    pub isp: f64,
    /// t/s
    pub mass_flow: f64,
    pub heat: f64,
    /// K
    pub chamber_temp: f64,
    pub fault: Option<EngineFault>,
    /// Siblings in the same symmetry slot should cut off this tick
    pub cutoff_broadcast: bool,
    pub rated_burn_exceeded: bool,
}

/// The persisted runtime counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverCounters {
    pub ignitions_remaining: i32,
    #[serde(default)]
    pub residual_threshold: Option<f64>,
    pub chamber_temp: f64,
    #[serde(default)]
    pub curve_time: f64,
    #[serde(default)]
    pub burn_time: f64,
}

// ==========================================
// Solver
// ==========================================

#[derive(Debug, Clone)]
pub struct EngineSolver {
    settings: Arc<Settings>,
    seed: InstanceSeed,
    state: EngineState,
    activation_requested: bool,
    reignitable: bool,
    ignitions_remaining: i32,
    residual_threshold: Option<f64>,
    throttle: ThrottleResponse,
    chamber: ChamberState,
    curve_time: f64,
    /// Combusting time on `burn_config`
    burn_time: f64,
    burn_config: String,
    noise: PerformanceNoise,
}

impl EngineSolver {
    pub fn new(settings: Arc<Settings>, seed: InstanceSeed, params: &ResolvedParameters, noise: CoherentNoise) -> Self {
        Self {
            settings,
            seed,
            state: EngineState::Unignited,
            activation_requested: false,
            reignitable: true,
            ignitions_remaining: params.ignitions,
            residual_threshold: None,
            throttle: ThrottleResponse::new(),
            chamber: ChamberState::new(DEFAULT_AMBIENT_TEMP_K),
            curve_time: 0.0,
            burn_time: 0.0,
            burn_config: params.config_name.clone(),
            noise: PerformanceNoise::new(noise),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_ignited(&self) -> bool {
        self.state == EngineState::Combusting
    }

    pub fn is_reignitable(&self) -> bool {
        self.reignitable
    }

    pub fn is_activated(&self) -> bool {
        self.activation_requested
    }

    pub fn ignitions_remaining(&self) -> i32 {
        self.ignitions_remaining
    }

    pub fn residual_threshold(&self) -> Option<f64> {
        self.residual_threshold
    }

    pub fn chamber_temp(&self) -> f64 {
        self.chamber.temperature
    }

    pub fn burn_time(&self) -> f64 {
        self.burn_time
    }

    pub fn throttle(&self) -> f64 {
        self.throttle.current()
    }

    pub fn seed(&self) -> InstanceSeed {
        self.seed
    }

    /// Pick up freshly resolved parameters. The ignition pool follows the
    /// configuration only before the first ignition; burn time restarts when
    /// the configuration changes.
    pub fn load_parameters(&mut self, params: &ResolvedParameters) {
        if self.state == EngineState::Unignited {
            self.ignitions_remaining = params.ignitions;
        }
        if self.burn_config != params.config_name {
            self.burn_config = params.config_name.clone();
            self.burn_time = 0.0;
        }
    }

    pub fn set_noise(&mut self, noise: CoherentNoise) {
        self.noise = PerformanceNoise::new(noise);
    }

    /// Request ignition. Takes effect on the next step with throttle above zero.
    pub fn activate(&mut self) {
        self.activation_requested = true;
    }

    /// Clean shutdown requested by the player.
    pub fn shutdown(&mut self) {
        self.activation_requested = false;
        if self.state != EngineState::Unignited {
            self.state = EngineState::Shutdown;
        }
        self.throttle.reset();
    }

    /// Fault the engine out from outside, e.g. a symmetry cutoff. Returns
    /// whether the engine was running.
    pub fn force_fault(&mut self, fault: EngineFault) -> bool {
        let running = matches!(self.state, EngineState::Combusting | EngineState::Igniting);
        if running {
            self.fail(&fault);
        }
        running
    }

    pub fn counters(&self) -> SolverCounters {
        SolverCounters {
            ignitions_remaining: self.ignitions_remaining,
            residual_threshold: self.residual_threshold,
            chamber_temp: self.chamber.temperature,
            curve_time: self.curve_time,
            burn_time: self.burn_time,
        }
    }

    pub fn restore_counters(&mut self, counters: &SolverCounters) {
        self.ignitions_remaining = counters.ignitions_remaining;
        self.residual_threshold = counters.residual_threshold;
        self.chamber.temperature = counters.chamber_temp;
        self.curve_time = counters.curve_time;
        self.burn_time = counters.burn_time;
    }

    fn fail(&mut self, fault: &EngineFault) {
        debug!("engine fault: {}", fault);
        self.state = EngineState::Shutdown;
        self.activation_requested = false;
        self.throttle.reset();
        if fault.blocks_reignition() {
            self.reignitable = false;
        }
    }

    /// Residual threshold in force, zero when residuals are switched off.
    fn active_residual_threshold(&self) -> f64 {
        if self.settings.variance_and_residuals {
            self.residual_threshold.unwrap_or(0.0)
        } else {
            0.0
        }
    }

    fn ignite<R: Rng + ?Sized>(
        &mut self,
        params: &ResolvedParameters,
        env: &Environment,
        network: &mut dyn PropellantNetwork,
        rng: &mut R,
    ) -> Result<(), IgnitionDenied> {
        if self.residual_threshold.is_none() {
            let profile = variance_profile(params.propulsion_class);
            self.residual_threshold = Some(draw_residual_threshold(&profile, &self.seed));
        }

        // Ground support lights clamped engines for free
        if self.settings.limited_ignitions && !env.clamped {
            consume_ignition(&mut self.ignitions_remaining, true, false)?;
            let supplied = draw_ignitor_resources(&params.ignitor_resources, network);
            ignition_trial(supplied, rng.gen())?;
        }
        debug!("{} ignited ({} ignitions left)", params.config_name, self.ignitions_remaining);
        self.state = EngineState::Combusting;
        Ok(())
    }

    fn feed_fault<R: Rng + ?Sized>(
        &self,
        params: &ResolvedParameters,
        ullage: &dyn UllageModel,
        rng: &mut R,
    ) -> Option<EngineFault> {
        if self.settings.pressure_checks && params.pressure_fed && !ullage.pressure_ok() {
            return Some(EngineFault::LackOfPressure);
        }
        if self.settings.simulate_ullage
            && params.ullage
            && !ullage_trial(ullage.stability(), self.settings.ullage_exponent, rng.gen())
        {
            return Some(EngineFault::UnstableFeed);
        }
        None
    }

    /// One combusting tick. Errors carry the fault and whether it should
    /// cut off the rest of the symmetry slot.
    fn combust<R: Rng + ?Sized>(
        &mut self,
        params: &ResolvedParameters,
        env: &Environment,
        commanded: f64,
        dt: f64,
        ctx: &mut TickContext<'_>,
        rng: &mut R,
    ) -> Result<Performance, (EngineFault, bool)> {
        if let Some(fault) = self.feed_fault(params, ctx.ullage, rng) {
            return Err((fault, false));
        }

        let threshold = self.active_residual_threshold();
        for propellant in &params.propellants {
            let fraction = ctx.network.connected_fraction(&propellant.name);
            if fraction - threshold <= EMPTY_FRACTION_EPSILON {
                let fault = EngineFault::PropellantUnavailable { propellant: propellant.name.clone() };
                return Err((fault, params.auto_cutoff));
            }
        }

        let solid = params.propulsion_class == PropulsionClass::Solid;
        let request = if solid { 1.0 } else { commanded };
        let delivered = if params.instant_throttle() {
            self.throttle.snap(request)
        } else {
            let rate = response_rate(&self.settings, env.vessel_mass, params.max_thrust);
            self.throttle.advance(request, rate, &self.settings, dt)
        };

        let noise = if self.settings.variance_and_residuals {
            self.noise.sample(&variance_profile(params.propulsion_class), self.curve_time)
        } else {
            NoiseSample::neutral()
        };
        let mut perf = evaluate(params, env, delivered, noise);

        if perf.mass_flow > 0.0 && dt > 0.0 && !params.propellants.is_empty() {
            let demand = propellant_demand(&params.propellants, perf.mass_flow * dt, noise.mixture_ratio);
            let mut supplied_ratio: f64 = 1.0;
            let mut short = None;
            for (propellant, wanted) in params.propellants.iter().zip(demand) {
                if wanted <= 0.0 {
                    continue;
                }
                let got = ctx.network.request_resource(&propellant.name, wanted);
                let ratio = got / wanted;
                if ratio < supplied_ratio {
                    supplied_ratio = ratio;
                    short = Some(&propellant.name);
                }
            }
            if supplied_ratio <= EMPTY_FRACTION_EPSILON {
                let propellant = short.cloned().unwrap_or_default();
                return Err((EngineFault::PropellantUnavailable { propellant }, params.auto_cutoff));
            }
            perf.thrust *= supplied_ratio;
            perf.mass_flow *= supplied_ratio;
        }

        self.curve_time += dt;
        self.burn_time += dt;
        Ok(perf)
    }

    /// Advance one tick.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        params: &ResolvedParameters,
        env: &Environment,
        commanded_throttle: f64,
        dt: f64,
        ctx: &mut TickContext<'_>,
        rng: &mut R,
    ) -> StepOutput {
        let commanded = commanded_throttle.clamp(0.0, 1.0);
        let solid = params.propulsion_class == PropulsionClass::Solid;
        if commanded <= 0.0 {
            self.reignitable = true;
        }

        let mut fault = None;
        let mut cutoff_broadcast = false;
        let mut perf = Performance::default();

        if matches!(self.state, EngineState::Unignited | EngineState::Shutdown)
            && self.activation_requested
            && self.reignitable
            && commanded > 0.0
        {
            self.state = EngineState::Igniting;
        }

        if self.state == EngineState::Igniting {
            if let Err(denied) = self.ignite(params, env, &mut *ctx.network, rng) {
                let f = EngineFault::from(denied);
                self.fail(&f);
                fault = Some(f);
            }
        }

        if self.state == EngineState::Combusting {
            if commanded <= 0.0 && !solid {
                debug!("{} shut down at zero throttle", params.config_name);
                self.state = EngineState::Shutdown;
                self.throttle.reset();
            } else {
                match self.combust(params, env, commanded, dt, ctx, rng) {
                    Ok(p) => perf = p,
                    Err((f, broadcast)) => {
                        self.fail(&f);
                        fault = Some(f);
                        cutoff_broadcast = broadcast;
                    }
                }
            }
        }

        let combusting = self.state == EngineState::Combusting;
        let thrust_fraction = if combusting && params.max_thrust > 0.0 {
            (perf.thrust / params.max_thrust).max(0.0)
        } else {
            0.0
        };
        let target = if combusting {
            target_temperature(params.chamber_nominal_temp, thrust_fraction, env.mach, self.settings.chamber_temp_floor)
        } else {
            env.ambient_temp
        };
        let chamber_temp = self.chamber.advance(target, self.settings.chamber_temp_rate, dt);
        ctx.effects.receive(thrust_fraction, chamber_temp);

        StepOutput {
            state: self.state,
            throttle: self.throttle.current(),
            thrust: perf.thrust,
            thrust_fraction,
            isp: perf.isp,
            mass_flow: perf.mass_flow,
            heat: params.heat_production * thrust_fraction,
            chamber_temp,
            fault,
            cutoff_broadcast,
            rated_burn_exceeded: params.rated_burn_time.map_or(false, |rated| self.burn_time > rated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{EffectsRecorder, FixedUllage, NoEffects};
    use crate::config::EngineModuleDef;
    use crate::resolver::resolve;
    use crate::tank_network::TankNetwork;
    use crate::tech_level::TechLevelTable;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const MODULE: &str = r#"
        name = "Test"
        engine_type = "L"
        auto_cutoff = true

        [[config]]
        name = "Kerolox"
        thrust_rating = "max_thrust"
        max_thrust = 100
        min_thrust = 40
        heat_production = 50
        atmosphere_curve = [[0, 330], [1, 290]]
        ignitions = 2
        ullage = true
        rated_burn_time = 1.0

        [[config.propellant]]
        name = "Kerosene"
        ratio = 0.4
        density = 0.0008

        [[config.propellant]]
        name = "LqdOxygen"
        ratio = 0.6
        density = 0.00114

        [[config]]
        name = "Hypergolic"
        thrust_rating = "max_thrust"
        max_thrust = 10
        atmosphere_curve = [[0, 300], [1, 200]]
        ignitions = 0
        pressure_fed = true

        [[config.propellant]]
        name = "MMH"
        ratio = 1.0
        density = 0.00088
        instant_throttle = true
    "#;

    const SOLID: &str = r#"
        name = "Booster"
        engine_type = "S"

        [[config]]
        name = "PBAN"
        thrust_rating = "max_thrust"
        max_thrust = 200
        atmosphere_curve = [[0, 260], [1, 230]]
        ignitions = 1

        [[config.propellant]]
        name = "PBAN"
        ratio = 1.0
        density = 0.0018
    "#;

    fn params(name: &str) -> ResolvedParameters {
        let def = EngineModuleDef::from_toml_str(MODULE).unwrap();
        resolve(&def, &TechLevelTable::new(), name, None, -1, -1).unwrap().parameters
    }

    fn tanks() -> TankNetwork {
        TankNetwork::new()
            .with_tank("Kerosene", 1000.0, 1000.0)
            .with_tank("LqdOxygen", 1000.0, 1000.0)
            .with_tank("MMH", 1000.0, 1000.0)
    }

    fn solver(settings: Settings, params: &ResolvedParameters) -> EngineSolver {
        EngineSolver::new(Arc::new(settings), InstanceSeed::new(42), params, CoherentNoise::new(1))
    }

    fn no_failures() -> Settings {
        Settings { limited_ignitions: true, ..Settings::permissive() }
    }

    /// Step with a settled feed and the given network.
    fn step(
        s: &mut EngineSolver,
        p: &ResolvedParameters,
        net: &mut TankNetwork,
        ullage: &FixedUllage,
        throttle: f64,
        rng: &mut ChaCha8Rng,
    ) -> StepOutput {
        let mut effects = NoEffects;
        let mut ctx = TickContext { network: net, ullage, effects: &mut effects };
        s.step(p, &Environment::vacuum(), throttle, 0.02, &mut ctx, rng)
    }

    #[test]
    fn test_ignites_and_spools_up() {
        let p = params("Kerolox");
        let mut s = solver(no_failures(), &p);
        let mut net = tanks();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let ullage = FixedUllage::settled();

        let idle = step(&mut s, &p, &mut net, &ullage, 1.0, &mut rng);
        assert_eq!(idle.state, EngineState::Unignited);

        s.activate();
        let first = step(&mut s, &p, &mut net, &ullage, 1.0, &mut rng);
        assert_eq!(first.state, EngineState::Combusting);
        assert!(first.throttle < 1.0);
        assert_eq!(s.ignitions_remaining(), 1);

        let mut last = first;
        for _ in 0..500 {
            last = step(&mut s, &p, &mut net, &ullage, 1.0, &mut rng);
        }
        assert!((last.throttle - 1.0).abs() < 1e-12);
        assert!((last.thrust - 100.0).abs() < 1e-6);
        assert!((last.heat - 50.0).abs() < 1e-6);
        assert!(net.stored("Kerosene") < 1000.0);
        assert!(last.rated_burn_exceeded);
    }

    #[test]
    fn test_throttle_zero_is_clean_shutdown_and_relights() {
        let p = params("Kerolox");
        let mut s = solver(no_failures(), &p);
        let mut net = tanks();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let ullage = FixedUllage::settled();

        s.activate();
        step(&mut s, &p, &mut net, &ullage, 1.0, &mut rng);
        let off = step(&mut s, &p, &mut net, &ullage, 0.0, &mut rng);
        assert_eq!(off.state, EngineState::Shutdown);
        assert_eq!(off.fault, None);
        assert!(s.is_reignitable());

        let relit = step(&mut s, &p, &mut net, &ullage, 1.0, &mut rng);
        assert_eq!(relit.state, EngineState::Combusting);
        assert_eq!(s.ignitions_remaining(), 0);

        step(&mut s, &p, &mut net, &ullage, 0.0, &mut rng);
        let denied = step(&mut s, &p, &mut net, &ullage, 1.0, &mut rng);
        assert_eq!(denied.state, EngineState::Shutdown);
        assert_eq!(denied.fault, Some(EngineFault::IgnitionDenied(IgnitionDenied::NoIgnitionsLeft)));
    }

    #[test]
    fn test_clamped_ignition_keeps_credits() {
        let p = params("Kerolox");
        let mut s = solver(no_failures(), &p);
        let mut net = tanks();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let ullage = FixedUllage::settled();
        let mut effects = NoEffects;
        let env = Environment { clamped: true, ..Environment::sea_level() };

        s.activate();
        let mut ctx = TickContext { network: &mut net, ullage: &ullage, effects: &mut effects };
        let out = s.step(&p, &env, 1.0, 0.02, &mut ctx, &mut rng);
        assert_eq!(out.state, EngineState::Combusting);
        assert_eq!(s.ignitions_remaining(), 2);
    }

    #[test]
    fn test_unlimited_pool_never_decrements() {
        let p = params("Hypergolic");
        assert_eq!(p.ignitions, -1);
        let mut s = solver(no_failures(), &p);
        let mut net = tanks();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let ullage = FixedUllage::settled();

        s.activate();
        for _ in 0..50 {
            let on = step(&mut s, &p, &mut net, &ullage, 1.0, &mut rng);
            assert_eq!(on.state, EngineState::Combusting);
            assert_eq!(on.fault, None);
            step(&mut s, &p, &mut net, &ullage, 0.0, &mut rng);
        }
        assert_eq!(s.ignitions_remaining(), -1);
    }

    #[test]
    fn test_instant_throttle_snaps() {
        let p = params("Hypergolic");
        let mut s = solver(no_failures(), &p);
        let mut net = tanks();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        s.activate();
        let out = step(&mut s, &p, &mut net, &FixedUllage::settled(), 0.5, &mut rng);
        assert_eq!(out.throttle, 0.5);
    }

    #[test]
    fn test_pressure_fault_blocks_reignition_until_rearmed() {
        let p = params("Hypergolic");
        let settings = Settings { pressure_checks: true, ..no_failures() };
        let mut s = solver(settings, &p);
        let mut net = tanks();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let good = FixedUllage::settled();
        let starved = FixedUllage { stability: 1.0, pressure_ok: false };

        s.activate();
        assert_eq!(step(&mut s, &p, &mut net, &good, 1.0, &mut rng).state, EngineState::Combusting);

        let out = step(&mut s, &p, &mut net, &starved, 1.0, &mut rng);
        assert_eq!(out.fault, Some(EngineFault::LackOfPressure));
        assert_eq!(out.state, EngineState::Shutdown);
        assert!(!s.is_ignited());
        assert!(!s.is_reignitable());

        // Reactivating without cutting the throttle does nothing
        s.activate();
        let out = step(&mut s, &p, &mut net, &good, 1.0, &mut rng);
        assert_eq!(out.state, EngineState::Shutdown);
        assert!(!s.is_reignitable());

        step(&mut s, &p, &mut net, &good, 0.0, &mut rng);
        assert!(s.is_reignitable());
        let out = step(&mut s, &p, &mut net, &good, 1.0, &mut rng);
        assert_eq!(out.state, EngineState::Combusting);
    }

    #[test]
    fn test_unsettled_feed_faults() {
        let p = params("Kerolox");
        let settings = Settings { simulate_ullage: true, ..no_failures() };
        let mut s = solver(settings, &p);
        let mut net = tanks();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let floating = FixedUllage { stability: 0.0, pressure_ok: true };

        s.activate();
        let out = step(&mut s, &p, &mut net, &floating, 1.0, &mut rng);
        assert_eq!(out.fault, Some(EngineFault::UnstableFeed));
        assert!(!s.is_reignitable());
        assert_eq!(out.fault.as_ref().and_then(|f| f.as_engine_error()), Some(EngineError::UllageFault));
    }

    #[test]
    fn test_residual_threshold_drawn_once() {
        let p = params("Kerolox");
        let settings = Settings { variance_and_residuals: true, ..no_failures() };
        let mut s = solver(settings, &p);
        let mut net = tanks();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let ullage = FixedUllage::settled();

        assert_eq!(s.residual_threshold(), None);
        s.activate();
        step(&mut s, &p, &mut net, &ullage, 1.0, &mut rng);
        let drawn = s.residual_threshold();
        assert!(drawn.is_some());
        for _ in 0..100 {
            step(&mut s, &p, &mut net, &ullage, 1.0, &mut rng);
            assert_eq!(s.residual_threshold(), drawn);
        }
    }

    #[test]
    fn test_residuals_starve_engine_and_request_cutoff() {
        let p = params("Kerolox");
        let settings = Settings { variance_and_residuals: true, ..no_failures() };
        let mut s = solver(settings, &p);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let ullage = FixedUllage::settled();
        // Well under the smallest possible liquid residual threshold
        let mut net = TankNetwork::new()
            .with_tank("Kerosene", 1.0, 1000.0)
            .with_tank("LqdOxygen", 1000.0, 1000.0);

        s.activate();
        let out = step(&mut s, &p, &mut net, &ullage, 1.0, &mut rng);
        assert_eq!(out.fault, Some(EngineFault::PropellantUnavailable { propellant: "Kerosene".to_string() }));
        assert!(out.cutoff_broadcast);
        assert_eq!(out.thrust, 0.0);
    }

    #[test]
    fn test_partial_draw_scales_thrust() {
        let p = params("Hypergolic");
        let mut s = solver(no_failures(), &p);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        // 10 kN at 300 s is ~3.4 kg/s, ~0.077 units per 0.02 s tick
        let mut net = TankNetwork::new().with_tank("MMH", 0.02, 1.0);
        s.activate();
        let out = step(&mut s, &p, &mut net, &FixedUllage::settled(), 1.0, &mut rng);
        assert_eq!(out.state, EngineState::Combusting);
        assert!(out.thrust > 0.0 && out.thrust < 10.0);
        assert_eq!(net.stored("MMH"), 0.0);
    }

    #[test]
    fn test_chamber_heats_then_cools() {
        let p = params("Kerolox");
        let mut s = solver(no_failures(), &p);
        let mut net = tanks();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let ullage = FixedUllage::settled();
        let mut effects = EffectsRecorder::default();

        s.activate();
        for _ in 0..300 {
            let mut ctx = TickContext { network: &mut net, ullage: &ullage, effects: &mut effects };
            s.step(&p, &Environment::vacuum(), 1.0, 0.02, &mut ctx, &mut rng);
        }
        let hot = s.chamber_temp();
        assert!(hot > 2000.0);
        assert_eq!(effects.samples, 300);
        assert!(effects.thrust_fraction > 0.99);

        s.shutdown();
        for _ in 0..300 {
            let mut ctx = TickContext { network: &mut net, ullage: &ullage, effects: &mut effects };
            s.step(&p, &Environment::vacuum(), 1.0, 0.02, &mut ctx, &mut rng);
        }
        assert!(s.chamber_temp() < hot);
        assert_eq!(effects.thrust_fraction, 0.0);
    }

    #[test]
    fn test_force_fault_only_hits_running_engines() {
        let p = params("Kerolox");
        let mut s = solver(no_failures(), &p);
        assert!(!s.force_fault(EngineFault::SymmetricCutoff));

        let mut net = tanks();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        s.activate();
        step(&mut s, &p, &mut net, &FixedUllage::settled(), 1.0, &mut rng);
        assert!(s.force_fault(EngineFault::SymmetricCutoff));
        assert_eq!(s.state(), EngineState::Shutdown);
        assert!(s.is_reignitable());
    }

    #[test]
    fn test_counters_round_trip() {
        let p = params("Kerolox");
        let mut s = solver(no_failures(), &p);
        let counters = SolverCounters {
            ignitions_remaining: 1,
            residual_threshold: Some(0.01),
            chamber_temp: 900.0,
            curve_time: 12.0,
            burn_time: 12.0,
        };
        s.restore_counters(&counters);
        assert_eq!(s.counters(), counters);
    }

    #[test]
    fn test_burn_time_restarts_on_new_configuration() {
        let p = params("Kerolox");
        let mut s = solver(no_failures(), &p);
        let mut net = tanks();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        s.activate();
        for _ in 0..10 {
            step(&mut s, &p, &mut net, &FixedUllage::settled(), 1.0, &mut rng);
        }
        assert!((s.burn_time() - 0.2).abs() < 1e-9);

        s.load_parameters(&p);
        assert!((s.burn_time() - 0.2).abs() < 1e-9);
        s.load_parameters(&params("Hypergolic"));
        assert_eq!(s.burn_time(), 0.0);
    }

    #[test]
    fn test_fault_messages() {
        let f = EngineFault::PropellantUnavailable { propellant: "LqdHydrogen".to_string() };
        assert_eq!(f.to_string(), "LqdHydrogen unavailable, engine shut down");
        assert!(!f.blocks_reignition());
        assert!(EngineFault::LackOfPressure.blocks_reignition());
    }

    #[test]
    fn test_solid_ignores_throttle_commands() {
        let def = EngineModuleDef::from_toml_str(SOLID).unwrap();
        let p = resolve(&def, &TechLevelTable::new(), "PBAN", None, -1, -1).unwrap().parameters;
        assert_eq!(p.propulsion_class, PropulsionClass::Solid);
        let mut s = solver(no_failures(), &p);
        let mut net = TankNetwork::new().with_tank("PBAN", 10000.0, 10000.0);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let ullage = FixedUllage::settled();

        s.activate();
        let mut last = step(&mut s, &p, &mut net, &ullage, 0.3, &mut rng);
        assert_eq!(last.state, EngineState::Combusting);
        for _ in 0..500 {
            last = step(&mut s, &p, &mut net, &ullage, 0.3, &mut rng);
        }
        assert!((last.throttle - 1.0).abs() < 1e-12);
        assert!((last.thrust - 200.0).abs() < 1e-6);

        // Cannot be throttled down or shut off
        let idle = step(&mut s, &p, &mut net, &ullage, 0.0, &mut rng);
        assert_eq!(idle.state, EngineState::Combusting);
        assert_eq!(idle.fault, None);
        assert!((idle.thrust - 200.0).abs() < 1e-6);
        assert_eq!(s.state(), EngineState::Combusting);
    }
}
