use crate::balance::soft_cap;
use crate::config::Propellant;
use crate::engine::physics::{DEFAULT_AMBIENT_TEMP_K, DENSITY_CURVE_SCALE, G0, SEA_LEVEL_DENSITY};
use crate::resolver::ResolvedParameters;
use crate::variance::NoiseSample;

/// Ambient conditions for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    /// Static pressure in atmospheres
    pub pressure_atm: f64,
    /// Air density in kg/m³
    pub density: f64,
    pub mach: f64,
    /// Ambient temperature in K
    pub ambient_temp: f64,
    /// Vessel mass in tonnes
    pub vessel_mass: f64,
    /// Held by launch clamps
    pub clamped: bool,
}

impl Environment {
    pub fn vacuum() -> Self {
        Self {
            pressure_atm: 0.0,
            density: 0.0,
            mach: 0.0,
            ambient_temp: DEFAULT_AMBIENT_TEMP_K,
            vessel_mass: 1.0,
            clamped: false,
        }
    }

    pub fn sea_level() -> Self {
        Self {
            pressure_atm: 1.0,
            density: SEA_LEVEL_DENSITY,
            ..Self::vacuum()
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::vacuum()
    }
}

/// Engine output before propellant availability is applied.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Performance {
    /// kN
    pub thrust: f64,
    /// s
    pub isp: f64,
    /// t/s
    pub mass_flow: f64,
    /// Density/Mach multiplier after the soft cap
    pub flow_multiplier: f64,
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Mass flow in t/s that produces `thrust` kN at `isp` seconds.
pub fn fuel_flow(thrust: f64, isp: f64) -> f64 {
    if isp <= 0.0 {
        0.0
    } else {
        thrust / (isp * G0)
    }
}

/// Combined density and Mach multiplier, soft-capped.
pub fn flow_multiplier(params: &ResolvedParameters, env: &Environment) -> f64 {
    let mut mult = 1.0;
    if let Some(curve) = &params.density_curve {
        mult *= curve.evaluate(env.density * DENSITY_CURVE_SCALE);
    }
    if let Some(curve) = &params.velocity_curve {
        mult *= curve.evaluate(env.mach);
    }
    soft_cap(mult, params.flow_mult_cap, params.flow_mult_cap_sharpness)
}

/// Evaluate thrust, Isp and mass flow at delivered `throttle`.
///
/// Flow limits come from the vacuum Isp so that the rated thrust figures are
/// vacuum figures. Zero throttle means the engine is not running.
pub fn evaluate(params: &ResolvedParameters, env: &Environment, throttle: f64, noise: NoiseSample) -> Performance {
    if throttle <= 0.0 {
        return Performance::default();
    }

    let vacuum_isp = params.atmosphere_curve.evaluate(0.0);
    let min_flow = fuel_flow(params.min_thrust, vacuum_isp);
    let max_flow = fuel_flow(params.max_thrust, vacuum_isp);
    let multiplier = flow_multiplier(params, env);

    let mut isp = params.atmosphere_curve.evaluate(env.pressure_atm) * noise.isp;
    let mut mass_flow = lerp(min_flow, max_flow, throttle.min(1.0)) * noise.flow;
    if params.curves_affect_isp {
        isp *= multiplier;
    } else {
        mass_flow *= multiplier;
    }

    Performance {
        thrust: (mass_flow * isp * G0).max(0.0),
        isp,
        mass_flow,
        flow_multiplier: multiplier,
    }
}

/// Units of each propellant needed for `mass` tonnes of mixture.
///
/// The split is by volume ratio, weighted by density to convert the mass
/// budget back into units. `mixture_ratio` biases the first propellant
/// against the others while keeping total mass constant. Propellants marked
/// `ignore_for_isp` are drawn in ratio but carry none of the mass budget.
pub fn propellant_demand(propellants: &[Propellant], mass: f64, mixture_ratio: f64) -> Vec<f64> {
    let ratios: Vec<f64> = propellants
        .iter()
        .enumerate()
        .map(|(i, p)| if i == 0 { p.ratio * mixture_ratio } else { p.ratio })
        .collect();
    let mass_per_mix: f64 = propellants
        .iter()
        .zip(&ratios)
        .filter(|(p, _)| !p.ignore_for_isp)
        .map(|(p, r)| r * p.density)
        .sum();
    if mass_per_mix <= 0.0 {
        return vec![0.0; propellants.len()];
    }
    let mixes = mass / mass_per_mix;
    ratios.iter().map(|r| r * mixes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::{self, PropulsionClass};
    use crate::float_curve::FloatCurve;

    fn params() -> ResolvedParameters {
        ResolvedParameters {
            config_name: "Test".to_string(),
            patch_name: None,
            engine_type: "L".to_string(),
            propulsion_class: PropulsionClass::Liquid,
            tech_level: -1,
            thrust_rating: None,
            max_thrust: 100.0,
            min_thrust: 40.0,
            atmosphere_curve: FloatCurve::from_points(&[(0.0, 350.0), (1.0, 300.0)]),
            density_curve: None,
            velocity_curve: None,
            curves_affect_isp: false,
            flow_mult_cap: balance::FLOW_MULT_CAP,
            flow_mult_cap_sharpness: balance::FLOW_MULT_CAP_SHARPNESS,
            heat_production: 100.0,
            gimbal_range: None,
            cost: 0.0,
            mass: None,
            mass_delta: 0.0,
            propellants: Vec::new(),
            ignitions: -1,
            ignitor_resources: Vec::new(),
            ullage: false,
            pressure_fed: false,
            rated_burn_time: None,
            chamber_nominal_temp: 3000.0,
            tech_required: None,
            linked_module: None,
            auto_cutoff: false,
        }
    }

    #[test]
    fn test_full_throttle_vacuum_hits_rated_thrust() {
        let perf = evaluate(&params(), &Environment::vacuum(), 1.0, NoiseSample::neutral());
        assert!((perf.thrust - 100.0).abs() < 1e-9);
        assert!((perf.isp - 350.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_throttle_hits_min_thrust() {
        let perf = evaluate(&params(), &Environment::vacuum(), 1e-9, NoiseSample::neutral());
        assert!((perf.thrust - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_sea_level_loses_thrust_at_same_flow() {
        let vac = evaluate(&params(), &Environment::vacuum(), 1.0, NoiseSample::neutral());
        let sl = evaluate(&params(), &Environment::sea_level(), 1.0, NoiseSample::neutral());
        assert!((vac.mass_flow - sl.mass_flow).abs() < 1e-12);
        assert!((sl.thrust / vac.thrust - 300.0 / 350.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_throttle_is_off() {
        assert_eq!(evaluate(&params(), &Environment::vacuum(), 0.0, NoiseSample::neutral()), Performance::default());
    }

    #[test]
    fn test_multiplier_targets_flow_or_isp() {
        let mut p = params();
        p.velocity_curve = Some(FloatCurve::from_points(&[(0.0, 1.0), (2.0, 1.5)]));
        let env = Environment { mach: 2.0, ..Environment::vacuum() };

        let flow_mode = evaluate(&p, &env, 1.0, NoiseSample::neutral());
        assert!((flow_mode.isp - 350.0).abs() < 1e-9);
        assert!((flow_mode.thrust - 150.0).abs() < 1e-9);

        p.curves_affect_isp = true;
        let isp_mode = evaluate(&p, &env, 1.0, NoiseSample::neutral());
        assert!((isp_mode.isp - 525.0).abs() < 1e-9);
        assert!((isp_mode.thrust - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_density_curve_uses_scaled_density() {
        let mut p = params();
        p.density_curve = Some(FloatCurve::from_points(&[(0.0, 0.5), (1.0, 1.0)]));
        let env = Environment { density: 1.225, ..Environment::vacuum() };
        let expected = FloatCurve::from_points(&[(0.0, 0.5), (1.0, 1.0)]).evaluate(1.225 * 40.0 / 49.0);
        assert!((flow_multiplier(&p, &env) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_multiplier_soft_cap() {
        let mut p = params();
        p.velocity_curve = Some(FloatCurve::constant(50.0));
        p.flow_mult_cap = 2.0;
        let m = flow_multiplier(&p, &Environment::vacuum());
        assert!(m > 2.0 && m < 4.0);
    }

    #[test]
    fn test_propellant_demand_splits_by_volume() {
        let props = vec![
            Propellant { name: "A".into(), ratio: 0.5, density: 0.001, instant_throttle: false, ignore_for_isp: false },
            Propellant { name: "B".into(), ratio: 0.5, density: 0.003, instant_throttle: false, ignore_for_isp: false },
        ];
        let demand = propellant_demand(&props, 0.004, 1.0);
        assert!((demand[0] - 1.0).abs() < 1e-12);
        assert!((demand[1] - 1.0).abs() < 1e-12);

        let biased = propellant_demand(&props, 0.004, 1.1);
        let mass: f64 = biased[0] * 0.001 + biased[1] * 0.003;
        assert!((mass - 0.004).abs() < 1e-12);
        assert!(biased[0] / biased[1] > 1.0);
    }

    #[test]
    fn test_ignored_propellant_carries_no_mass() {
        let props = vec![
            Propellant { name: "A".into(), ratio: 1.0, density: 0.002, instant_throttle: false, ignore_for_isp: false },
            Propellant { name: "EC".into(), ratio: 10.0, density: 0.0, instant_throttle: false, ignore_for_isp: true },
        ];
        let demand = propellant_demand(&props, 0.004, 1.0);
        assert!((demand[0] - 2.0).abs() < 1e-12);
        assert!((demand[1] - 20.0).abs() < 1e-12);
    }
}
