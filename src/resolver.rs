use log::warn;

use crate::balance::{self, PropulsionClass};
use crate::config::{EngineConfig, EngineModuleDef, ModuleKind, Propellant, ResourceAmount, ThrustRating};
use crate::engine::limits::{TECH_LEVEL_DISABLED, UNLIMITED_IGNITIONS};
use crate::engine::physics::DEFAULT_CHAMBER_TEMP_K;
use crate::error::EngineError;
use crate::float_curve::FloatCurve;
use crate::tech_level::{TechLevelSource, TechLevelTable};

/// Fully resolved numbers for one configuration at one tech level.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParameters {
    pub config_name: String,
    /// Patch applied on top of the configuration, if any
    pub patch_name: Option<String>,
    pub engine_type: String,
    pub propulsion_class: PropulsionClass,
    pub tech_level: i32,
    pub thrust_rating: Option<ThrustRating>,
    /// Max thrust in kN
    pub max_thrust: f64,
    /// Min thrust in kN
    pub min_thrust: f64,
    /// Isp (s) vs. ambient pressure (atm)
    pub atmosphere_curve: FloatCurve,
    pub density_curve: Option<FloatCurve>,
    pub velocity_curve: Option<FloatCurve>,
    pub curves_affect_isp: bool,
    pub flow_mult_cap: f64,
    pub flow_mult_cap_sharpness: f64,
    pub heat_production: f64,
    pub gimbal_range: Option<f64>,
    pub cost: f64,
    /// Scaled dry mass, when the part records a baseline
    pub mass: Option<f64>,
    /// Difference from the baseline mass
    pub mass_delta: f64,
    pub propellants: Vec<Propellant>,
    /// Ignitions per flight, -1 for unlimited
    pub ignitions: i32,
    pub ignitor_resources: Vec<ResourceAmount>,
    pub ullage: bool,
    pub pressure_fed: bool,
    pub rated_burn_time: Option<f64>,
    pub chamber_nominal_temp: f64,
    pub tech_required: Option<String>,
    pub linked_module: Option<ModuleKind>,
    pub auto_cutoff: bool,
}

impl ResolvedParameters {
    /// Whether any propellant bypasses throttle response.
    pub fn instant_throttle(&self) -> bool {
        self.propulsion_class == PropulsionClass::Solid || self.propellants.iter().any(|p| p.instant_throttle)
    }

    pub fn has_unlimited_ignitions(&self) -> bool {
        self.ignitions == UNLIMITED_IGNITIONS
    }
}

/// Output of a resolution: the parameters plus any recoverable problems
/// met along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub parameters: ResolvedParameters,
    pub notices: Vec<EngineError>,
}

/// Tech data source for a merged configuration on a module.
pub fn tech_source<'a>(
    def: &'a EngineModuleDef,
    config: &'a EngineConfig,
    table: &'a TechLevelTable,
) -> TechLevelSource<'a> {
    TechLevelSource::new(&def.engine_type, table)
        .with_config_levels(config.fields.techlevels.as_ref())
        .with_module_levels(def.techlevels.as_ref())
}

/// Resolve `config_name` (with an optional patch) at `tech_level`.
///
/// A missing configuration falls back to the first one in the store and a
/// missing patch is skipped. Both are reported as notices.
pub fn resolve(
    def: &EngineModuleDef,
    table: &TechLevelTable,
    config_name: &str,
    patch_name: Option<&str>,
    tech_level: i32,
    orig_tech_level: i32,
) -> Result<Resolution, EngineError> {
    let first = def.configs.first().ok_or(EngineError::EmptyConfigurationStore)?;
    let mut notices = Vec::new();

    let base = match def.configs.find(config_name) {
        Some(config) => config,
        None => {
            warn!("configuration '{}' not found on '{}', using '{}'", config_name, def.name, first.name);
            notices.push(EngineError::ConfigurationNotFound {
                requested: config_name.to_string(),
                fallback: first.name.clone(),
            });
            first
        }
    };

    let (merged, applied_patch) = match patch_name.filter(|p| !p.is_empty()) {
        Some(name) => match base.find_patch(name) {
            Some(patch) => (base.with_patch(patch), Some(name.to_string())),
            None => {
                warn!("patch '{}' not found on configuration '{}'", name, base.name);
                notices.push(EngineError::PatchNotFound { config: base.name.clone(), patch: name.to_string() });
                (base.detached(), None)
            }
        },
        None => (base.detached(), None),
    };

    let mut resolution = resolve_config(def, table, &merged, tech_level, orig_tech_level);
    resolution.parameters.patch_name = applied_patch;
    notices.append(&mut resolution.notices);
    resolution.notices = notices;
    Ok(resolution)
}

/// Resolve an already-merged configuration.
pub fn resolve_config(
    def: &EngineModuleDef,
    table: &TechLevelTable,
    config: &EngineConfig,
    tech_level: i32,
    orig_tech_level: i32,
) -> Resolution {
    let fields = &config.fields;
    let mut notices = Vec::new();

    let mut max_thrust = fields.max_thrust.unwrap_or(0.0);
    let mut min_thrust = fields.min_thrust.unwrap_or(0.0);
    let mut heat_production = fields.heat_production.unwrap_or(0.0);
    let mut cost = config.cost;
    let mut gimbal_range = fields.gimbal_range;
    let mut velocity_curve = fields.velocity_curve.clone();
    let mut mass = def.base_mass;
    let mut shape = None;

    if tech_level != TECH_LEVEL_DISABLED {
        let source = tech_source(def, config, table);
        for level in [tech_level, orig_tech_level] {
            if let Some(missing) = source.missing(level) {
                if !notices.contains(&missing) {
                    notices.push(missing);
                }
            }
        }

        let thrust_ratio = source.thrust(tech_level, orig_tech_level, def.constant_mass);
        if fields.thrust_rating.is_some() {
            max_thrust *= thrust_ratio;
            min_thrust *= thrust_ratio;
            if let Some(floor) = source.throttle(tech_level).filter(|f| *f > 0.0) {
                min_thrust = min_thrust.max(max_thrust * floor);
            }
        }
        heat_production *= thrust_ratio;
        cost = source.cost(tech_level, orig_tech_level, def.part_cost, cost);

        if let Some(base_mass) = def.base_mass {
            mass = Some(base_mass * source.mass(tech_level, orig_tech_level));
        }

        if let Some(entry) = source.lookup(tech_level) {
            if fields.gimbal_range.is_none() && (def.gimbal_transform || def.gimbal_override) {
                gimbal_range = entry.gimbal_range.or(gimbal_range);
            }
            if velocity_curve.is_none() {
                velocity_curve = entry.velocity_curve.clone();
            }
            shape = Some(&entry.atmosphere_curve);
        }
    }

    let atmosphere_curve = match (&fields.atmosphere_curve, fields.isp_sea_level, fields.isp_vacuum) {
        (Some(curve), _, _) => curve.clone(),
        (None, Some(sl), Some(vac)) => synthesize_isp_curve(sl, vac, shape),
        (None, _, _) => shape.cloned().unwrap_or_default(),
    };

    let ignitions = match fields.ignitions {
        Some(0) if !def.literal_zero_ignitions => UNLIMITED_IGNITIONS,
        Some(n) => n,
        None => UNLIMITED_IGNITIONS,
    };

    let pressure_fed = fields.pressure_fed.unwrap_or(false);
    let mass_delta = match (mass, def.base_mass) {
        (Some(m), Some(base)) => m - base,
        _ => 0.0,
    };

    let parameters = ResolvedParameters {
        config_name: config.name.clone(),
        patch_name: None,
        engine_type: def.engine_type.clone(),
        propulsion_class: PropulsionClass::classify(&def.engine_type, pressure_fed),
        tech_level,
        thrust_rating: fields.thrust_rating,
        max_thrust,
        min_thrust: min_thrust.min(max_thrust),
        atmosphere_curve,
        density_curve: fields.density_curve.clone(),
        velocity_curve,
        curves_affect_isp: fields.curves_affect_isp.unwrap_or(false),
        flow_mult_cap: fields.flow_mult_cap.unwrap_or(balance::FLOW_MULT_CAP),
        flow_mult_cap_sharpness: fields.flow_mult_cap_sharpness.unwrap_or(balance::FLOW_MULT_CAP_SHARPNESS),
        heat_production,
        gimbal_range,
        cost,
        mass,
        mass_delta,
        propellants: fields.propellants.clone().unwrap_or_default(),
        ignitions,
        ignitor_resources: fields.ignitor_resources.clone().unwrap_or_default(),
        ullage: fields.ullage.unwrap_or(false),
        pressure_fed,
        rated_burn_time: fields.rated_burn_time,
        chamber_nominal_temp: fields.chamber_nominal_temp.unwrap_or(DEFAULT_CHAMBER_TEMP_K),
        tech_required: config.tech_required().map(str::to_string),
        linked_module: fields.linked_module,
        auto_cutoff: def.auto_cutoff,
    };

    Resolution { parameters, notices }
}

/// Build an Isp curve from sea-level and vacuum scalars.
///
/// With a tech-level curve, each key keeps the curve's shape but is rescaled
/// so the result hits `isp_vacuum` at 0 atm and `isp_sea_level` at 1 atm,
/// blending the two by atmospheric fraction in between. Without one the
/// result is the straight line between the two scalars.
pub fn synthesize_isp_curve(isp_sea_level: f64, isp_vacuum: f64, shape: Option<&FloatCurve>) -> FloatCurve {
    let shape = match shape.filter(|c| !c.is_empty()) {
        Some(shape) => shape,
        None => return FloatCurve::from_points(&[(0.0, isp_vacuum), (1.0, isp_sea_level)]),
    };
    let tl_vacuum = shape.evaluate(0.0);
    let tl_sea_level = shape.evaluate(1.0);

    shape.map_values(|pressure, value| {
        let atmo = pressure.clamp(0.0, 1.0);
        let reference = tl_sea_level * atmo + tl_vacuum * (1.0 - atmo);
        if reference <= 0.0 {
            value
        } else {
            value * (isp_sea_level * atmo + isp_vacuum * (1.0 - atmo)) / reference
        }
    })
}
