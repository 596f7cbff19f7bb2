use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::limits::TECH_LEVEL_DISABLED;
use crate::error::ConfigError;
use crate::float_curve::FloatCurve;
use crate::tech_level::TechLevelLadder;

// ==========================================
// Propellants and Resources
// ==========================================

/// One propellant in a configuration's mixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Propellant {
    pub name: String,
    /// Volume ratio in the mixture
    pub ratio: f64,
    /// Mass per unit of resource, in tonnes
    #[serde(default = "default_density")]
    pub density: f64,
    /// Skip throttle response lag when this propellant is in the mixture
    #[serde(default)]
    pub instant_throttle: bool,
    /// Drawn, but excluded from the Isp-weighted flow split
    #[serde(default)]
    pub ignore_for_isp: bool,
}

fn default_density() -> f64 {
    0.001
}

/// A named resource quantity, used for ignitor costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAmount {
    pub name: String,
    pub amount: f64,
}

/// Which field on the driven module holds the thrust figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrustRating {
    MaxThrust,
    ThrusterPower,
}

impl ThrustRating {
    pub fn display_name(&self) -> &'static str {
        match self {
            ThrustRating::MaxThrust => "maxThrust",
            ThrustRating::ThrusterPower => "thrusterPower",
        }
    }
}

/// Kind of engine-like module a configuration drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Engine,
    Rcs,
}

impl ModuleKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ModuleKind::Engine => "Engine",
            ModuleKind::Rcs => "RCS",
        }
    }
}

// ==========================================
// Patchable Fields
// ==========================================

/// Every field a patch is allowed to override.
///
/// All fields are optional so a patch can name only what it changes. Merging
/// is per field and wholesale: a present patch field replaces the base field
/// entirely, including curves and lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceFields {
    #[serde(rename = "propellant", skip_serializing_if = "Option::is_none")]
    pub propellants: Option<Vec<Propellant>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thrust_rating: Option<ThrustRating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_thrust: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_thrust: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atmosphere_curve: Option<FloatCurve>,
    /// Sea-level Isp, used with `isp_vacuum` when no curve is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isp_sea_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isp_vacuum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density_curve: Option<FloatCurve>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity_curve: Option<FloatCurve>,
    /// Apply density/Mach multipliers to Isp instead of flow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curves_affect_isp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_mult_cap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_mult_cap_sharpness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heat_production: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gimbal_range: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chamber_nominal_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech_required: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignitions: Option<i32>,
    #[serde(rename = "ignitor_resource", skip_serializing_if = "Option::is_none")]
    pub ignitor_resources: Option<Vec<ResourceAmount>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ullage: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_fed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rated_burn_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_module: Option<ModuleKind>,
    #[serde(rename = "techlevel", skip_serializing_if = "Option::is_none")]
    pub techlevels: Option<TechLevelLadder>,
}

/// `patch` if set, else `base`.
fn pick<T: Clone>(patch: &Option<T>, base: &Option<T>) -> Option<T> {
    patch.as_ref().or(base.as_ref()).cloned()
}

impl PerformanceFields {
    /// A new field set with `patch` laid over `self`.
    pub fn overlay(&self, patch: &PerformanceFields) -> PerformanceFields {
        PerformanceFields {
            propellants: pick(&patch.propellants, &self.propellants),
            thrust_rating: pick(&patch.thrust_rating, &self.thrust_rating),
            max_thrust: pick(&patch.max_thrust, &self.max_thrust),
            min_thrust: pick(&patch.min_thrust, &self.min_thrust),
            atmosphere_curve: pick(&patch.atmosphere_curve, &self.atmosphere_curve),
            isp_sea_level: pick(&patch.isp_sea_level, &self.isp_sea_level),
            isp_vacuum: pick(&patch.isp_vacuum, &self.isp_vacuum),
            density_curve: pick(&patch.density_curve, &self.density_curve),
            velocity_curve: pick(&patch.velocity_curve, &self.velocity_curve),
            curves_affect_isp: pick(&patch.curves_affect_isp, &self.curves_affect_isp),
            flow_mult_cap: pick(&patch.flow_mult_cap, &self.flow_mult_cap),
            flow_mult_cap_sharpness: pick(&patch.flow_mult_cap_sharpness, &self.flow_mult_cap_sharpness),
            heat_production: pick(&patch.heat_production, &self.heat_production),
            gimbal_range: pick(&patch.gimbal_range, &self.gimbal_range),
            chamber_nominal_temp: pick(&patch.chamber_nominal_temp, &self.chamber_nominal_temp),
            tech_required: pick(&patch.tech_required, &self.tech_required),
            ignitions: pick(&patch.ignitions, &self.ignitions),
            ignitor_resources: pick(&patch.ignitor_resources, &self.ignitor_resources),
            ullage: pick(&patch.ullage, &self.ullage),
            pressure_fed: pick(&patch.pressure_fed, &self.pressure_fed),
            rated_burn_time: pick(&patch.rated_burn_time, &self.rated_burn_time),
            linked_module: pick(&patch.linked_module, &self.linked_module),
            techlevels: pick(&patch.techlevels, &self.techlevels),
        }
    }
}

// ==========================================
// Configurations and Patches
// ==========================================

/// A named delta over a configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub name: String,
    /// Added to the base cost before tech-level scaling
    #[serde(default, rename = "cost")]
    pub cost_offset: i32,
    #[serde(flatten)]
    pub fields: PerformanceFields,
}

/// A named, swappable performance profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub name: String,
    #[serde(default)]
    pub cost: f64,
    #[serde(flatten)]
    pub fields: PerformanceFields,
    #[serde(default, rename = "patch", skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<ConfigPatch>,
}

impl EngineConfig {
    pub fn find_patch(&self, name: &str) -> Option<&ConfigPatch> {
        self.patches.iter().find(|p| p.name == name)
    }

    /// A fully independent configuration with `patch` applied.
    ///
    /// The result carries no patches of its own and shares nothing with `self`.
    pub fn with_patch(&self, patch: &ConfigPatch) -> EngineConfig {
        EngineConfig {
            name: self.name.clone(),
            cost: self.cost + patch.cost_offset as f64,
            fields: self.fields.overlay(&patch.fields),
            patches: Vec::new(),
        }
    }

    /// A copy without child patches.
    pub fn detached(&self) -> EngineConfig {
        EngineConfig {
            name: self.name.clone(),
            cost: self.cost,
            fields: self.fields.clone(),
            patches: Vec::new(),
        }
    }

    pub fn tech_required(&self) -> Option<&str> {
        self.fields.tech_required.as_deref().filter(|t| !t.is_empty())
    }
}

// ==========================================
// Configuration Store
// ==========================================

/// Ordered, immutable list of configurations for one part type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<EngineConfig>", into = "Vec<EngineConfig>")]
pub struct ConfigurationStore {
    configs: Vec<EngineConfig>,
}

impl ConfigurationStore {
    /// Build a store, rejecting duplicate names.
    pub fn new(configs: Vec<EngineConfig>) -> Result<Self, ConfigError> {
        for (i, config) in configs.iter().enumerate() {
            if configs[..i].iter().any(|c| c.name == config.name) {
                return Err(ConfigError::DuplicateConfiguration(config.name.clone()));
            }
        }
        Ok(Self { configs })
    }

    pub fn find(&self, name: &str) -> Option<&EngineConfig> {
        self.configs.iter().find(|c| c.name == name)
    }

    pub fn first(&self) -> Option<&EngineConfig> {
        self.configs.first()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EngineConfig> {
        self.configs.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.configs.iter().map(|c| c.name.as_str()).collect()
    }
}

impl TryFrom<Vec<EngineConfig>> for ConfigurationStore {
    type Error = ConfigError;

    fn try_from(configs: Vec<EngineConfig>) -> Result<Self, Self::Error> {
        ConfigurationStore::new(configs)
    }
}

impl From<ConfigurationStore> for Vec<EngineConfig> {
    fn from(store: ConfigurationStore) -> Self {
        store.configs
    }
}

// ==========================================
// Part-Type Template
// ==========================================

/// Template data for one engine part type, shared by every instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineModuleDef {
    pub name: String,
    /// Tech ladder tag, e.g. "L", "U", or "S" for solids
    pub engine_type: String,
    #[serde(default)]
    pub part_cost: f64,
    /// Dry mass the tech-level mass ratio is applied to, in tonnes
    #[serde(default)]
    pub base_mass: Option<f64>,
    #[serde(default)]
    pub gimbal_transform: bool,
    #[serde(default)]
    pub gimbal_override: bool,
    #[serde(default)]
    pub constant_mass: bool,
    /// Starting tech level; -1 disables tech levels
    #[serde(default = "disabled_level")]
    pub tech_level: i32,
    /// Level the configuration numbers are written for
    #[serde(default = "disabled_level")]
    pub orig_tech_level: i32,
    #[serde(default)]
    pub min_tech_level: Option<i32>,
    #[serde(default)]
    pub max_tech_level: Option<i32>,
    #[serde(default, rename = "techlevel")]
    pub techlevels: Option<TechLevelLadder>,
    /// Treat a configured ignition count of 0 as zero instead of unlimited
    #[serde(default)]
    pub literal_zero_ignitions: bool,
    #[serde(default)]
    pub auto_cutoff: bool,
    #[serde(default)]
    pub default_config: Option<String>,
    #[serde(rename = "config")]
    pub configs: ConfigurationStore,
}

fn disabled_level() -> i32 {
    TECH_LEVEL_DISABLED
}

impl EngineModuleDef {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let def: EngineModuleDef = toml::from_str(contents)?;
        if def.configs.is_empty() {
            return Err(ConfigError::EmptyStore(def.name));
        }
        Ok(def)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Level the stored numbers were authored for. Falls back to the
    /// starting level when not given.
    pub fn origin_tech_level(&self) -> i32 {
        if self.orig_tech_level == TECH_LEVEL_DISABLED {
            self.tech_level
        } else {
            self.orig_tech_level
        }
    }

    /// Configuration selected on a fresh instance.
    pub fn initial_config_name(&self) -> Option<&str> {
        self.default_config
            .as_deref()
            .filter(|name| self.configs.find(name).is_some())
            .or_else(|| self.configs.first().map(|c| c.name.as_str()))
    }
}
