use std::collections::BTreeMap;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::balance::is_solid_engine_type;
use crate::collaborators::ResearchGate;
use crate::error::{ConfigError, EngineError};
use crate::float_curve::FloatCurve;
use crate::settings::Settings;

/// One rung of a tech-level ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechLevelEntry {
    pub level: i32,
    /// Isp vs. pressure (atm) at this level
    pub atmosphere_curve: FloatCurve,
    #[serde(default)]
    pub velocity_curve: Option<FloatCurve>,
    /// Thrust-to-weight ratio
    #[serde(default)]
    pub twr: f64,
    #[serde(default)]
    pub thrust_mult: Option<f64>,
    #[serde(default)]
    pub mass_mult: Option<f64>,
    /// Minimum throttle floor. Zero is a real value meaning "no floor".
    #[serde(default)]
    pub min_throttle_mult: Option<f64>,
    #[serde(default)]
    pub gimbal_range: Option<f64>,
    #[serde(default = "default_cost_mult")]
    pub cost_mult: f64,
    #[serde(default)]
    pub tech_required: String,
}

fn default_cost_mult() -> f64 {
    1.0
}

impl TechLevelEntry {
    /// Isp at zero ambient pressure.
    pub fn vacuum_isp(&self) -> f64 {
        self.atmosphere_curve.evaluate(0.0)
    }

    /// Isp at one atmosphere.
    pub fn sea_level_isp(&self) -> f64 {
        self.atmosphere_curve.evaluate(1.0)
    }
}

// ==========================================
// Multiplier Math
// ==========================================

/// Thrust multiplier going from `old` to `new`.
///
/// Explicit thrust multipliers win when both are positive. Otherwise the TWR
/// ratio is used, corrected by the vacuum Isp ratio unless the engine keeps
/// constant mass: TWR alone folds the Isp change into thrust.
pub fn thrust_ratio(new: &TechLevelEntry, old: &TechLevelEntry, constant_mass: bool) -> f64 {
    if let (Some(n), Some(o)) = (new.thrust_mult, old.thrust_mult) {
        if n > 0.0 && o > 0.0 {
            return n / o;
        }
    }
    if new.twr <= 0.0 || old.twr <= 0.0 {
        return 1.0;
    }
    let mut ratio = new.twr / old.twr;
    if !constant_mass {
        let (new_vac, old_vac) = (new.vacuum_isp(), old.vacuum_isp());
        if new_vac > 0.0 && old_vac > 0.0 {
            ratio *= old_vac / new_vac;
        }
    }
    ratio
}

/// Mass multiplier going from `old` to `new`.
///
/// Liquids get lighter in proportion to the vacuum Isp gain; solids scale by
/// the inverse TWR ratio.
pub fn mass_ratio(new: &TechLevelEntry, old: &TechLevelEntry, solid: bool) -> f64 {
    if let (Some(n), Some(o)) = (new.mass_mult, old.mass_mult) {
        if n > 0.0 && o > 0.0 {
            return n / o;
        }
    }
    if solid {
        if new.twr > 0.0 && old.twr > 0.0 {
            old.twr / new.twr
        } else {
            1.0
        }
    } else {
        let (new_vac, old_vac) = (new.vacuum_isp(), old.vacuum_isp());
        if new_vac > 0.0 && old_vac > 0.0 {
            old_vac / new_vac
        } else {
            1.0
        }
    }
}

/// Per-module cost after scaling.
///
/// Cost multipliers apply to the whole part, so the configuration's own cost
/// is added to the part cost, scaled, and the part cost is taken back out.
pub fn scaled_cost(part_cost: f64, config_cost: f64, new: &TechLevelEntry, old: &TechLevelEntry) -> f64 {
    if old.cost_mult <= 0.0 {
        return config_cost;
    }
    (part_cost + config_cost) * (new.cost_mult / old.cost_mult) - part_cost
}

/// Minimum throttle floor at `new`, clamped to `[0, 1]`.
pub fn throttle_floor(new: &TechLevelEntry) -> Option<f64> {
    new.min_throttle_mult.map(|t| t.clamp(0.0, 1.0))
}

// ==========================================
// Ladders
// ==========================================

/// Entries for one engine type, keyed by level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<TechLevelEntry>", into = "Vec<TechLevelEntry>")]
pub struct TechLevelLadder {
    entries: BTreeMap<i32, TechLevelEntry>,
}

impl TechLevelLadder {
    pub fn new() -> Self {
        Self { entries: BTreeMap::new() }
    }

    pub fn insert(&mut self, entry: TechLevelEntry) {
        self.entries.insert(entry.level, entry);
    }

    pub fn get(&self, level: i32) -> Option<&TechLevelEntry> {
        self.entries.get(&level)
    }

    pub fn contains(&self, level: i32) -> bool {
        self.entries.contains_key(&level)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TechLevelEntry> {
        self.entries.values()
    }

    /// Level the contiguous scan starts from: 0 when present, else the lowest key.
    fn anchor(&self) -> Option<i32> {
        if self.contains(0) {
            Some(0)
        } else {
            self.entries.keys().next().copied()
        }
    }

    /// Highest level reachable from the anchor without gaps.
    pub fn max_level(&self) -> Option<i32> {
        let mut level = self.anchor()?;
        while self.contains(level + 1) {
            level += 1;
        }
        Some(level)
    }

    /// Lowest level reachable from the anchor without gaps.
    pub fn min_level(&self) -> Option<i32> {
        let mut level = self.anchor()?;
        while self.contains(level - 1) {
            level -= 1;
        }
        Some(level)
    }
}

impl From<Vec<TechLevelEntry>> for TechLevelLadder {
    fn from(entries: Vec<TechLevelEntry>) -> Self {
        let mut ladder = TechLevelLadder::new();
        for entry in entries {
            ladder.insert(entry);
        }
        ladder
    }
}

impl From<TechLevelLadder> for Vec<TechLevelEntry> {
    fn from(ladder: TechLevelLadder) -> Self {
        ladder.entries.into_values().collect()
    }
}

// ==========================================
// Global Table
// ==========================================

/// Global ladders keyed by engine type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TechLevelTable {
    ladders: BTreeMap<String, TechLevelLadder>,
}

/// Legacy numbered-suffix keys, e.g. `TLISP2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegacyField {
    Isp,
    Twr,
    Throttle,
    Thrust,
    Mass,
    Gimbal,
    Cost,
    Velocity,
    Tech,
}

const LEGACY_PREFIXES: [(&str, LegacyField); 9] = [
    ("TLTHROTTLE", LegacyField::Throttle),
    ("TLTHRUST", LegacyField::Thrust),
    ("TLGIMBAL", LegacyField::Gimbal),
    ("TLCOST", LegacyField::Cost),
    ("TLTECH", LegacyField::Tech),
    ("TLMASS", LegacyField::Mass),
    ("TLISP", LegacyField::Isp),
    ("TLTWR", LegacyField::Twr),
    ("TLVEL", LegacyField::Velocity),
];

fn split_legacy_key(key: &str) -> Option<(LegacyField, i32)> {
    LEGACY_PREFIXES.iter().find_map(|(prefix, field)| {
        key.strip_prefix(prefix)
            .and_then(|suffix| suffix.parse::<i32>().ok())
            .map(|level| (*field, level))
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LegacyValue {
    Number(f64),
    Curve(Vec<Vec<f64>>),
    Text(String),
}

#[derive(Debug, Default)]
struct LegacyLevel {
    isp: Option<FloatCurve>,
    velocity: Option<FloatCurve>,
    twr: Option<f64>,
    throttle: Option<f64>,
    thrust: Option<f64>,
    mass: Option<f64>,
    gimbal: Option<f64>,
    cost: Option<f64>,
    tech: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTable {
    #[serde(default)]
    engine_type: BTreeMap<String, Vec<TechLevelEntry>>,
    #[serde(default)]
    legacy: BTreeMap<String, BTreeMap<String, LegacyValue>>,
}

fn parse_legacy(
    engine_type: &str,
    keys: &BTreeMap<String, LegacyValue>,
) -> Result<TechLevelLadder, ConfigError> {
    let mut levels: BTreeMap<i32, LegacyLevel> = BTreeMap::new();
    for (key, value) in keys {
        let (field, level) =
            split_legacy_key(key).ok_or_else(|| ConfigError::MalformedLegacyKey(key.clone()))?;
        let slot = levels.entry(level).or_default();
        match (field, value) {
            (LegacyField::Isp, LegacyValue::Curve(c)) => slot.isp = Some(FloatCurve::try_from(c.clone())?),
            (LegacyField::Velocity, LegacyValue::Curve(c)) => {
                slot.velocity = Some(FloatCurve::try_from(c.clone())?)
            }
            (LegacyField::Twr, LegacyValue::Number(n)) => slot.twr = Some(*n),
            (LegacyField::Throttle, LegacyValue::Number(n)) => slot.throttle = Some(*n),
            (LegacyField::Thrust, LegacyValue::Number(n)) => slot.thrust = Some(*n),
            (LegacyField::Mass, LegacyValue::Number(n)) => slot.mass = Some(*n),
            (LegacyField::Gimbal, LegacyValue::Number(n)) => slot.gimbal = Some(*n),
            (LegacyField::Cost, LegacyValue::Number(n)) => slot.cost = Some(*n),
            (LegacyField::Tech, LegacyValue::Text(s)) => slot.tech = Some(s.clone()),
            _ => return Err(ConfigError::MalformedLegacyKey(key.clone())),
        }
    }

    let mut ladder = TechLevelLadder::new();
    for (level, raw) in levels {
        let atmosphere_curve = raw.isp.ok_or_else(|| ConfigError::MissingLegacyIsp {
            engine_type: engine_type.to_string(),
            level,
        })?;
        ladder.insert(TechLevelEntry {
            level,
            atmosphere_curve,
            velocity_curve: raw.velocity,
            twr: raw.twr.unwrap_or(0.0),
            thrust_mult: raw.thrust,
            mass_mult: raw.mass,
            min_throttle_mult: raw.throttle,
            gimbal_range: raw.gimbal,
            cost_mult: raw.cost.unwrap_or(1.0),
            tech_required: raw.tech.unwrap_or_default(),
        });
    }
    Ok(ladder)
}

impl TechLevelTable {
    pub fn new() -> Self {
        Self { ladders: BTreeMap::new() }
    }

    pub fn insert_ladder(&mut self, engine_type: &str, ladder: TechLevelLadder) {
        self.ladders.insert(engine_type.to_string(), ladder);
    }

    pub fn ladder(&self, engine_type: &str) -> Option<&TechLevelLadder> {
        self.ladders.get(engine_type)
    }

    /// Parse a table from TOML. Full records live under `[[engine_type.X]]`;
    /// legacy flat keys live under `[legacy.X]`. Full records win when both
    /// declare the same level.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawTable = toml::from_str(contents)?;
        let mut table = TechLevelTable::new();
        for (engine_type, keys) in &raw.legacy {
            table.insert_ladder(engine_type, parse_legacy(engine_type, keys)?);
        }
        for (engine_type, entries) in raw.engine_type {
            let ladder = table.ladders.entry(engine_type).or_default();
            for entry in entries {
                ladder.insert(entry);
            }
        }
        Ok(table)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

// ==========================================
// Three-Tier Lookup
// ==========================================

/// Where tech-level data comes from for one engine configuration.
///
/// Lookups try the configuration's own ladder, then the module's, then the
/// global table for `engine_type`.
#[derive(Debug, Clone, Copy)]
pub struct TechLevelSource<'a> {
    pub engine_type: &'a str,
    pub config_levels: Option<&'a TechLevelLadder>,
    pub module_levels: Option<&'a TechLevelLadder>,
    pub global: &'a TechLevelTable,
}

impl<'a> TechLevelSource<'a> {
    pub fn new(engine_type: &'a str, global: &'a TechLevelTable) -> Self {
        Self { engine_type, config_levels: None, module_levels: None, global }
    }

    pub fn with_config_levels(mut self, ladder: Option<&'a TechLevelLadder>) -> Self {
        self.config_levels = ladder.filter(|l| !l.is_empty());
        self
    }

    pub fn with_module_levels(mut self, ladder: Option<&'a TechLevelLadder>) -> Self {
        self.module_levels = ladder.filter(|l| !l.is_empty());
        self
    }

    pub fn is_solid(&self) -> bool {
        is_solid_engine_type(self.engine_type)
    }

    pub fn lookup(&self, level: i32) -> Option<&'a TechLevelEntry> {
        self.config_levels
            .and_then(|l| l.get(level))
            .or_else(|| self.module_levels.and_then(|l| l.get(level)))
            .or_else(|| self.global.ladder(self.engine_type).and_then(|l| l.get(level)))
    }

    /// The ladder whose bounds govern min/max queries.
    fn tier_in_effect(&self) -> Option<&'a TechLevelLadder> {
        self.config_levels
            .or(self.module_levels)
            .or_else(|| self.global.ladder(self.engine_type).filter(|l| !l.is_empty()))
    }

    pub fn max_level(&self) -> Option<i32> {
        self.tier_in_effect().and_then(|l| l.max_level())
    }

    pub fn min_level(&self) -> Option<i32> {
        self.tier_in_effect().and_then(|l| l.min_level())
    }

    /// `TechLevelDataMissing` for `level`, if it cannot be resolved.
    pub fn missing(&self, level: i32) -> Option<EngineError> {
        if self.lookup(level).is_some() {
            None
        } else {
            Some(EngineError::TechLevelDataMissing {
                engine_type: self.engine_type.to_string(),
                level,
            })
        }
    }

    fn pair(&self, new: i32, old: i32) -> Option<(&'a TechLevelEntry, &'a TechLevelEntry)> {
        match (self.lookup(new), self.lookup(old)) {
            (Some(n), Some(o)) => Some((n, o)),
            _ => {
                warn!(
                    "tech level data missing for engine type '{}' ({} -> {}), using neutral multiplier",
                    self.engine_type, old, new
                );
                None
            }
        }
    }

    pub fn thrust(&self, new: i32, old: i32, constant_mass: bool) -> f64 {
        self.pair(new, old)
            .map(|(n, o)| thrust_ratio(n, o, constant_mass))
            .unwrap_or(1.0)
    }

    pub fn mass(&self, new: i32, old: i32) -> f64 {
        self.pair(new, old)
            .map(|(n, o)| mass_ratio(n, o, self.is_solid()))
            .unwrap_or(1.0)
    }

    pub fn cost(&self, new: i32, old: i32, part_cost: f64, config_cost: f64) -> f64 {
        self.pair(new, old)
            .map(|(n, o)| scaled_cost(part_cost, config_cost, n, o))
            .unwrap_or(config_cost)
    }

    pub fn throttle(&self, new: i32) -> Option<f64> {
        self.lookup(new).and_then(throttle_floor)
    }

    /// Whether `level` may be selected.
    pub fn can_advance(&self, level: i32, settings: &Settings, gate: &dyn ResearchGate) -> bool {
        match self.lookup(level) {
            Some(entry) => {
                settings.sandbox || entry.tech_required.is_empty() || gate.is_unlocked(&entry.tech_required)
            }
            None => false,
        }
    }
}
