use std::sync::Arc;

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::collaborators::{ResearchGate, TickContext};
use crate::config::{ConfigPatch, EngineConfig, EngineModuleDef};
use crate::engine::limits::TECH_LEVEL_DISABLED;
use crate::error::EngineError;
use crate::noise::CoherentNoise;
use crate::performance::Environment;
use crate::persistence::EngineSaveState;
use crate::resolver::{resolve, resolve_config, tech_source, Resolution, ResolvedParameters};
use crate::seed::InstanceSeed;
use crate::settings::Settings;
use crate::sink::{default_target, EnginePerformanceSink};
use crate::solver::{EngineFault, EngineSolver, StepOutput};
use crate::tech_level::TechLevelTable;

/// The selection currently driving the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveConfig {
    /// A persisted selection from the store
    Named { name: String, patch: Option<String> },
    /// A patch applied at runtime on top of `base`. Never persisted; the next
    /// named switch replaces it. `named` is the stored selection with its
    /// named patch, which later transient patches are laid over.
    Transient { base: String, named: Box<EngineConfig>, config: Box<EngineConfig> },
}

impl ActiveConfig {
    /// Name that goes into save data.
    pub fn persisted_name(&self) -> &str {
        match self {
            ActiveConfig::Named { name, .. } => name,
            ActiveConfig::Transient { base, .. } => base,
        }
    }

    pub fn persisted_patch(&self) -> Option<&str> {
        match self {
            ActiveConfig::Named { patch, .. } => patch.as_deref(),
            ActiveConfig::Transient { .. } => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ActiveConfig::Transient { .. })
    }
}

pub struct EngineConfigController {
    def: Arc<EngineModuleDef>,
    settings: Arc<Settings>,
    tech_table: Arc<TechLevelTable>,
    active: ActiveConfig,
    tech_level: i32,
    orig_tech_level: i32,
    parameters: ResolvedParameters,
    notices: Vec<EngineError>,
    solver: EngineSolver,
    sinks: Vec<Box<dyn EnginePerformanceSink>>,
    /// Position of this module among the engine modules on its part
    module_index: usize,
    tick_rng: ChaCha8Rng,
    ullage_record: Option<serde_json::Value>,
}

impl EngineConfigController {
    /// Build a fresh instance on the module's default configuration.
    pub fn new(
        def: Arc<EngineModuleDef>,
        settings: Arc<Settings>,
        tech_table: Arc<TechLevelTable>,
        seed: InstanceSeed,
        sinks: Vec<Box<dyn EnginePerformanceSink>>,
    ) -> Result<Self, EngineError> {
        let name = def
            .initial_config_name()
            .ok_or(EngineError::EmptyConfigurationStore)?
            .to_string();
        let tech_level = def.tech_level;
        Self::build(def, settings, tech_table, seed, sinks, name, None, tech_level)
    }

    /// Rebuild an instance from save data.
    pub fn restore(
        def: Arc<EngineModuleDef>,
        settings: Arc<Settings>,
        tech_table: Arc<TechLevelTable>,
        state: &EngineSaveState,
        sinks: Vec<Box<dyn EnginePerformanceSink>>,
    ) -> Result<Self, EngineError> {
        let patch = state.patch().map(str::to_string);
        let mut controller = Self::build(
            def,
            settings,
            tech_table,
            state.seed,
            sinks,
            state.config_name.clone(),
            patch,
            state.tech_level,
        )?;
        controller.solver.restore_counters(&state.counters);
        controller.ullage_record = state.ullage.clone();
        Ok(controller)
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        def: Arc<EngineModuleDef>,
        settings: Arc<Settings>,
        tech_table: Arc<TechLevelTable>,
        seed: InstanceSeed,
        mut sinks: Vec<Box<dyn EnginePerformanceSink>>,
        name: String,
        patch: Option<String>,
        tech_level: i32,
    ) -> Result<Self, EngineError> {
        let orig_tech_level = def.origin_tech_level();
        let Resolution { parameters, notices } =
            resolve(&def, &tech_table, &name, patch.as_deref(), tech_level, orig_tech_level)?;
        check_sinks(&sinks, &parameters)?;
        push_to_sinks(&mut sinks, &parameters);

        let mut tick_rng = ChaCha8Rng::from_entropy();
        let noise = CoherentNoise::new(tick_rng.gen());
        let solver = EngineSolver::new(Arc::clone(&settings), seed, &parameters, noise);
        let active = ActiveConfig::Named {
            name: parameters.config_name.clone(),
            patch: parameters.patch_name.clone(),
        };

        let mut controller = Self {
            def,
            settings,
            tech_table,
            active,
            tech_level,
            orig_tech_level,
            parameters,
            notices,
            solver,
            sinks,
            module_index: 0,
            tick_rng,
            ullage_record: None,
        };
        controller.clamp_tech_level()?;
        Ok(controller)
    }

    /// Replace the tick generator and noise table with seeded ones, for
    /// reproducible runs.
    pub fn with_tick_seed(mut self, seed: u64) -> Self {
        self.tick_rng = ChaCha8Rng::seed_from_u64(seed);
        self.solver.set_noise(CoherentNoise::new(self.tick_rng.gen()));
        self
    }

    pub fn with_module_index(mut self, index: usize) -> Self {
        self.module_index = index;
        self
    }

    // ==========================================
    // Accessors
    // ==========================================

    pub fn definition(&self) -> &EngineModuleDef {
        &self.def
    }

    pub fn parameters(&self) -> &ResolvedParameters {
        &self.parameters
    }

    /// Recoverable problems from the most recent resolution.
    pub fn notices(&self) -> &[EngineError] {
        &self.notices
    }

    pub fn active(&self) -> &ActiveConfig {
        &self.active
    }

    pub fn tech_level(&self) -> i32 {
        self.tech_level
    }

    pub fn solver(&self) -> &EngineSolver {
        &self.solver
    }

    pub fn module_index(&self) -> usize {
        self.module_index
    }

    pub fn sinks(&self) -> &[Box<dyn EnginePerformanceSink>] {
        &self.sinks
    }

    pub fn ullage_record(&self) -> Option<&serde_json::Value> {
        self.ullage_record.as_ref()
    }

    pub fn set_ullage_record(&mut self, record: Option<serde_json::Value>) {
        self.ullage_record = record;
    }

    /// Merged configuration behind the active selection.
    fn active_config(&self) -> Option<EngineConfig> {
        match &self.active {
            ActiveConfig::Named { name, patch } => {
                let base = self.def.configs.find(name)?;
                Some(match patch.as_deref().and_then(|p| base.find_patch(p)) {
                    Some(p) => base.with_patch(p),
                    None => base.detached(),
                })
            }
            ActiveConfig::Transient { config, .. } => Some((**config).clone()),
        }
    }

    /// `(min, max)` tech levels for the active configuration, or `None` when
    /// tech levels are disabled or no ladder exists.
    pub fn tech_level_bounds(&self) -> Option<(i32, i32)> {
        if self.tech_level == TECH_LEVEL_DISABLED {
            return None;
        }
        let config = self.active_config()?;
        let source = tech_source(&self.def, &config, &self.tech_table);
        let min = self.def.min_tech_level.or_else(|| source.min_level())?;
        let max = self.def.max_tech_level.or_else(|| source.max_level())?;
        Some((min, max))
    }

    // ==========================================
    // Configuration Selection
    // ==========================================

    /// Whether `name` may be selected right now.
    pub fn is_configuration_available(&self, name: &str, gate: &dyn ResearchGate) -> bool {
        match self.def.configs.find(name).and_then(|c| c.tech_required()) {
            Some(tech) => self.settings.sandbox || gate.is_unlocked(tech),
            None => true,
        }
    }

    /// Unlock the tech gating `name`. Returns whether it is now available.
    pub fn purchase_configuration(&self, name: &str, gate: &mut dyn ResearchGate) -> Result<bool, EngineError> {
        let config = self.def.configs.find(name).ok_or_else(|| EngineError::ConfigurationNotFound {
            requested: name.to_string(),
            fallback: self.active.persisted_name().to_string(),
        })?;
        let tech = match config.tech_required() {
            Some(tech) => tech,
            None => return Ok(true),
        };
        if self.settings.sandbox || gate.is_unlocked(tech) {
            return Ok(true);
        }
        let cost = gate.entry_cost(tech);
        let bought = gate.purchase(tech);
        info!("purchase of '{}' for {} ({:.0}): {}", name, tech, cost, if bought { "ok" } else { "declined" });
        Ok(bought)
    }

    /// Switch to a stored configuration, clearing any transient patch.
    ///
    /// On error nothing changes. On success the returned notices list
    /// recoverable problems met while resolving.
    pub fn switch_configuration(
        &mut self,
        name: &str,
        patch: Option<&str>,
        gate: &dyn ResearchGate,
    ) -> Result<Vec<EngineError>, EngineError> {
        let resolution = resolve(&self.def, &self.tech_table, name, patch, self.tech_level, self.orig_tech_level)?;
        // Lock applies to whichever configuration resolved, fallback included
        if let Some(tech) = &resolution.parameters.tech_required {
            if !self.settings.sandbox && !gate.is_unlocked(tech) {
                return Err(EngineError::ConfigurationLocked {
                    name: resolution.parameters.config_name.clone(),
                    tech: tech.clone(),
                });
            }
        }
        let active = ActiveConfig::Named {
            name: resolution.parameters.config_name.clone(),
            patch: resolution.parameters.patch_name.clone(),
        };
        self.commit(active, resolution)?;
        info!("switched to configuration '{}'", self.active.persisted_name());

        // The new configuration may carry its own ladder
        self.clamp_tech_level()?;
        Ok(self.notices.clone())
    }

    /// Lay `patch` over the active stored configuration without changing the
    /// persisted selection.
    pub fn apply_transient_patch(&mut self, patch: &ConfigPatch) -> Result<Vec<EngineError>, EngineError> {
        let base_name = self.active.persisted_name().to_string();
        let named = match &self.active {
            ActiveConfig::Named { .. } => self.active_config(),
            ActiveConfig::Transient { named, .. } => Some((**named).clone()),
        }
        .ok_or_else(|| EngineError::ConfigurationNotFound {
            requested: base_name.clone(),
            fallback: base_name.clone(),
        })?;

        let merged = named.with_patch(patch);
        let resolution = resolve_config(&self.def, &self.tech_table, &merged, self.tech_level, self.orig_tech_level);
        let active = ActiveConfig::Transient { base: base_name, named: Box::new(named), config: Box::new(merged) };
        self.commit(active, resolution)?;
        debug!("transient patch '{}' applied", patch.name);
        Ok(self.notices.clone())
    }

    fn commit(&mut self, active: ActiveConfig, resolution: Resolution) -> Result<(), EngineError> {
        if let Err(err) = check_sinks(&self.sinks, &resolution.parameters) {
            warn!("{}; keeping '{}'", err, self.parameters.config_name);
            return Err(err);
        }
        self.active = active;
        self.parameters = resolution.parameters;
        self.notices = resolution.notices;
        self.solver.load_parameters(&self.parameters);
        push_to_sinks(&mut self.sinks, &self.parameters);
        Ok(())
    }

    // ==========================================
    // Tech Levels
    // ==========================================

    fn apply_tech_level(&mut self, level: i32) -> Result<(), EngineError> {
        let config = self.active_config().ok_or(EngineError::EmptyConfigurationStore)?;
        let mut resolution = resolve_config(&self.def, &self.tech_table, &config, level, self.orig_tech_level);
        if let ActiveConfig::Named { patch, .. } = &self.active {
            resolution.parameters.patch_name = patch.clone();
        }
        let active = self.active.clone();
        self.commit(active, resolution)?;
        self.tech_level = level;
        info!("{} now at tech level {}", self.parameters.config_name, level);
        Ok(())
    }

    /// Pull the tech level back inside the active configuration's ladder.
    fn clamp_tech_level(&mut self) -> Result<(), EngineError> {
        let (min, max) = match self.tech_level_bounds() {
            Some(bounds) if bounds.0 <= bounds.1 => bounds,
            _ => return Ok(()),
        };
        let clamped = self.tech_level.clamp(min, max);
        if clamped != self.tech_level {
            warn!(
                "{} tech level {} outside {}..={}, using {}",
                self.parameters.config_name, self.tech_level, min, max, clamped
            );
            self.apply_tech_level(clamped)?;
        }
        Ok(())
    }

    /// Move to `level`, checking range and research.
    pub fn set_tech_level(&mut self, level: i32, gate: &dyn ResearchGate) -> Result<i32, EngineError> {
        let (min, max) = self.tech_level_bounds().ok_or(EngineError::TechLevelsDisabled)?;
        if level < min || level > max {
            return Err(EngineError::TechLevelOutOfRange { level, min, max });
        }
        let config = self.active_config().ok_or(EngineError::EmptyConfigurationStore)?;
        let source = tech_source(&self.def, &config, &self.tech_table);
        if level > self.tech_level && !source.can_advance(level, &self.settings, gate) {
            let tech = source.lookup(level).map(|e| e.tech_required.clone()).unwrap_or_default();
            return Err(EngineError::TechLevelLocked { level, tech });
        }
        self.apply_tech_level(level)?;
        Ok(level)
    }

    pub fn advance_tech_level(&mut self, gate: &dyn ResearchGate) -> Result<i32, EngineError> {
        if self.tech_level == TECH_LEVEL_DISABLED {
            return Err(EngineError::TechLevelsDisabled);
        }
        self.set_tech_level(self.tech_level + 1, gate)
    }

    pub fn regress_tech_level(&mut self, gate: &dyn ResearchGate) -> Result<i32, EngineError> {
        if self.tech_level == TECH_LEVEL_DISABLED {
            return Err(EngineError::TechLevelsDisabled);
        }
        self.set_tech_level(self.tech_level - 1, gate)
    }

    // ==========================================
    // Flight
    // ==========================================

    pub fn activate(&mut self) {
        self.solver.activate();
    }

    pub fn shutdown(&mut self) {
        self.solver.shutdown();
    }

    /// Cut this engine off because a sibling ran dry.
    pub fn force_cutoff(&mut self) -> bool {
        self.solver.force_fault(EngineFault::SymmetricCutoff)
    }

    pub fn step(&mut self, env: &Environment, throttle: f64, dt: f64, ctx: &mut TickContext<'_>) -> StepOutput {
        let out = self.solver.step(&self.parameters, env, throttle, dt, ctx, &mut self.tick_rng);
        if let Some(fault) = &out.fault {
            info!("{}: {}", self.parameters.config_name, fault);
        }
        out
    }

    pub fn save(&self) -> EngineSaveState {
        EngineSaveState {
            config_name: self.active.persisted_name().to_string(),
            patch_name: self.active.persisted_patch().unwrap_or_default().to_string(),
            tech_level: self.tech_level,
            seed: self.solver.seed(),
            counters: self.solver.counters(),
            ullage: self.ullage_record.clone(),
        }
    }
}

/// Fails when the parameters name a module kind this part does not carry.
fn check_sinks(sinks: &[Box<dyn EnginePerformanceSink>], params: &ResolvedParameters) -> Result<(), EngineError> {
    match params.linked_module {
        Some(kind) if !sinks.iter().any(|s| s.module_kind() == kind) => {
            Err(EngineError::LinkedModuleMissing { module: kind.display_name().to_string() })
        }
        _ => Ok(()),
    }
}

fn push_to_sinks(sinks: &mut [Box<dyn EnginePerformanceSink>], params: &ResolvedParameters) {
    let target = params.linked_module.unwrap_or_else(|| default_target(params));
    for sink in sinks.iter_mut().filter(|s| s.module_kind() == target) {
        sink.apply_resolved(params);
    }
}
