use log::{info, warn};

use crate::collaborators::{ResearchGate, TickContext};
use crate::controller::EngineConfigController;
use crate::error::EngineError;
use crate::performance::Environment;
use crate::solver::{EngineFault, EngineState, StepOutput};

#[derive(Default)]
pub struct SymmetryGroup {
    members: Vec<EngineConfigController>,
}

impl SymmetryGroup {
    pub fn new(members: Vec<EngineConfigController>) -> Self {
        Self { members }
    }

    pub fn push(&mut self, member: EngineConfigController) {
        self.members.push(member);
    }

    pub fn members(&self) -> &[EngineConfigController] {
        &self.members
    }

    pub fn member_mut(&mut self, index: usize) -> Option<&mut EngineConfigController> {
        self.members.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Switch every member. Members that refuse keep their previous
    /// selection; the failures are returned by member index.
    pub fn switch_all(
        &mut self,
        name: &str,
        patch: Option<&str>,
        gate: &dyn ResearchGate,
    ) -> Vec<(usize, EngineError)> {
        let mut failures = Vec::new();
        for (i, member) in self.members.iter_mut().enumerate() {
            if let Err(err) = member.switch_configuration(name, patch, gate) {
                warn!("symmetry member {} did not switch to '{}': {}", i, name, err);
                failures.push((i, err));
            }
        }
        failures
    }

    pub fn set_tech_level_all(&mut self, level: i32, gate: &dyn ResearchGate) -> Vec<(usize, EngineError)> {
        let mut failures = Vec::new();
        for (i, member) in self.members.iter_mut().enumerate() {
            if let Err(err) = member.set_tech_level(level, gate) {
                warn!("symmetry member {} stayed at tech level {}: {}", i, member.tech_level(), err);
                failures.push((i, err));
            }
        }
        failures
    }

    pub fn activate_all(&mut self) {
        self.members.iter_mut().for_each(EngineConfigController::activate);
    }

    pub fn shutdown_all(&mut self) {
        self.members.iter_mut().for_each(EngineConfigController::shutdown);
    }

    /// Step every member with its own context. `contexts` pairs up with
    /// members by index; members without a context are not stepped and get
    /// no output.
    pub fn step(
        &mut self,
        env: &Environment,
        throttle: f64,
        dt: f64,
        contexts: &mut [TickContext<'_>],
    ) -> Vec<StepOutput> {
        let mut outputs: Vec<StepOutput> = self
            .members
            .iter_mut()
            .zip(contexts.iter_mut())
            .map(|(member, ctx)| member.step(env, throttle, dt, ctx))
            .collect();

        let broadcasting: Vec<usize> = outputs
            .iter()
            .zip(&self.members)
            .filter(|(out, _)| out.cutoff_broadcast)
            .map(|(_, member)| member.module_index())
            .collect();
        if broadcasting.is_empty() {
            return outputs;
        }

        for (member, out) in self.members.iter_mut().zip(outputs.iter_mut()) {
            if out.cutoff_broadcast || !broadcasting.contains(&member.module_index()) {
                continue;
            }
            if member.force_cutoff() {
                info!("{} cut off with its symmetry group", member.parameters().config_name);
                out.state = EngineState::Shutdown;
                out.throttle = 0.0;
                out.thrust = 0.0;
                out.thrust_fraction = 0.0;
                out.mass_flow = 0.0;
                out.heat = 0.0;
                out.fault = Some(EngineFault::SymmetricCutoff);
            }
        }
        outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{FixedUllage, NoEffects};
    use crate::config::EngineModuleDef;
    use crate::seed::InstanceSeed;
    use crate::settings::Settings;
    use crate::sink::ThrustEngineModule;
    use crate::tank_network::TankNetwork;
    use crate::tech_level::TechLevelTable;
    use std::sync::Arc;

    const MODULE: &str = r#"
        name = "Radial"
        engine_type = "L"
        auto_cutoff = true
        tech_level = 0
        orig_tech_level = 0

        [[config]]
        name = "Hydrazine"
        thrust_rating = "max_thrust"
        max_thrust = 20
        atmosphere_curve = [[0, 240], [1, 190]]

        [[config.propellant]]
        name = "Hydrazine"
        ratio = 1.0
        density = 0.001004

        [[config]]
        name = "HTP"
        thrust_rating = "max_thrust"
        max_thrust = 15
        atmosphere_curve = [[0, 180], [1, 140]]
        tech_required = "monopropellants"

        [[techlevel]]
        level = 0
        twr = 10
        atmosphere_curve = [[0, 240], [1, 190]]

        [[techlevel]]
        level = 1
        twr = 12
        atmosphere_curve = [[0, 240], [1, 190]]
    "#;

    struct Locked;

    impl ResearchGate for Locked {
        fn is_unlocked(&self, _name: &str) -> bool {
            false
        }

        fn entry_cost(&self, _name: &str) -> f64 {
            0.0
        }

        fn purchase(&mut self, _name: &str) -> bool {
            false
        }
    }

    fn group(count: usize) -> SymmetryGroup {
        let def = Arc::new(EngineModuleDef::from_toml_str(MODULE).unwrap());
        let settings = Arc::new(Settings { sandbox: false, ..Settings::permissive() });
        let table = Arc::new(TechLevelTable::new());
        let members = (0..count)
            .map(|i| {
                EngineConfigController::new(
                    Arc::clone(&def),
                    Arc::clone(&settings),
                    Arc::clone(&table),
                    InstanceSeed::new(i as u64),
                    vec![Box::new(ThrustEngineModule::new())],
                )
                .unwrap()
                .with_tick_seed(i as u64)
            })
            .collect();
        SymmetryGroup::new(members)
    }

    #[test]
    fn test_switch_all_reports_refusals() {
        let mut g = group(2);
        let failures = g.switch_all("HTP", None, &Locked);
        assert_eq!(failures.len(), 2);
        assert!(g.members().iter().all(|m| m.parameters().config_name == "Hydrazine"));
    }

    #[test]
    fn test_tech_level_fans_out() {
        let mut g = group(3);
        assert!(g.set_tech_level_all(1, &Locked).is_empty());
        for member in g.members() {
            assert_eq!(member.tech_level(), 1);
            assert!((member.parameters().max_thrust - 24.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_starved_member_cuts_off_siblings() {
        let mut g = group(2);
        let ullage = FixedUllage::settled();
        let mut full = TankNetwork::new().with_tank("Hydrazine", 100.0, 100.0);
        let mut empty = TankNetwork::new().with_tank("Hydrazine", 0.0, 100.0);
        let mut fx_a = NoEffects;
        let mut fx_b = NoEffects;

        g.activate_all();
        let outputs = {
            let mut contexts = [
                TickContext { network: &mut full, ullage: &ullage, effects: &mut fx_a },
                TickContext { network: &mut empty, ullage: &ullage, effects: &mut fx_b },
            ];
            g.step(&Environment::vacuum(), 1.0, 0.02, &mut contexts)
        };

        assert_eq!(outputs[1].fault, Some(EngineFault::PropellantUnavailable { propellant: "Hydrazine".to_string() }));
        assert!(outputs[1].cutoff_broadcast);
        assert_eq!(outputs[0].fault, Some(EngineFault::SymmetricCutoff));
        assert_eq!(outputs[0].thrust, 0.0);
        assert!(g.members().iter().all(|m| m.solver().state() == EngineState::Shutdown));
        assert!(full.stored("Hydrazine") < 100.0);
    }

    #[test]
    fn test_other_module_slots_keep_running() {
        let def = Arc::new(EngineModuleDef::from_toml_str(MODULE).unwrap());
        let settings = Arc::new(Settings::permissive());
        let table = Arc::new(TechLevelTable::new());
        let build = |index: usize| {
            EngineConfigController::new(
                Arc::clone(&def),
                Arc::clone(&settings),
                Arc::clone(&table),
                InstanceSeed::new(index as u64),
                vec![Box::new(ThrustEngineModule::new())],
            )
            .unwrap()
            .with_module_index(index)
        };
        let mut g = SymmetryGroup::new(vec![build(0), build(1)]);
        let ullage = FixedUllage::settled();
        let mut full = TankNetwork::new().with_tank("Hydrazine", 100.0, 100.0);
        let mut empty = TankNetwork::new().with_tank("Hydrazine", 0.0, 100.0);
        let mut fx_a = NoEffects;
        let mut fx_b = NoEffects;

        g.activate_all();
        let outputs = {
            let mut contexts = [
                TickContext { network: &mut full, ullage: &ullage, effects: &mut fx_a },
                TickContext { network: &mut empty, ullage: &ullage, effects: &mut fx_b },
            ];
            g.step(&Environment::vacuum(), 1.0, 0.02, &mut contexts)
        };
        assert_eq!(outputs[0].state, EngineState::Combusting);
        assert_eq!(outputs[0].fault, None);
    }

    #[test]
    fn test_shutdown_all() {
        let mut g = group(2);
        g.activate_all();
        assert!(g.members().iter().all(|m| m.solver().is_activated()));
        g.shutdown_all();
        assert!(g.members().iter().all(|m| !m.solver().is_activated()));
    }
}
