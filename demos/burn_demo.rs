use std::sync::Arc;

use rocket_engine_configs::collaborators::{EffectsRecorder, FixedUllage};
use rocket_engine_configs::seed::InstanceSeed;
use rocket_engine_configs::sink::{EnginePerformanceSink, ThrustEngineModule};
use rocket_engine_configs::tank_network::TankNetwork;
use rocket_engine_configs::{
    EngineConfigController, EngineModuleDef, EngineState, Environment, ResearchGate, Settings, TechLevelTable,
    TickContext,
};

const MODULE: &str = r#"
name = "Upper Stage Engine"
engine_type = "O"
tech_level = 0
orig_tech_level = 0
auto_cutoff = true

[[config]]
name = "Kerolox"
thrust_rating = "max_thrust"
max_thrust = 100
min_thrust = 40
heat_production = 80
atmosphere_curve = [[0, 330], [1, 290]]
ignitions = 3
ullage = true

[[config.propellant]]
name = "Kerosene"
ratio = 0.4
density = 0.0008

[[config.propellant]]
name = "LqdOxygen"
ratio = 0.6
density = 0.00114

[[config.ignitor_resource]]
name = "TEATEB"
amount = 1

[[config]]
name = "Hydrolox"
thrust_rating = "max_thrust"
max_thrust = 90
isp_sea_level = 380
isp_vacuum = 450
ignitions = 3

[[config.propellant]]
name = "LqdHydrogen"
ratio = 0.73
density = 0.00007085

[[config.propellant]]
name = "LqdOxygen"
ratio = 0.27
density = 0.00114

[[techlevel]]
level = 0
twr = 50
atmosphere_curve = [[0, 330], [1, 290]]

[[techlevel]]
level = 1
twr = 60
atmosphere_curve = [[0, 335], [1, 292]]
"#;

struct EverythingUnlocked;

impl ResearchGate for EverythingUnlocked {
    fn is_unlocked(&self, _name: &str) -> bool {
        true
    }

    fn entry_cost(&self, _name: &str) -> f64 {
        0.0
    }

    fn purchase(&mut self, _name: &str) -> bool {
        true
    }
}

fn tanks() -> TankNetwork {
    TankNetwork::new()
        .with_tank("Kerosene", 2000.0, 2000.0)
        .with_tank("LqdOxygen", 3000.0, 3000.0)
        .with_tank("LqdHydrogen", 8000.0, 8000.0)
        .with_tank("TEATEB", 2.0, 2.0)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Engine Burn Demo ===\n");

    let def = Arc::new(EngineModuleDef::from_toml_str(MODULE)?);
    let settings = Arc::new(Settings::default());
    let table = Arc::new(TechLevelTable::new());
    let sinks: Vec<Box<dyn EnginePerformanceSink>> = vec![Box::new(ThrustEngineModule::new())];
    let mut engine = EngineConfigController::new(def, settings, table, InstanceSeed::random(), sinks)?;

    for config in ["Kerolox", "Hydrolox"] {
        engine.switch_configuration(config, None, &EverythingUnlocked)?;
        for level in 0..=1 {
            engine.set_tech_level(level, &EverythingUnlocked)?;
            let p = engine.parameters();
            println!(
                "{} TL{}: {:.1} kN, Isp {:.0}/{:.0} s",
                p.config_name,
                level,
                p.max_thrust,
                p.atmosphere_curve.evaluate(1.0),
                p.atmosphere_curve.evaluate(0.0)
            );
        }
    }

    // Burn on kerolox until the tanks run dry or the ignitions run out
    engine.switch_configuration("Kerolox", None, &EverythingUnlocked)?;
    println!("\n=== Burn ({}) ===", engine.parameters().config_name);
    println!("{}", "-".repeat(40));

    let mut network = tanks();
    let ullage = FixedUllage { stability: 0.999, pressure_ok: true };
    let mut effects = EffectsRecorder::default();
    let env = Environment::vacuum();
    let dt = 0.02;

    let mut burns = 0;
    let mut last_state = engine.solver().state();
    engine.activate();
    for tick in 0..20_000 {
        // Cut the throttle every 40 s to exercise restarts
        let throttle = if (tick / 2000) % 2 == 0 { 1.0 } else { 0.0 };
        let mut ctx = TickContext { network: &mut network, ullage: &ullage, effects: &mut effects };
        let out = engine.step(&env, throttle, dt, &mut ctx);

        if out.state != last_state {
            if out.state == EngineState::Combusting {
                burns += 1;
            }
            println!(
                "  t={:7.2}s {:>10} thrust {:6.1} kN  chamber {:6.0} K",
                tick as f64 * dt,
                out.state.display_name(),
                out.thrust,
                out.chamber_temp
            );
            last_state = out.state;
        }
        if let Some(fault) = &out.fault {
            println!("  ✗ {}", fault);
        }
        // Faults drop the activation request; ask again during the coast
        if throttle == 0.0 {
            engine.activate();
        }
    }

    println!("\nBurns: {}", burns);
    println!("Ignitions left: {}", engine.solver().ignitions_remaining());
    println!("Burn time: {:.1} s", engine.solver().burn_time());
    println!("Kerosene left: {:.1}", network.stored("Kerosene"));

    println!("\n=== Save ===");
    println!("{}", engine.save().to_json()?);
    Ok(())
}
