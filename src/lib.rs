pub mod balance;
pub mod chamber;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod float_curve;
pub mod ignition;
pub mod noise;
pub mod performance;
pub mod persistence;
pub mod resolver;
pub mod seed;
pub mod settings;
pub mod sink;
pub mod solver;
pub mod symmetry;
pub mod tank_network;
pub mod tech_level;
pub mod throttle;
pub mod variance;

pub use collaborators::{EffectsSink, PropellantNetwork, ResearchGate, TickContext, UllageModel};
pub use config::{ConfigPatch, ConfigurationStore, EngineConfig, EngineModuleDef};
pub use controller::{ActiveConfig, EngineConfigController};
pub use error::{ConfigError, EngineError, IgnitionDenied};
pub use float_curve::FloatCurve;
pub use performance::Environment;
pub use persistence::EngineSaveState;
pub use resolver::ResolvedParameters;
pub use settings::Settings;
pub use solver::{EngineFault, EngineState, StepOutput};
pub use symmetry::SymmetryGroup;
pub use tech_level::TechLevelTable;
