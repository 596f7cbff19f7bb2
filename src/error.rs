use thiserror::Error;

/// Errors raised while loading configuration data from disk or strings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read engine data: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to parse save state: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration store for '{0}' has no configurations")]
    EmptyStore(String),
    #[error("duplicate configuration name '{0}'")]
    DuplicateConfiguration(String),
    #[error("malformed curve key {index}: expected 2 or 4 values, found {found}")]
    MalformedCurveKey { index: usize, found: usize },
    #[error("malformed legacy tech level key '{0}'")]
    MalformedLegacyKey(String),
    #[error("legacy tech level {level} for engine type '{engine_type}' has no TLISP curve")]
    MissingLegacyIsp { engine_type: String, level: i32 },
}

/// Why an ignition attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum IgnitionDenied {
    #[error("no ignitions left")]
    NoIgnitionsLeft,
    #[error("insufficient ignitor resources ({:.0}% supplied)", .supplied_fraction * 100.0)]
    InsufficientResources { supplied_fraction: f64 },
}

/// Recoverable conditions reported by the resolver and the controller.
///
/// None of these are fatal: each leaves the engine in a well-defined state and
/// is surfaced to the caller as a value to log or show.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("configuration '{requested}' not found, using '{fallback}'")]
    ConfigurationNotFound { requested: String, fallback: String },
    #[error("patch '{patch}' not found on configuration '{config}'")]
    PatchNotFound { config: String, patch: String },
    #[error("no tech level data for engine type '{engine_type}' level {level}")]
    TechLevelDataMissing { engine_type: String, level: i32 },
    #[error("ignition denied: {0}")]
    IgnitionDenied(IgnitionDenied),
    #[error("ullage fault: unstable propellant feed")]
    UllageFault,
    #[error("pressure fault: lack of feed pressure")]
    PressureFault,
    #[error("configuration requires a '{module}' module that this part does not have")]
    LinkedModuleMissing { module: String },
    #[error("configuration '{name}' is locked behind '{tech}'")]
    ConfigurationLocked { name: String, tech: String },
    #[error("tech level {level} is outside [{min}, {max}]")]
    TechLevelOutOfRange { level: i32, min: i32, max: i32 },
    #[error("tech levels are disabled for this engine")]
    TechLevelsDisabled,
    #[error("tech level {level} requires '{tech}'")]
    TechLevelLocked { level: i32, tech: String },
    #[error("the configuration store is empty")]
    EmptyConfigurationStore,
}

impl From<IgnitionDenied> for EngineError {
    fn from(denied: IgnitionDenied) -> Self {
        EngineError::IgnitionDenied(denied)
    }
}
