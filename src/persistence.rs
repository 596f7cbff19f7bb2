use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::seed::InstanceSeed;
use crate::solver::SolverCounters;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSaveState {
    pub config_name: String,
    /// Empty when no patch is active
    #[serde(default)]
    pub patch_name: String,
    pub tech_level: i32,
    pub seed: InstanceSeed,
    #[serde(flatten)]
    pub counters: SolverCounters,
    /// Owned by the ullage model, stored verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ullage: Option<serde_json::Value>,
}

impl EngineSaveState {
    pub fn patch(&self) -> Option<&str> {
        if self.patch_name.is_empty() {
            None
        } else {
            Some(&self.patch_name)
        }
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}
