use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use super::exceptions::ConflictPolicy;

/// Settings read from an optional TOML file. Every field has a default.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub resolution: ResolutionConfig,
    pub stations: StationsConfig,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ResolutionConfig {
    pub conflict_policy: ConflictPolicy,
}

/// Which NaPTAN stops count as stations.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StationsConfig {
    pub stop_type: String,
    pub status: String,
}

impl Default for StationsConfig {
    fn default() -> Self {
        StationsConfig {
            stop_type: "RLY".to_string(),
            status: "active".to_string(),
        }
    }
}

pub fn read_config(config_path: Option<&str>) -> Result<EngineConfig> {
    let Some(config_path) = config_path else {
        info!("No config file given, using defaults");
        return Ok(EngineConfig::default());
    };
    let file = fs_err::read_to_string(config_path)?;
    let config: EngineConfig =
        toml::from_str(&file).with_context(|| format!("Invalid config file {config_path}"))?;
    info!("Loaded config from {config_path}: {config:?}");
    Ok(config)
}
