use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use leadchat_core::CoreConfig;
use serde::{Deserialize, Serialize};

/// CLI configuration that can be loaded from a JSON file. Core settings
/// sit at the top level next to CLI-only ones.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    #[serde(flatten)]
    pub core: CoreConfig,

    /// Pretty-print JSON output without passing --pretty
    #[serde(default)]
    pub pretty: bool,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

/// `~/.config/leadchat/config.json` on Linux, the platform equivalent elsewhere
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("leadchat").join("config.json"))
}

/// Explicit `--config` file, else the default file if present, else
/// defaults; environment variables override either way
pub fn resolve_config(explicit: Option<&Path>) -> Result<CliConfig> {
    let mut config = match explicit {
        Some(path) => CliConfig::load(path)?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => CliConfig::load(&path)?,
            None => CliConfig::default(),
        },
    };
    config
        .core
        .apply_env()
        .context("Invalid configuration")?;
    Ok(config)
}
