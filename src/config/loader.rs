use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::types::{Config, STATE_DIR};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "SIMULATOR_CONFIG";

const CONFIG_FILE: &str = "config.yaml";

/// `$SIMULATOR_CONFIG`, or `~/.simulator/config.yaml`.
pub fn default_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STATE_DIR)
        .join(CONFIG_FILE)
}

/// Load config from a YAML file. A missing file yields the defaults.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}
