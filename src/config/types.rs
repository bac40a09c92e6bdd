use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_IMAGE: &str = "controlplane/simulator:latest";

/// Name of the per-user state directory under `$HOME`.
pub const STATE_DIR: &str = ".simulator";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Workspace holding `home/`, `scenarios/`, `packer/` and `terraform/`.
    pub base_dir: PathBuf,
    pub cli: CliConfig,
    pub container: ContainerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CliConfig {
    /// Expose the workspace's scenario, packer and terraform sources inside
    /// the container.
    pub dev: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainerConfig {
    pub image: String,
    /// Seconds docker waits after SIGTERM before killing the container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_timeout: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            cli: CliConfig::default(),
            container: ContainerConfig::default(),
        }
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            stop_timeout: None,
        }
    }
}

impl Config {
    /// The subset of configuration a single run consumes.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            base_dir: self.base_dir.clone(),
            dev: self.cli.dev,
            image: self.container.image.clone(),
            stop_timeout: self.container.stop_timeout.map(Duration::from_secs),
        }
    }
}

/// Immutable per-run settings handed to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub base_dir: PathBuf,
    pub dev: bool,
    pub image: String,
    pub stop_timeout: Option<Duration>,
}

fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STATE_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert!(!cfg.cli.dev);
        assert_eq!(cfg.container.image, DEFAULT_IMAGE);
        assert!(cfg.container.stop_timeout.is_none());
        assert!(cfg.base_dir.ends_with(STATE_DIR));
    }

    #[test]
    fn parses_camel_case_keys() {
        let yaml = "\
baseDir: /ws
cli:
  dev: true
container:
  image: example/sim:dev
  stopTimeout: 20
";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.base_dir, PathBuf::from("/ws"));
        assert!(cfg.cli.dev);
        assert_eq!(cfg.container.image, "example/sim:dev");
        assert_eq!(cfg.container.stop_timeout, Some(20));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let cfg: Config = serde_yaml::from_str("cli:\n  dev: true\n").unwrap();
        assert!(cfg.cli.dev);
        assert_eq!(cfg.container.image, DEFAULT_IMAGE);
    }

    #[test]
    fn run_config_carries_fields() {
        let cfg = Config {
            base_dir: PathBuf::from("/ws"),
            cli: CliConfig { dev: true },
            container: ContainerConfig {
                image: "img".into(),
                stop_timeout: Some(7),
            },
        };
        let run = cfg.run_config();
        assert_eq!(run.base_dir, PathBuf::from("/ws"));
        assert!(run.dev);
        assert_eq!(run.image, "img");
        assert_eq!(run.stop_timeout, Some(Duration::from_secs(7)));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let cfg: Config = serde_yaml::from_str("name: simulator\nbucket: b\n").unwrap();
        assert_eq!(cfg.container.image, DEFAULT_IMAGE);
    }
}
