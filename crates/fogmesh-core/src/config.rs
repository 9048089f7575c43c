//! fogmesh.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Mode;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FogConfig {
    pub solver: SolverConfig,
    pub watcher: WatcherConfig,
    pub topology: TopologyConfig,
    pub deploy: DeployConfig,
    pub platform: PlatformConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Solver executable, looked up on `PATH` when not absolute.
    pub executable: String,
    /// Extra arguments passed before the program is fed on stdin.
    pub args: Vec<String>,
    pub rules_dir: PathBuf,
    pub normal_rules: String,
    pub heuristic_rules: String,
    pub timeout_secs: u64,
    /// Weight link facts with their availability probability.
    pub link_probability: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            executable: "problog".to_string(),
            args: Vec::new(),
            rules_dir: PathBuf::from("/opt/edgeusher"),
            normal_rules: "edgeusher.pl".to_string(),
            heuristic_rules: "hedgeusher.pl".to_string(),
            timeout_secs: 60,
            link_probability: true,
        }
    }
}

impl SolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Path of the rule file consulted for `mode`.
    pub fn rules_path(&self, mode: Mode) -> PathBuf {
        match mode {
            Mode::Normal => self.rules_dir.join(&self.normal_rules),
            Mode::Heuristic => self.rules_dir.join(&self.heuristic_rules),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub resync_interval_secs: u64,
    /// Delay before re-subscribing after the event stream ends.
    pub retry_delay_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: 120,
            retry_delay_secs: 5,
        }
    }
}

impl WatcherConfig {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs.max(1))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// How links are synthesized when the platform reports no topology.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    /// A directed link for every ordered pair of distinct nodes.
    #[default]
    Complete,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub links: LinkMode,
    pub latency: u32,
    pub bandwidth: u32,
    pub probability: f64,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            links: LinkMode::Complete,
            latency: 1,
            bandwidth: 99999,
            probability: 1.0,
        }
    }
}

/// What to do when applying a placement only partly succeeds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartialApplyPolicy {
    /// Keep what was created, register the deploy, report the errors.
    #[default]
    Report,
    /// Tear down what was created and leave the application absent.
    Rollback,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub mode: Mode,
    pub partial_apply: PartialApplyPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub kubectl: String,
    pub namespace: String,
    /// Passed as `--kubeconfig` when non-empty.
    pub kubeconfig: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            namespace: "default".to_string(),
            kubeconfig: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl FogConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FogConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let config: FogConfig = toml::from_str("").unwrap();
        assert_eq!(config.solver.executable, "problog");
        assert_eq!(config.watcher.resync_interval(), Duration::from_secs(120));
        assert_eq!(config.topology.links, LinkMode::Complete);
        assert_eq!(config.topology.bandwidth, 99999);
        assert_eq!(config.deploy.mode, Mode::Normal);
        assert_eq!(config.deploy.partial_apply, PartialApplyPolicy::Report);
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn parses_overrides() {
        let toml_str = r#"
[solver]
rules_dir = "/srv/rules"
link_probability = false

[topology]
links = "none"

[deploy]
mode = "heuristic"
partial_apply = "rollback"
"#;
        let config: FogConfig = toml::from_str(toml_str).unwrap();
        assert!(!config.solver.link_probability);
        assert_eq!(config.topology.links, LinkMode::None);
        assert_eq!(config.deploy.mode, Mode::Heuristic);
        assert_eq!(config.deploy.partial_apply, PartialApplyPolicy::Rollback);
        assert_eq!(
            config.solver.rules_path(Mode::Heuristic),
            PathBuf::from("/srv/rules/hedgeusher.pl")
        );
        assert_eq!(
            config.solver.rules_path(Mode::Normal),
            PathBuf::from("/srv/rules/edgeusher.pl")
        );
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nport = 9090").unwrap();

        let config = FogConfig::from_file(file.path()).unwrap();
        assert_eq!(config.api.port, 9090);
        assert_eq!(config.platform.namespace, "default");
    }

    #[test]
    fn serializes_back_to_toml() {
        let toml_str = FogConfig::default().to_toml_string().unwrap();
        assert!(toml_str.contains("problog"));
        assert!(toml_str.contains("resync_interval_secs"));
    }
}
