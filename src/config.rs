use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Top-level configuration for the relay.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Logging verbosity (trace, debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log destination file; stdout when absent.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// TCP port to accept metric samples on. Default: 2003.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Downstream Graphite host.
    #[serde(default)]
    pub graphite_host: String,

    /// Downstream Graphite port. Default: 2004.
    #[serde(default = "default_graphite_port")]
    pub graphite_port: u16,

    /// How often to aggregate and forward buffered samples. Default: 60s.
    #[serde(default = "default_flush_interval", with = "humantime_serde")]
    pub flush_interval: Duration,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen_port() -> u16 {
    2003
}

fn default_graphite_port() -> u16 {
    2004
}

fn default_flush_interval() -> Duration {
    Duration::from_secs(60)
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        if self.graphite_host.is_empty() {
            bail!("graphite_host is required");
        }

        if self.graphite_port == 0 {
            bail!("graphite_port must be positive");
        }

        if self.flush_interval.is_zero() {
            bail!("flush_interval must be positive");
        }

        Ok(())
    }
}
