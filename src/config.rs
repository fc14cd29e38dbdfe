//! Synth configuration
//!
//! Loads and validates the optional YAML configuration file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Stack-level parameters for a synth run
///
/// Everything has a default; a run with no config file at all produces the
/// dev items-service stack in `stackform.out/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthConfig {
    #[serde(default = "SynthConfig::default_stack_name")]
    pub stack_name: String,
    #[serde(default = "SynthConfig::default_environment")]
    pub environment: String,
    #[serde(default = "SynthConfig::default_out_dir")]
    pub out_dir: PathBuf,
    /// Trigger expression for the purge schedule, `rate(...)` or `cron(...)`
    #[serde(default = "SynthConfig::default_schedule_expression")]
    pub schedule_expression: String,
}

impl SynthConfig {
    fn default_stack_name() -> String {
        "items-service".to_string()
    }

    fn default_environment() -> String {
        "dev".to_string()
    }

    fn default_out_dir() -> PathBuf {
        PathBuf::from("stackform.out")
    }

    fn default_schedule_expression() -> String {
        "rate(1 day)".to_string()
    }

    /// Load configuration
    ///
    /// Resolution order:
    /// 1. Explicit path (the `--config` flag)
    /// 2. `STACKFORM_CONFIG` environment variable
    /// 3. `stackform.yaml` in the working directory
    /// 4. Built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var("STACKFORM_CONFIG") {
            return Self::from_file(Path::new(&path));
        }
        let local = Path::new("stackform.yaml");
        if local.exists() {
            return Self::from_file(local);
        }
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        info!(path = %path.display(), stack = %config.stack_name, "loaded config");
        Ok(config)
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            stack_name: Self::default_stack_name(),
            environment: Self::default_environment(),
            out_dir: Self::default_out_dir(),
            schedule_expression: Self::default_schedule_expression(),
        }
    }
}
