use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{Cli, OutputFormat};

const DEFAULT_LOG_LEVEL: &str = "warn";
const DEFAULT_DEBOUNCE_MS: u64 = 250;

/// Contents of `config.toml`.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    pub log_level: Option<String>,
    pub format: Option<OutputFormat>,
    pub debounce_ms: Option<u64>,
}

/// Effective settings after applying flags and env vars over the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_level: String,
    pub format: OutputFormat,
    pub debounce: Duration,
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".docrules").join("config.toml"))
}

/// Load the config file.
///
/// An explicitly named file must exist; the default one is optional.
pub fn load(explicit: Option<&Path>) -> Result<CliConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(CliConfig::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read config file {}", path.display()))?;
    let cfg: CliConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(cfg)
}

pub fn resolve(cli: &Cli, cfg: CliConfig, debounce_ms: Option<u64>) -> Settings {
    Settings {
        log_level: cli
            .log_level
            .clone()
            .or(cfg.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        format: cli.format.or(cfg.format).unwrap_or_default(),
        debounce: Duration::from_millis(
            debounce_ms.or(cfg.debounce_ms).unwrap_or(DEFAULT_DEBOUNCE_MS),
        ),
    }
}
