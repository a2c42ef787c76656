use anyhow::{Context, Result};
use aoc_core::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub database_path: Option<PathBuf>,
    pub history_limit: usize,
    pub log_level: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            log_level: None,
        }
    }
}

impl CliConfig {
    pub fn with_overrides(mut self, database_path: Option<String>, log_level: Option<String>) -> Self {
        if let Some(path) = database_path.filter(|value| !value.trim().is_empty()) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(level) = log_level.filter(|value| !value.trim().is_empty()) {
            self.log_level = Some(level.trim().to_string());
        }
        self
    }

    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }
}

/// Reads the config file and applies `AOC_PROJECTS_DB` / `AOC_LOG_LEVEL`.
pub fn load() -> Result<CliConfig> {
    let path = config_path();
    let config = load_config(&path)?;
    Ok(config.with_overrides(
        env::var("AOC_PROJECTS_DB").ok(),
        env::var("AOC_LOG_LEVEL").ok(),
    ))
}

pub fn load_config(path: &Path) -> Result<CliConfig> {
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = env::var("AOC_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    config_dir().join("aoc/config.toml")
}

pub fn default_database_path() -> PathBuf {
    state_dir().join("aoc/projects.db")
}

fn state_dir() -> PathBuf {
    if let Ok(path) = env::var("XDG_STATE_HOME") {
        return PathBuf::from(path);
    }
    home_dir().join(".local/state")
}

fn config_dir() -> PathBuf {
    if let Ok(path) = env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(path);
    }
    home_dir().join(".config")
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn parse_bool_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes") | Some("on")
    )
}
