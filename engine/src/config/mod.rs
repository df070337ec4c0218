//! Configuration management
//!
//! This module handles loading, validation, and management of the Flowr
//! configuration. Configuration is stored in TOML format at
//! ~/.flowr/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Data directory, log level
//! - **generative**: Generative endpoint settings (base URL, model, API key env var)
//! - **orchestrator**: Per-subtask timeout, session history bound
//!
//! # Path Expansion
//!
//! The configuration system automatically expands ~ to the user's home
//! directory and creates the data directory if it doesn't exist.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
///
/// Represents the complete Flowr configuration loaded from
/// ~/.flowr/config.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Generative collaborator configuration
    #[serde(default)]
    pub generative: GenerativeConfig,

    /// Orchestrator tuning
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Generative collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerativeConfig {
    /// Base URL for the generateContent API
    #[serde(default = "default_generative_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_generative_model")]
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

/// Orchestrator tuning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-subtask timeout in seconds (applied uniformly to every dispatch)
    #[serde(default = "default_subtask_timeout_secs")]
    pub subtask_timeout_secs: u64,

    /// Number of prior deliverable summaries retained per session
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.flowr/data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_generative_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_generative_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_subtask_timeout_secs() -> u64 {
    30
}

fn default_history_limit() -> usize {
    20
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            base_url: default_generative_base_url(),
            model: default_generative_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            subtask_timeout_secs: default_subtask_timeout_secs(),
            history_limit: default_history_limit(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            generative: GenerativeConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl Config {
    /// Default configuration file path: ~/.flowr/config.toml
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".flowr").join("config.toml"))
    }

    /// Load the configuration from the default location, creating a default
    /// config file if none exists.
    pub fn load_or_create() -> Result<Self> {
        let path = Self::default_path()?;

        if path.exists() {
            Self::load_from_path(&path)
        } else {
            let config = Config::default();
            config.save_to_path(&path)?;
            Ok(config)
        }
    }

    /// Load the configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.core.data_dir = expand_tilde(&config.core.data_dir)?;
        Ok(config)
    }

    /// Save the configuration to a specific path, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// The sqlite database path under the data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        let data_dir = expand_tilde(&self.core.data_dir)?;
        Ok(data_dir.join("flowr.db"))
    }
}

/// Expand a leading ~ in a path to the user's home directory
fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(rest))
    } else if s == "~" {
        dirs::home_dir().context("Could not determine home directory")
    } else {
        Ok(path.to_path_buf())
    }
}
