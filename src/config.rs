use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_DEVELOPER_PROMPT: &str = "You are a helpful AI assistant.";

/// Application configuration.
///
/// Read from `~/.parley/config.toml` when present. The client never writes
/// this file, and there is deliberately no credential field: the API key is
/// typed in at runtime and kept in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the chat backend
    pub endpoint: String,

    /// Model selected at startup
    pub default_model: String,

    /// Models offered by the model selector
    pub models: Vec<String>,

    /// Developer prompts offered by the prompt selector; the first is used at startup
    pub developer_prompts: Vec<String>,

    /// Whole-request timeout, streaming included
    pub request_timeout_secs: u64,

    /// Log filter directive, e.g. `info` or `parley=debug`
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            models: vec![
                "gpt-4.1-mini".to_string(),
                "gpt-4.1".to_string(),
                "gpt-4o".to_string(),
                "gpt-4o-mini".to_string(),
            ],
            developer_prompts: vec![
                DEFAULT_DEVELOPER_PROMPT.to_string(),
                "You are a concise assistant. Answer in as few words as possible.".to_string(),
                "You are a patient tutor. Explain step by step.".to_string(),
            ],
            request_timeout_secs: 300,
            log_level: "info".to_string(),
        }
    }
}

/// Overrides given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub log_level: Option<String>,
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => parley_home()?.join("config.toml"),
        };

        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
            Self::from_toml(&content)
                .with_context(|| format!("Failed to parse config file {}", config_path.display()))?
        } else if path.is_some() {
            bail!("Config file {} does not exist", config_path.display());
        } else {
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config.normalized())
    }

    /// Apply command-line overrides on top of file values.
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self> {
        if let Some(endpoint) = overrides.endpoint {
            self.endpoint = endpoint;
        }
        if let Some(model) = overrides.model {
            self.default_model = model;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        let config = self.normalized();
        config.validate()?;
        Ok(config)
    }

    /// Make sure the default model is selectable.
    fn normalized(mut self) -> Self {
        if !self.models.iter().any(|m| m == &self.default_model) {
            self.models.insert(0, self.default_model.clone());
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            bail!("endpoint must be an http(s) URL, got '{}'", self.endpoint);
        }
        if self.default_model.trim().is_empty() {
            bail!("default_model must not be empty");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        Ok(parley_home()?.join("logs"))
    }
}

/// `~/.parley`
pub fn parley_home() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".parley"))
}
