use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub download: DownloadConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// "json" or "pretty"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Metadata mirrors, tried in order
    pub mirrors: Vec<String>,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            mirrors: vec!["https://api.vxtwitter.com".to_string()],
            user_agent: "Mozilla/5.0".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DownloadConfig {
    pub output_dir: Option<PathBuf>,
    pub filename_prefix: String,
    /// Base URL of a running download proxy; direct fetches when unset
    pub proxy_url: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            filename_prefix: "twitter".to_string(),
            proxy_url: None,
        }
    }
}

impl DownloadConfig {
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse config file {}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn get_logging_format(&self) -> &str {
        &self.logging.format
    }
}

/// Config file location: explicit path, `CONFIG_FILE`, then the XDG and home config dirs.
pub fn find_config_path(explicit: Option<&str>) -> Option<String> {
    if let Some(path) = explicit {
        return Some(path.to_string());
    }

    if let Ok(path) = std::env::var("CONFIG_FILE") {
        return Some(path);
    }

    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        let config_path = format!("{}/postgrab/config.toml", xdg_config_home);
        if Path::new(&config_path).exists() {
            return Some(config_path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let config_path = format!("{}/.config/postgrab/config.toml", home.display());
        if Path::new(&config_path).exists() {
            return Some(config_path);
        }
    }

    None
}
