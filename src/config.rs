use serde::Deserialize;
use std::path::PathBuf;

use crate::viewer::ViewerSettings;

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct ServerConfig {
    /// Server used when a bare review request id is given instead of a URL.
    pub url: Option<String>,
    pub token_env: Option<String>,
    pub token_command: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct NavigationConfig {
    #[serde(default = "default_lead_in")]
    pub scroll_lead_in: usize,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_lead_in() -> usize {
    3
}

fn default_max_in_flight() -> usize {
    1
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            scroll_lead_in: default_lead_in(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl NavigationConfig {
    pub fn settings(&self) -> ViewerSettings {
        ViewerSettings {
            lead_in: self.scroll_lead_in,
            max_in_flight: self.max_in_flight.max(1),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
}

fn config_path() -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("diffnav").join("config.toml"))
}

impl Config {
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            return Config::default();
        };

        let Ok(content) = std::fs::read_to_string(&path) else {
            return Config::default();
        };

        match Self::parse(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
                Config::default()
            }
        }
    }

    pub fn parse(content: &str) -> crate::error::Result<Self> {
        toml::from_str(content).map_err(|e| crate::error::NavError::Config(e.to_string()))
    }
}
