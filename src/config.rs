//! Runtime configuration.
//!
//! Settings come from an optional TOML file (`TIMETABLE_CONFIG`, or
//! `timetable.toml` in the working directory) and a handful of environment
//! overrides. Every field has a default so an empty file is valid.

use crate::data::Catalog;
use crate::error::ConfigError;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "TIMETABLE_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "timetable.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub grid: GridConfig,
    /// JSON catalog used to seed the in-memory store.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_filter: default_log_filter(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Teaching sessions of a day; the slot grid cuts each into half-hour windows.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GridConfig {
    #[serde(default = "default_sessions")]
    pub sessions: Vec<SessionConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SessionConfig {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            sessions: default_sessions(),
        }
    }
}

fn default_sessions() -> Vec<SessionConfig> {
    let at = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap_or_default();
    vec![
        SessionConfig {
            start: at(8),
            end: at(12),
        },
        SessionConfig {
            start: at(13),
            end: at(16),
        },
    ]
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads the config file if one is found, then applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            Err(_) => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// `HOST`, `PORT` and `TIMETABLE_CATALOG` win over file settings.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key: "PORT", value: port })?;
        }
        if let Ok(path) = env::var("TIMETABLE_CATALOG") {
            self.catalog = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Reads the seed catalog, or an empty one when none is configured.
    pub fn load_catalog(&self) -> Result<Catalog, ConfigError> {
        let Some(path) = &self.catalog else {
            return Ok(Catalog::default());
        };
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Catalog {
            path: path.clone(),
            source,
        })
    }
}
