use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::database::connection::{DatabaseConnection, DEFAULT_DB_FILENAME};
use crate::database::models::{UserProfile, DEFAULT_NICKNAME};
use crate::seed::{
    Bootstrapper, FileSeedSource, HttpSeedSource, SeedSource, DEFAULT_SEED_TIMEOUT_SECS,
};
use crate::sidecar::DEFAULT_SIDECAR_FILENAME;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Directory holding the store and the sidecar; platform data dir when unset
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Store filename inside `data_dir`
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Sidecar filename inside `data_dir`
    #[serde(default = "default_sidecar_file")]
    pub sidecar_file: String,

    /// Where backups are written; current directory when unset
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,

    /// First-run seed document
    #[serde(default)]
    pub seed: SeedConfig,

    /// Nickname of the profile shown before one is saved
    #[serde(default = "default_nickname")]
    pub default_nickname: String,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Seed document location
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SeedConfig {
    /// HTTP(S) URL of the seed document
    #[serde(default)]
    pub url: Option<String>,

    /// Local seed document, used when no URL is set
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Fetch timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SeedConfig {
    /// Build the configured seed source, if any
    pub fn source(&self) -> Result<Option<Box<dyn SeedSource>>> {
        if let Some(url) = &self.url {
            let source = HttpSeedSource::new(url, std::time::Duration::from_secs(self.timeout_secs))?;
            return Ok(Some(Box::new(source)));
        }
        if let Some(path) = &self.path {
            return Ok(Some(Box::new(FileSeedSource::new(path.clone()))));
        }
        Ok(None)
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(anyhow!("Invalid log level: {}", s)),
        }
    }
}

fn default_database_file() -> String {
    DEFAULT_DB_FILENAME.to_string()
}

fn default_sidecar_file() -> String {
    DEFAULT_SIDECAR_FILENAME.to_string()
}

fn default_nickname() -> String {
    DEFAULT_NICKNAME.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_SEED_TIMEOUT_SECS
}

impl Config {
    /// Load a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.database_file.trim().is_empty() {
            return Err(anyhow!("database_file must not be empty"));
        }
        if self.sidecar_file.trim().is_empty() {
            return Err(anyhow!("sidecar_file must not be empty"));
        }
        if self.database_file == self.sidecar_file {
            return Err(anyhow!("database_file and sidecar_file must differ"));
        }
        if self.default_nickname.trim().is_empty() {
            return Err(anyhow!("default_nickname must not be empty"));
        }
        if self.seed.timeout_secs == 0 {
            return Err(anyhow!("seed.timeout_secs must be greater than zero"));
        }
        if let Some(url) = &self.seed.url {
            let parsed = Url::parse(url).with_context(|| format!("Invalid seed URL: {}", url))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(anyhow!("Seed URL must use http or https: {}", url));
            }
        }

        Ok(())
    }

    /// Directory holding the store and the sidecar
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => DatabaseConnection::default_data_dir(),
        }
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        Ok(self.resolved_data_dir()?.join(&self.database_file))
    }

    pub fn sidecar_path(&self) -> Result<PathBuf> {
        Ok(self.resolved_data_dir()?.join(&self.sidecar_file))
    }

    pub fn resolved_backup_dir(&self) -> PathBuf {
        self.backup_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn default_profile(&self) -> UserProfile {
        UserProfile::new(&self.default_nickname)
    }

    /// Bootstrapper for the configured seed source
    pub fn bootstrapper(&self) -> Result<Bootstrapper> {
        Ok(Bootstrapper::new(self.seed.source()?))
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: None,
            database_file: default_database_file(),
            sidecar_file: default_sidecar_file(),
            backup_dir: None,
            seed: SeedConfig::default(),
            default_nickname: default_nickname(),
            log_level: LogLevel::default(),
        }
    }
}
