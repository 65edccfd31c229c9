//! kpipe user configuration
//!
//! Defaults for package reading and writing, stored as TOML. The file lives
//! at `$KPIPE_CONFIG` when that is set, otherwise at
//! `<config dir>/kpipe/kpipe.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "KPIPE_CONFIG";

/// Keys accepted by [`Config::get`] and [`Config::set`]
pub const KEYS: [&str; 5] = [
    "package-file-name",
    "match-files-glob",
    "include-subpackages",
    "keep-reader-annotations",
    "no-delete-files",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown config key: {0}. Supported keys: {keys}", keys = KEYS.join(", "))]
    UnknownKey(String),

    #[error("Invalid value '{value}' for {key}: expected true or false")]
    InvalidValue { key: String, value: String },

    #[error("Could not determine config directory")]
    NoConfigDir,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Marker file that makes a directory a subpackage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_file_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_files_glob: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_subpackages: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_reader_annotations: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_delete_files: Option<bool>,
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

impl Config {
    /// Resolved location of the config file
    pub fn path() -> Result<PathBuf, ConfigError> {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let trimmed = env_path.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed));
            }
        }
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join("kpipe").join("kpipe.toml"))
    }

    /// Load from [`Config::path`]; a missing file yields the defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let value = match key {
            "package-file-name" => self.package_file_name.clone(),
            "match-files-glob" => self.match_files_glob.as_ref().map(|g| g.join(",")),
            "include-subpackages" => self.include_subpackages.map(|b| b.to_string()),
            "keep-reader-annotations" => self.keep_reader_annotations.map(|b| b.to_string()),
            "no-delete-files" => self.no_delete_files.map(|b| b.to_string()),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        };
        Ok(value)
    }

    /// Set a key from its string form. Globs are comma separated.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "package-file-name" => self.package_file_name = Some(value.to_string()),
            "match-files-glob" => {
                self.match_files_glob = Some(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|g| !g.is_empty())
                        .map(String::from)
                        .collect(),
                );
            }
            "include-subpackages" => self.include_subpackages = Some(parse_bool(key, value)?),
            "keep-reader-annotations" => {
                self.keep_reader_annotations = Some(parse_bool(key, value)?);
            }
            "no-delete-files" => self.no_delete_files = Some(parse_bool(key, value)?),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Clear every value
    pub fn reset(&mut self) {
        *self = Config::default();
    }

    pub fn is_empty(&self) -> bool {
        self == &Config::default()
    }

    /// Set values in key order
    pub fn values_iter(&self) -> Vec<(&'static str, String)> {
        KEYS.iter()
            .filter_map(|key| match self.get(key) {
                Ok(Some(value)) => Some((*key, value)),
                _ => None,
            })
            .collect()
    }
}
