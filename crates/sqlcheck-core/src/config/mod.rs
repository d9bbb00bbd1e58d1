//! Configuration for sqlcheck.
//!
//! Configuration is read from a single file (`sqlcheck.yaml`, `.toml` or `.json`,
//! chosen by extension). Every section is optional.
//!
//! # Sections
//!
//! - **database**: how to reach the server fragments are checked against
//! - **delimiters**: the literal start/end tokens bounding embedded fragments
//! - **languages**: document language tags validated on open
//! - **overrides_file** / **overrides**: parameter type casts and default values

pub mod database;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use database::{DatabaseConfig, PoolConfig, SslMode};

use crate::error::ConfigError;
use crate::extract::Delimiters;
use crate::overrides::OverrideSnapshot;

/// Default file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "sqlcheck.yaml";

/// Complete configuration loaded from file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlCheckConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub delimiters: Delimiters,

    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// JSON file holding `{ "types": {...}, "defaults": {...} }`, relative to the
    /// configuration file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides_file: Option<PathBuf>,

    /// Inline overrides, layered over the file's.
    #[serde(default)]
    pub overrides: OverrideSnapshot,

    /// Directory relative paths are resolved against. Set by [`SqlCheckConfig::load`].
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for SqlCheckConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            delimiters: Delimiters::default(),
            languages: default_languages(),
            overrides_file: None,
            overrides: OverrideSnapshot::default(),
            base_dir: None,
        }
    }
}

fn default_languages() -> Vec<String> {
    ["typescript", "javascript", "typescriptreact", "javascriptreact"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl SqlCheckConfig {
    /// Load from `path`, parsing by extension (YAML when unknown).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = read(path)?;
        let mut config: Self = match extension(path) {
            "toml" => toml::from_str(&content).map_err(|e| parse_error(path, e))?,
            "json" => serde_json::from_str(&content).map_err(|e| parse_error(path, e))?,
            _ => serde_yaml::from_str(&content).map_err(|e| parse_error(path, e))?,
        };
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Load `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// The override tables currently in effect: the overrides file (if any) with
    /// the inline tables layered on top.
    pub fn load_overrides(&self) -> Result<OverrideSnapshot, ConfigError> {
        let from_file = match &self.overrides_file {
            Some(file) => {
                let path = self.resolve_path(file);
                if path.exists() {
                    load_override_file(&path)?
                } else {
                    tracing::warn!(path = %path.display(), "overrides file not found, ignoring");
                    OverrideSnapshot::default()
                }
            }
            None => OverrideSnapshot::default(),
        };
        Ok(from_file.merged_with(&self.overrides))
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Read an overrides file. Only its top-level shape is checked; the tables
/// themselves are kept as-is and looked up permissively.
pub fn load_override_file(path: &Path) -> Result<OverrideSnapshot, ConfigError> {
    let content = read(path)?;
    let value: Value = serde_json::from_str(&content).map_err(|e| parse_error(path, e))?;
    let Value::Object(mut root) = value else {
        return Err(ConfigError::Parse {
            path: path.display().to_string(),
            message: "expected an object with `types` and/or `defaults`".to_string(),
        });
    };
    Ok(OverrideSnapshot::new(
        root.remove("types").unwrap_or(Value::Null),
        root.remove("defaults").unwrap_or(Value::Null),
    ))
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or_default()
}

fn parse_error(path: &Path, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
