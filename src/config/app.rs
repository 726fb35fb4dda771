// src/config/app.rs
use super::defaults::*;
use crate::consts::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cipher: CipherSettings,
    pub backup: BackupSettings,
    pub verify: VerifySettings,
}

/// SQLCipher parameters applied right after the key on every encrypted open.
/// Reopening a database requires the same values it was created with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CipherSettings {
    pub page_size: u32,
    pub kdf_iter: u32,
    pub hmac_algorithm: String,
    pub kdf_algorithm: String,
    pub plaintext_header_size: u32,
    /// Compare file length against header page count on first read
    pub check_file_length: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// 0 copies everything in one step
    pub pages_per_step: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerifySettings {
    /// Also compare row digests after conversion, not just counts
    pub compare_contents_after_convert: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cipher: default_cipher(),
            backup: default_backup(),
            verify: default_verify(),
        }
    }
}

impl Default for CipherSettings {
    fn default() -> Self {
        default_cipher()
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        default_backup()
    }
}

impl Default for VerifySettings {
    fn default() -> Self {
        default_verify()
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Process-wide read-only settings, loaded once
pub fn load() -> &'static Config {
    CONFIG.get_or_init(|| {
        let config_path =
            std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        if !Path::new(&config_path).exists() {
            tracing::debug!(path = %config_path, "no config file, using built-in defaults");
            return Config::default();
        }

        match Config::from_path(&config_path) {
            Ok(conf) => conf,
            Err(err) => {
                tracing::warn!(path = %config_path, error = %err, "ignoring unreadable config");
                Config::default()
            }
        }
    })
}
