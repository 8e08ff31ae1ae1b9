//! Global, read-only configuration loaded from `~/.config/modelctl/config.toml`.
//!
//! The installer never mutates this at runtime except to clear
//! `legacy_models_yaml_path` once the one-shot migration has run, so
//! that a later `start()` call does not re-migrate.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{InstallError, Result};

/// One `(url_regex, token)` pair consulted when a `Url` source has no
/// explicit access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteApiToken {
    pub url_regex: String,
    pub token: String,
}

/// Installer configuration, supplied read-only by the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Root directory under which all managed models live.
    pub models_root: PathBuf,
    /// Root directory for the URL→file convert cache (`download_and_cache`).
    pub convert_cache_root: PathBuf,
    /// Root directory that checkpoint `config_path` entries are relativized against.
    pub legacy_config_root: PathBuf,
    /// Path to a legacy `models.yaml`, if migration has not yet run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_models_yaml_path: Option<PathBuf>,
    /// Hash algorithm name passed through to the probe (e.g. "sha256").
    pub hashing_algorithm: String,
    /// Whether to walk `models_root` for orphaned models on startup.
    pub scan_models_on_startup: bool,
    /// Whether the host's preferred compute precision is fp16 (used to pick
    /// a default Hugging Face variant when the source does not specify one).
    pub preferred_precision_fp16: bool,
    /// `(url_regex, token)` pairs consulted for bare URL sources.
    #[serde(default)]
    pub remote_api_tokens: Vec<RemoteApiToken>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        let root = default_state_root();
        Self {
            models_root: root.join("models"),
            convert_cache_root: root.join("convert_cache"),
            legacy_config_root: root.join("configs"),
            legacy_models_yaml_path: None,
            hashing_algorithm: "sha256".to_string(),
            scan_models_on_startup: false,
            preferred_precision_fp16: false,
            remote_api_tokens: Vec::new(),
        }
    }
}

fn default_state_root() -> PathBuf {
    xdg::BaseDirectories::with_prefix("modelctl")
        .map(|dirs| dirs.get_state_home())
        .unwrap_or_else(|_| PathBuf::from("."))
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("modelctl")
        .map_err(|e| InstallError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    xdg_dirs
        .place_config_file("config.toml")
        .map_err(InstallError::Io)
}

/// Load configuration from disk, creating a default file if none exists yet.
pub fn load_or_init() -> Result<InstallerConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = InstallerConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)
            .map_err(|e| InstallError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!(path = %path.display(), "created default modelctl config");
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: InstallerConfig = toml::from_str(&data)
        .map_err(|e| InstallError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let cfg = InstallerConfig::default();
        assert_eq!(cfg.hashing_algorithm, "sha256");
        assert!(!cfg.scan_models_on_startup);
        assert!(cfg.remote_api_tokens.is_empty());
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut cfg = InstallerConfig::default();
        cfg.remote_api_tokens.push(RemoteApiToken {
            url_regex: "^https://example\\.com/".to_string(),
            token: "secret".to_string(),
        });
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: InstallerConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.models_root, cfg.models_root);
        assert_eq!(parsed.remote_api_tokens, cfg.remote_api_tokens);
    }
}
