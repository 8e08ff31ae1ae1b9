//! Legacy `models.yaml` migration, one-shot and version-gated.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{InstallError, Result};
use crate::jobs::JobConfig;
use crate::ports::RecordsStore;
use crate::register::Registrar;

#[derive(Debug, Deserialize)]
struct YamlMetadata {
    version: String,
}

#[derive(Debug, Deserialize)]
struct YamlStanza {
    path: String,
    description: Option<String>,
    config: Option<String>,
}

/// Runs the one-shot `models.yaml` migration if a legacy path is configured
/// and the records store is currently empty. Returns whether a migration
/// file was found and processed (so the caller can clear the configured
/// path from its in-memory config either way).
pub fn migrate_legacy_yaml(
    legacy_yaml_path: &Path,
    models_root: &Path,
    legacy_config_root: &Path,
    registrar: &Registrar,
) -> Result<bool> {
    if !legacy_yaml_path.exists() {
        return Ok(false);
    }

    let contents = fs::read_to_string(legacy_yaml_path)?;
    let mut document: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(&contents)
        .map_err(|e| InstallError::UnsupportedMigration(e.to_string()))?;

    let metadata_value = document
        .remove("__metadata__")
        .ok_or_else(|| InstallError::UnsupportedMigration("missing __metadata__".to_string()))?;
    let metadata: YamlMetadata = serde_yaml::from_value(metadata_value)
        .map_err(|e| InstallError::UnsupportedMigration(e.to_string()))?;
    if metadata.version != "3.0.0" {
        return Err(InstallError::UnsupportedMigration(metadata.version));
    }

    tracing::info!(
        count = document.len(),
        path = %legacy_yaml_path.display(),
        "starting one-time migration of legacy models.yaml"
    );

    if registrar.records.list_all()?.is_empty() && !document.is_empty() {
        for (model_key, stanza_value) in document {
            let model_name = model_key.rsplit('/').next().unwrap_or(&model_key).to_string();
            let stanza: YamlStanza = match serde_yaml::from_value(stanza_value) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(model = %model_name, error = %e, "malformed legacy model stanza, skipping");
                    continue;
                }
            };

            let mut model_path = PathBuf::from(&stanza.path);
            if !model_path.is_absolute() {
                model_path = models_root.join(model_path);
            }

            let mut config = JobConfig {
                name: Some(model_name.clone()),
                description: stanza.description,
                ..JobConfig::default()
            };
            if let Some(legacy_config_path) = stanza.config {
                let full = legacy_config_root.join(&legacy_config_path);
                let relativized = full
                    .strip_prefix(legacy_config_root)
                    .map(PathBuf::from)
                    .unwrap_or(full);
                config.config_path = Some(relativized.to_string_lossy().replace('\\', "/"));
            }

            match registrar.register_path(&model_path, &config) {
                Ok(id) => tracing::info!(model = %model_name, key = %id, "migrated legacy model"),
                Err(e) => tracing::warn!(model = %model_name, path = %model_path.display(), error = %e, "model could not be migrated"),
            }
        }
    }

    let backup_path = legacy_yaml_path.with_extension("yaml.bak");
    fs::rename(legacy_yaml_path, &backup_path)?;

    Ok(true)
}
