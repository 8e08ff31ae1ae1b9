//! Register pipeline: probing a model on disk and persisting its record.

use std::path::{Path, PathBuf};

use crate::error::{InstallError, Result};
use crate::jobs::JobConfig;
use crate::path_ops;
use crate::ports::{
    ConfigOverrides, ModelConfigRecord, Probe, RecordsStore, SourceType as PortSourceType,
};

pub struct Registrar<'a> {
    pub models_root: &'a Path,
    pub legacy_config_root: &'a Path,
    pub hashing_algorithm: &'a str,
    pub probe: &'a dyn Probe,
    pub records: &'a dyn RecordsStore,
}

impl<'a> Registrar<'a> {
    /// Probes `path` and persists it in place, without moving anything.
    /// Stamps `config.source`/`config.source_type` as `PATH` when the caller
    /// did not already set a source. Returns the record's key.
    pub fn register_path(&self, path: &Path, config: &JobConfig) -> Result<String> {
        let overrides = to_overrides(config);
        let probed = self.probe.probe(path, &overrides, self.hashing_algorithm)?;

        let (source, source_type) = match &config.source {
            Some(source) => (Some(source.clone()), config.source_type),
            None => (
                Some(path.to_string_lossy().into_owned()),
                Some(PortSourceType::Path),
            ),
        };

        let record = self.build_record(&probed, config, path, source, source_type)?;
        let key = record.key.clone();
        self.records.add(record)?;
        Ok(key)
    }

    /// Probes `path`, copies it into the managed tree under
    /// `<models_root>/<base>/<type>/<name>`, then registers the new
    /// location. Fails with `Duplicate` if that location is already
    /// occupied.
    pub fn install_path(&self, path: &Path, config: &JobConfig) -> Result<String> {
        let overrides = to_overrides(config);
        let probed = self.probe.probe(path, &overrides, self.hashing_algorithm)?;

        let file_name = destination_file_name(path, config.name.as_deref());
        let dest = self
            .models_root
            .join(&probed.base)
            .join(&probed.model_type)
            .join(&file_name);

        if dest.exists() {
            return Err(InstallError::Duplicate(dest));
        }

        path_ops::copy_model(path, &dest)?;

        let record = self.build_record(
            &probed,
            config,
            &dest,
            config.source.clone(),
            config.source_type,
        )?;
        let key = record.key.clone();
        self.records.add(record)?;
        Ok(key)
    }

    fn build_record(
        &self,
        probed: &crate::ports::ProbedModel,
        config: &JobConfig,
        on_disk_path: &Path,
        source: Option<String>,
        source_type: Option<PortSourceType>,
    ) -> Result<ModelConfigRecord> {
        let resolved = on_disk_path
            .canonicalize()
            .unwrap_or_else(|_| on_disk_path.to_path_buf());
        let relativized_path = relativize(&resolved, self.models_root);

        let config_path = probed.config_path.as_ref().map(|cp| {
            let legacy_path = self.legacy_config_root.join(cp);
            let relativized = relativize(&legacy_path, self.legacy_config_root);
            relativized.to_string_lossy().replace('\\', "/")
        });

        Ok(ModelConfigRecord {
            key: probed.key.clone(),
            base: probed.base.clone(),
            model_type: probed.model_type.clone(),
            path: relativized_path.to_string_lossy().replace('\\', "/"),
            config_path,
            hash: probed.hash.clone(),
            name: config
                .name
                .clone()
                .unwrap_or_else(|| default_name(on_disk_path)),
            description: config.description.clone(),
            source,
            source_type,
            source_api_response: config.source_api_response.clone(),
        })
    }
}

/// Relativizes `path` against `root` when `path` lives inside it (invariants
/// 6/7); returns `path` unchanged (absolute) otherwise.
fn relativize(path: &Path, root: &Path) -> PathBuf {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    path.strip_prefix(&root)
        .map(PathBuf::from)
        .unwrap_or_else(|_| path.to_path_buf())
}

fn default_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// The destination filename for an installed model: `config_name` if given,
/// with the original file's extension preserved, else the original filename
/// unchanged.
fn destination_file_name(source_path: &Path, config_name: Option<&str>) -> String {
    let Some(name) = config_name else {
        return default_name(source_path);
    };
    if Path::new(name).extension().is_some() {
        return name.to_string();
    }
    match source_path.extension() {
        Some(ext) => format!("{name}.{}", ext.to_string_lossy()),
        None => name.to_string(),
    }
}

fn to_overrides(config: &JobConfig) -> ConfigOverrides {
    ConfigOverrides {
        name: config.name.clone(),
        description: config.description.clone(),
        config_path: config.config_path.clone(),
        source: config.source.clone(),
        source_type: config.source_type.map(|st| match st {
            PortSourceType::Path => PortSourceType::Path,
            PortSourceType::Hf => PortSourceType::Hf,
            PortSourceType::Url => PortSourceType::Url,
        }),
        source_api_response: config.source_api_response.clone(),
        extra: config.extra.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstallError;
    use crate::ports::{ModelRecordChanges, ProbedModel};
    use std::cell::RefCell;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct FixedProbe(ProbedModel);

    impl Probe for FixedProbe {
        fn probe(
            &self,
            _path: &Path,
            _overrides: &ConfigOverrides,
            _hash_algo: &str,
        ) -> Result<ProbedModel> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct InMemoryRecords {
        records: Mutex<RefCell<Vec<ModelConfigRecord>>>,
    }

    impl RecordsStore for InMemoryRecords {
        fn add(&self, record: ModelConfigRecord) -> Result<()> {
            self.records.lock().unwrap().borrow_mut().push(record);
            Ok(())
        }
        fn get(&self, key: &str) -> Result<ModelConfigRecord> {
            self.records
                .lock()
                .unwrap()
                .borrow()
                .iter()
                .find(|r| r.key == key)
                .cloned()
                .ok_or_else(|| InstallError::UnknownModel(key.to_string()))
        }
        fn update(&self, _key: &str, _changes: ModelRecordChanges) -> Result<()> {
            Ok(())
        }
        fn delete(&self, key: &str) -> Result<()> {
            self.records
                .lock()
                .unwrap()
                .borrow_mut()
                .retain(|r| r.key != key);
            Ok(())
        }
        fn list_all(&self) -> Result<Vec<ModelConfigRecord>> {
            Ok(self.records.lock().unwrap().borrow().clone())
        }
    }

    fn probe_for(base: &str, model_type: &str) -> FixedProbe {
        FixedProbe(ProbedModel {
            base: base.to_string(),
            model_type: model_type.to_string(),
            key: "key-1".to_string(),
            config_path: None,
            hash: "deadbeef".to_string(),
        })
    }

    #[test]
    fn register_path_leaves_the_file_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.safetensors");
        fs::write(&path, b"x").unwrap();

        let probe = probe_for("sdxl", "main");
        let records = InMemoryRecords::default();
        let registrar = Registrar {
            models_root: dir.path(),
            legacy_config_root: dir.path(),
            hashing_algorithm: "sha256",
            probe: &probe,
            records: &records,
        };

        let key = registrar.register_path(&path, &JobConfig::default()).unwrap();
        assert_eq!(key, "key-1");
        assert!(path.exists());
    }

    #[test]
    fn install_path_copies_into_managed_tree_with_relative_path() {
        let dir = tempdir().unwrap();
        let models_root = dir.path().join("models");
        fs::create_dir_all(&models_root).unwrap();
        let src = dir.path().join("m.safetensors");
        fs::write(&src, b"x").unwrap();

        let probe = probe_for("sdxl", "main");
        let records = InMemoryRecords::default();
        let registrar = Registrar {
            models_root: &models_root,
            legacy_config_root: &models_root,
            hashing_algorithm: "sha256",
            probe: &probe,
            records: &records,
        };

        let key = registrar.install_path(&src, &JobConfig::default()).unwrap();
        let record = records.get(&key).unwrap();
        assert_eq!(record.path, "sdxl/main/m.safetensors");
        assert!(models_root.join("sdxl/main/m.safetensors").exists());
    }

    #[test]
    fn install_path_fails_with_duplicate_when_destination_exists() {
        let dir = tempdir().unwrap();
        let models_root = dir.path().join("models");
        fs::create_dir_all(models_root.join("sdxl/main")).unwrap();
        fs::write(models_root.join("sdxl/main/m.safetensors"), b"existing").unwrap();
        let src = dir.path().join("m.safetensors");
        fs::write(&src, b"x").unwrap();

        let probe = probe_for("sdxl", "main");
        let records = InMemoryRecords::default();
        let registrar = Registrar {
            models_root: &models_root,
            legacy_config_root: &models_root,
            hashing_algorithm: "sha256",
            probe: &probe,
            records: &records,
        };

        let err = registrar
            .install_path(&src, &JobConfig::default())
            .unwrap_err();
        assert!(matches!(err, InstallError::Duplicate(_)));
    }
}
