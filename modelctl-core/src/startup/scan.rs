//! Startup maintenance: scratch-dir scrubbing and model directory scans.

use std::fs;
use std::path::Path;

use crate::error::{InstallError, Result};
use crate::jobs::JobConfig;
use crate::ports::RecordsStore;
use crate::register::Registrar;
use crate::remote::SCRATCH_DIR_PREFIX;

/// Removes any leftover `tmpinstall_*` scratch directories from aborted
/// installs, directly under `models_root`.
pub fn remove_dangling_scratch_dirs(models_root: &Path) -> Result<()> {
    if !models_root.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(models_root)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(SCRATCH_DIR_PREFIX) {
            tracing::info!(path = %entry.path().display(), "removing dangling temporary directory");
            fs::remove_dir_all(entry.path())?;
        }
    }
    Ok(())
}

/// Walks `models_root` for files not yet in the records store and registers
/// them. Skips anything already known and anything under `<models_root>/core`.
pub fn register_orphaned_models(models_root: &Path, registrar: &Registrar) -> Result<usize> {
    let known_paths: std::collections::HashSet<_> = registrar
        .records
        .list_all()?
        .into_iter()
        .map(|record| {
            let path = Path::new(&record.path);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                models_root.join(path)
            }
        })
        .collect();

    let core_dir = models_root.join("core");
    let mut registered = 0;
    for candidate in walk_files(models_root) {
        if candidate.starts_with(&core_dir) {
            continue;
        }
        let resolved = candidate.canonicalize().unwrap_or_else(|_| candidate.clone());
        if known_paths.contains(&resolved) {
            tracing::debug!(path = %candidate.display(), "orphan scan: already known");
            continue;
        }
        match registrar.register_path(&candidate, &JobConfig::default()) {
            Ok(_) => registered += 1,
            Err(InstallError::Duplicate(_)) => {}
            Err(e) => tracing::warn!(path = %candidate.display(), error = %e, "failed to register orphaned model"),
        }
    }
    tracing::info!(registered, "orphan scan complete");
    Ok(registered)
}

fn walk_files(root: &Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir(root) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            out.extend(walk_files(&path));
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    out
}

/// Returns the name and stored path of every record whose backing file no
/// longer exists on disk.
pub fn scan_for_missing_models(
    models_root: &Path,
    records: &dyn RecordsStore,
) -> Result<Vec<(String, String)>> {
    let mut missing = Vec::new();
    for record in records.list_all()? {
        let path = Path::new(&record.path);
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            models_root.join(path)
        };
        if !resolved.exists() {
            missing.push((record.name.clone(), record.path.clone()));
        }
    }
    Ok(missing)
}
