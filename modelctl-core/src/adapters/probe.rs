//! Extension/magic-byte sniffing reference implementation of [`Probe`].
//!
//! Real deployments replace this with something that actually inspects model
//! weights (safetensors header, diffusers `model_index.json`, ...); this one
//! only looks at the file extension and directory shape, which is enough to
//! drive the installer end to end in the demo CLI and in tests.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{InstallError, Result};
use crate::ports::{ConfigOverrides, Probe, ProbedModel};

const CHECKPOINT_EXTENSIONS: &[&str] = &["ckpt", "pt", "pth"];
const SAFETENSOR_EXTENSIONS: &[&str] = &["safetensors", "bin"];

/// Known base-model monikers looked for (case-insensitively) in the
/// candidate's path components; `"unknown"` when none match.
const KNOWN_BASES: &[&str] = &["sdxl", "sd-1", "sd-2", "sd-3", "flux"];

#[derive(Debug, Default)]
pub struct ExtensionProbe;

impl ExtensionProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Probe for ExtensionProbe {
    fn probe(&self, path: &Path, overrides: &ConfigOverrides, hash_algo: &str) -> Result<ProbedModel> {
        if !path.exists() {
            return Err(InstallError::InvalidModelConfig(format!(
                "{} does not exist",
                path.display()
            )));
        }
        if hash_algo != "sha256" {
            return Err(InstallError::InvalidModelConfig(format!(
                "unsupported hashing algorithm: {hash_algo}"
            )));
        }

        let base = guess_base(path, overrides);
        let model_type = guess_type(path)?;
        let hash = hash_path(path)?;
        let config_path = companion_config_path(path);

        Ok(ProbedModel {
            base,
            model_type,
            key: hash.clone(),
            config_path,
            hash,
        })
    }
}

fn guess_base(path: &Path, overrides: &ConfigOverrides) -> String {
    if let Some(extra) = overrides.extra.get("base").and_then(|v| v.as_str()) {
        return extra.to_string();
    }
    let haystack = path.to_string_lossy().to_ascii_lowercase();
    KNOWN_BASES
        .iter()
        .find(|moniker| haystack.contains(*moniker))
        .map(|moniker| moniker.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn guess_type(path: &Path) -> Result<String> {
    if path.is_dir() {
        return Ok("main".to_string());
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if !SAFETENSOR_EXTENSIONS.contains(&ext.as_str()) && !CHECKPOINT_EXTENSIONS.contains(&ext.as_str()) {
        return Err(InstallError::InvalidModelConfig(format!(
            "unrecognized model file extension: .{ext}"
        )));
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if stem.contains("lora") {
        return Ok("lora".to_string());
    }
    if stem.contains("vae") {
        return Ok("vae".to_string());
    }
    if stem.contains("controlnet") {
        return Ok("controlnet".to_string());
    }
    Ok("main".to_string())
}

/// Checkpoint-style files (`.ckpt`/`.pt`/`.pth`) ship a companion `<stem>.yaml`
/// alongside them in the wild; surface it if present so the register pipeline
/// can relativize and persist it (invariant 7).
fn companion_config_path(path: &Path) -> Option<PathBuf> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    if !CHECKPOINT_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    let candidate = path.with_extension("yaml");
    candidate.exists().then_some(candidate)
}

fn hash_path(path: &Path) -> Result<String> {
    if path.is_dir() {
        return hash_dir(path);
    }
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hashes a directory by combining the per-file hash of every regular file
/// beneath it, in sorted relative-path order, rather than re-reading
/// potentially huge weight files twice.
fn hash_dir(root: &Path) -> Result<String> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort();

    let mut hasher = Sha256::new();
    for relative in files {
        let file_hash = hash_path(&root.join(&relative))?;
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update(file_hash.as_bytes());
    }
    Ok(hex::encode(hasher.finalize()))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            out.push(path.strip_prefix(root).unwrap_or(&path).to_path_buf());
        }
    }
    Ok(())
}
