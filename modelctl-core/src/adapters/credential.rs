//! Reference [`CredentialCache`]: mirrors `huggingface_hub`'s `HfFolder`
//! token lookup (env var override, then the token file `HfFolder.save_token`
//! writes) since that is the credential cache the original install service
//! reads from (`source.access_token or HfFolder.get_token()`).

use std::path::PathBuf;

use crate::ports::CredentialCache;

const TOKEN_ENV_VARS: [&str; 2] = ["HF_TOKEN", "HUGGING_FACE_HUB_TOKEN"];

/// Reads a single token shared by every repo id, from the environment or a
/// token file under `$HF_HOME/token` (default `~/.cache/huggingface/token`).
pub struct HfFolderCredentialCache {
    token_path: PathBuf,
}

impl HfFolderCredentialCache {
    pub fn new() -> Self {
        Self {
            token_path: default_token_path(),
        }
    }

    pub fn with_token_path(token_path: PathBuf) -> Self {
        Self { token_path }
    }
}

impl Default for HfFolderCredentialCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialCache for HfFolderCredentialCache {
    fn token_for_repo(&self, _repo_id: &str) -> Option<String> {
        for var in TOKEN_ENV_VARS {
            if let Ok(token) = std::env::var(var) {
                if !token.is_empty() {
                    return Some(token);
                }
            }
        }
        std::fs::read_to_string(&self.token_path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

fn default_token_path() -> PathBuf {
    if let Ok(home) = std::env::var("HF_HOME") {
        return PathBuf::from(home).join("token");
    }
    xdg::BaseDirectories::with_prefix("huggingface")
        .map(|dirs| dirs.get_cache_home().join("token"))
        .unwrap_or_else(|_| PathBuf::from(".cache/huggingface/token"))
}

/// Never has a cached token; used where no host credential store is wired up.
pub struct NoCredentialCache;

impl CredentialCache for NoCredentialCache {
    fn token_for_repo(&self, _repo_id: &str) -> Option<String> {
        None
    }
}
