//! Trait boundaries for the installer's external collaborators.
//!
//! These are interfaces only: the host application is expected to supply
//! real implementations (a database-backed records store, a networked
//! download queue, a model-format probe, ...). The `adapters` module ships
//! minimal reference implementations of each so the crate is runnable end
//! to end without a host.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::source::RepoVariant;

/// The kind of source a model was installed from, as persisted on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceType {
    Path,
    Hf,
    Url,
}

/// User-supplied overrides for a single install, plus an open-ended
/// extension bag for anything the probe or a future field needs: known
/// fields stay strongly typed, everything else lands in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_api_response: Option<serde_json::Value>,
    #[serde(default)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

/// A persisted model configuration record, as handed to/from the records store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfigRecord {
    pub key: String,
    pub base: String,
    pub model_type: String,
    /// Relative to the models root when the file lives inside it, absolute otherwise (invariant 6).
    pub path: String,
    /// Present for checkpoint-style models; relative to the legacy config root when inside it (invariant 7).
    pub config_path: Option<String>,
    pub hash: String,
    pub name: String,
    pub description: Option<String>,
    pub source: Option<String>,
    pub source_type: Option<SourceType>,
    pub source_api_response: Option<serde_json::Value>,
}

/// Partial update applied to an existing record. Only `path` is needed today
/// (by `sync_model_path`), but this stays a struct rather than a bare
/// `String` parameter so the records store's API can grow.
#[derive(Debug, Clone, Default)]
pub struct ModelRecordChanges {
    pub path: Option<String>,
}

/// Persists model configuration entries, keyed by an opaque string.
pub trait RecordsStore: Send + Sync {
    fn add(&self, record: ModelConfigRecord) -> Result<()>;
    fn get(&self, key: &str) -> Result<ModelConfigRecord>;
    fn update(&self, key: &str, changes: ModelRecordChanges) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
    fn list_all(&self) -> Result<Vec<ModelConfigRecord>>;
}

/// Result of probing a model file: its typed classification plus hash.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedModel {
    pub base: String,
    pub model_type: String,
    pub key: String,
    /// Set only for checkpoint-style models that ship a companion config file.
    pub config_path: Option<String>,
    pub hash: String,
}

/// Inspects a filesystem path (plus caller overrides) and classifies it.
pub trait Probe: Send + Sync {
    fn probe(
        &self,
        path: &std::path::Path,
        overrides: &ConfigOverrides,
        hash_algo: &str,
    ) -> Result<ProbedModel>;
}

/// One file belonging to a remote model repository.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    pub url: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Metadata about a remote repository, including its file listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepoMetadata {
    pub api_response: Option<serde_json::Value>,
    pub files: Vec<RemoteFile>,
}

/// Fetches repository metadata and remote file listings.
pub trait MetadataFetcher: Send + Sync {
    fn fetch_by_repo(
        &self,
        repo_id: &str,
        variant: Option<RepoVariant>,
        subfolder: Option<&std::path::Path>,
    ) -> Result<RepoMetadata>;

    fn fetch_by_url(&self, url: &str) -> Result<RepoMetadata>;
}

/// One download sub-job submitted to the download queue.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub dest_dir: PathBuf,
    pub access_token: Option<String>,
}

/// Opaque handle identifying a submitted download, unique for the life of
/// the queue. Used as the download-cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DownloadHandle(pub u64);

/// Snapshot of one download part's state, passed to every callback.
#[derive(Debug, Clone)]
pub struct DownloadPartInfo {
    pub handle: DownloadHandle,
    pub url: String,
    pub download_path: Option<PathBuf>,
    pub bytes: u64,
    pub total_bytes: u64,
    pub content_type: Option<String>,
}

/// Lifecycle callbacks invoked by the download queue on its own threads.
pub trait DownloadCallbacks: Send + Sync {
    fn on_start(&self, part: DownloadPartInfo);
    fn on_progress(&self, part: DownloadPartInfo);
    fn on_complete(&self, part: DownloadPartInfo);
    fn on_error(&self, part: DownloadPartInfo, error: String);
    fn on_cancelled(&self, part: DownloadPartInfo);
}

/// Accepts download jobs and reports their progress via callbacks.
pub trait DownloadQueue: Send + Sync {
    fn submit(
        &self,
        request: DownloadRequest,
        callbacks: Arc<dyn DownloadCallbacks>,
    ) -> DownloadHandle;

    fn cancel(&self, handle: DownloadHandle);
}

/// Looks up a cached access token for a repo-style source that did not
/// supply one explicitly. `repo_id` is the bare `<owner>/<name>` identifier.
pub trait CredentialCache: Send + Sync {
    fn token_for_repo(&self, repo_id: &str) -> Option<String>;
}
