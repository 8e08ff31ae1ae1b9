//! Hugging-Face-shaped reference implementation of [`MetadataFetcher`].
//!
//! Lists a repo's files via the public Hugging Face model-info API. The HTTP
//! transport is injectable (see [`MetadataTransport`]) so tests can drive
//! this against a canned response instead of the network.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{InstallError, Result};
use crate::ports::{MetadataFetcher, RemoteFile, RepoMetadata};
use crate::source::RepoVariant;

/// Fetches raw bytes for a metadata URL. Implemented by [`HttpTransport`] for
/// real use and by a canned fake in tests.
pub trait MetadataTransport: Send + Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

/// Real transport: a blocking GET via `curl`, the same HTTP client the
/// installer's other collaborators (download queue, convert cache) use.
#[derive(Debug, Default)]
pub struct HttpTransport;

impl MetadataTransport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut easy = curl::easy::Easy::new();
        easy.url(url)
            .map_err(|e| InstallError::InvalidModelConfig(format!("invalid metadata URL: {e}")))?;
        easy.follow_location(true)
            .map_err(|e| InstallError::InvalidModelConfig(e.to_string()))?;
        easy.useragent("modelctl/0.1")
            .map_err(|e| InstallError::InvalidModelConfig(e.to_string()))?;
        {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    buf.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(|e| InstallError::InvalidModelConfig(e.to_string()))?;
            transfer
                .perform()
                .map_err(|e| InstallError::InvalidModelConfig(format!("metadata fetch failed: {e}")))?;
        }
        let code = easy
            .response_code()
            .map_err(|e| InstallError::InvalidModelConfig(e.to_string()))?;
        if !(200..300).contains(&code) {
            return Err(InstallError::InvalidModelConfig(format!(
                "metadata fetch for {url} returned HTTP {code}"
            )));
        }
        Ok(buf)
    }
}

#[derive(Debug, Deserialize)]
struct HfSibling {
    rfilename: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct HfModelInfo {
    #[serde(default)]
    siblings: Vec<HfSibling>,
}

/// Lists a Hugging-Face-style repo's files via `https://huggingface.co/api/models/<repo_id>`.
pub struct HuggingFaceMetadataFetcher {
    transport: Box<dyn MetadataTransport>,
    api_base: String,
    resolve_base: String,
}

impl HuggingFaceMetadataFetcher {
    pub fn new(transport: impl MetadataTransport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            api_base: "https://huggingface.co/api/models".to_string(),
            resolve_base: "https://huggingface.co".to_string(),
        }
    }

    /// Parses `https://huggingface.co/<owner>/<repo>` into `<owner>/<repo>`,
    /// the only URL shape the remote expander currently derives a fetcher
    /// from.
    pub fn repo_id_from_url(url: &str) -> Option<String> {
        let rest = url
            .strip_prefix("https://huggingface.co/")
            .or_else(|| url.strip_prefix("http://huggingface.co/"))?;
        let rest = rest.trim_end_matches('/');
        let mut parts = rest.splitn(3, '/');
        let owner = parts.next()?;
        let repo = parts.next()?;
        if owner.is_empty() || repo.is_empty() || parts.next().is_some() {
            return None;
        }
        Some(format!("{owner}/{repo}"))
    }

    fn list_files(&self, repo_id: &str, variant: Option<RepoVariant>, subfolder: Option<&std::path::Path>) -> Result<RepoMetadata> {
        let revision = variant.map(RepoVariant::as_str).unwrap_or("main");
        let url = format!("{}/{repo_id}/revision/{revision}", self.api_base);
        let body = self.transport.get(&url)?;
        let info: HfModelInfo = serde_json::from_slice(&body)
            .map_err(|e| InstallError::InvalidModelConfig(format!("malformed HF model-info response: {e}")))?;
        let api_response: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

        let subfolder_prefix = subfolder.map(|s| format!("{}/", s.to_string_lossy()));
        let files = info
            .siblings
            .into_iter()
            .filter(|s| {
                subfolder_prefix
                    .as_ref()
                    .map(|prefix| s.rfilename.starts_with(prefix.as_str()))
                    .unwrap_or(true)
            })
            .map(|s| RemoteFile {
                url: format!("{}/{repo_id}/resolve/{revision}/{}", self.resolve_base, s.rfilename),
                path: PathBuf::from(s.rfilename),
                size: s.size.unwrap_or(0),
            })
            .collect();

        Ok(RepoMetadata {
            api_response: Some(api_response),
            files,
        })
    }
}

impl MetadataFetcher for HuggingFaceMetadataFetcher {
    fn fetch_by_repo(
        &self,
        repo_id: &str,
        variant: Option<RepoVariant>,
        subfolder: Option<&std::path::Path>,
    ) -> Result<RepoMetadata> {
        self.list_files(repo_id, variant, subfolder)
    }

    fn fetch_by_url(&self, url: &str) -> Result<RepoMetadata> {
        match Self::repo_id_from_url(url) {
            Some(repo_id) => self.list_files(&repo_id, None, None),
            None => Ok(RepoMetadata::default()),
        }
    }
}
