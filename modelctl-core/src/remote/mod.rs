//! Remote expander: turns a `Repo`/`Url` source into an `InstallJob`
//! with its download parts already submitted to the download queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::Builder as TempDirBuilder;

use crate::error::{InstallError, Result};
use crate::jobs::{InstallJob, JobConfig, JobRegistry};
use crate::ports::{
    CredentialCache, DownloadCallbacks, DownloadQueue, DownloadRequest, MetadataFetcher, RemoteFile, RepoMetadata,
};
use crate::source::{RepoVariant, Source};

/// Prefix given to every scratch directory created for a remote install, so
/// startup cleanup can recognize and remove leftovers.
pub const SCRATCH_DIR_PREFIX: &str = "tmpinstall_";

pub struct RemoteExpander<'a> {
    pub models_root: &'a Path,
    pub preferred_precision_fp16: bool,
    pub metadata_fetcher: &'a dyn MetadataFetcher,
    pub download_queue: &'a dyn DownloadQueue,
    pub credential_cache: &'a dyn CredentialCache,
}

impl<'a> RemoteExpander<'a> {
    /// Resolves `source` to remote file metadata, builds the job's scratch
    /// directory, submits one download per remote file, and returns the
    /// fully wired job (still `Waiting`, parts already in flight).
    pub fn expand(
        &self,
        mut source: Source,
        config_in: JobConfig,
        registry: &JobRegistry,
        callbacks: Arc<dyn DownloadCallbacks>,
    ) -> Result<InstallJob> {
        self.fill_cached_credential(&mut source);
        let metadata = self.fetch_metadata(&source)?;
        if metadata.files.is_empty() {
            return Err(InstallError::EmptyRemote(source.to_string()));
        }

        let scratch_dir = TempDirBuilder::new()
            .prefix(SCRATCH_DIR_PREFIX)
            .tempdir_in(self.models_root)?
            .keep();

        let id = registry.next_id();
        let job = InstallJob::new_remote(
            id,
            source.clone(),
            config_in,
            metadata.api_response.clone(),
            scratch_dir.clone(),
        );
        // Insert before submitting any downloads: callbacks look the job up
        // by id via the registry, and on a fast queue a download can
        // complete before this call returns.
        registry.insert(job);

        // The metadata fetcher returns each remote file's path relative to
        // the repo root, subfolder prefix included (e.g. "vae/config.json"
        // for subfolder "vae"); stripping that prefix here is what keeps the
        // on-disk scratch layout from reproducing it.
        let subfolder_strip = match &source {
            Source::Repo {
                subfolder: Some(sub),
                ..
            } => Some(sub.clone()),
            _ => None,
        };

        let access_token = source_access_token(&source);

        let file_count = metadata.files.len();
        let noun = if file_count == 1 { "file" } else { "files" };
        tracing::info!("queuing model install: {source} ({file_count} {noun})");
        tracing::debug!(job = id, file_count, "remote files resolved for download");

        for remote_file in &metadata.files {
            let relative = match &subfolder_strip {
                Some(prefix) => remote_file
                    .path
                    .strip_prefix(prefix)
                    .unwrap_or(&remote_file.path)
                    .to_path_buf(),
                None => remote_file.path.clone(),
            };

            let dest_dir = match relative.parent() {
                Some(parent) if parent != Path::new("") => scratch_dir.join(parent),
                _ => scratch_dir.clone(),
            };

            let handle = self.download_queue.submit(
                DownloadRequest {
                    url: remote_file.url.clone(),
                    dest_dir,
                    access_token: access_token.clone(),
                },
                Arc::clone(&callbacks),
            );
            registry.register_download_part(handle, id);
            let size = remote_file.size;
            let url = remote_file.url.clone();
            registry.with_job(id, |job| {
                job.total_bytes += size;
                job.download_parts
                    .push(crate::jobs::DownloadPart::new(&crate::ports::DownloadPartInfo {
                        handle,
                        url,
                        download_path: None,
                        bytes: 0,
                        total_bytes: size,
                        content_type: None,
                    }));
            })?;
        }

        registry.get(id)
    }

    /// Repo sources fall back to the host credential cache when the caller
    /// did not supply a token explicitly; `Url` sources already had their
    /// chance to pick one up from the configured `(url_regex, token)` list
    /// at parse time and are left untouched.
    fn fill_cached_credential(&self, source: &mut Source) {
        if let Source::Repo {
            repo_id,
            access_token,
            ..
        } = source
        {
            if access_token.is_none() {
                *access_token = self.credential_cache.token_for_repo(repo_id);
            }
        }
    }

    fn fetch_metadata(&self, source: &Source) -> Result<RepoMetadata> {
        match source {
            Source::Repo {
                repo_id,
                variant,
                subfolder,
                ..
            } => {
                let variant = variant.or_else(|| self.default_variant());
                self.metadata_fetcher
                    .fetch_by_repo(repo_id, variant, subfolder.as_deref())
            }
            Source::Url { url, .. } => match self.metadata_fetcher.fetch_by_url(url) {
                Ok(metadata) if !metadata.files.is_empty() => Ok(metadata),
                _ => Ok(RepoMetadata {
                    api_response: None,
                    files: vec![RemoteFile {
                        url: url.clone(),
                        path: PathBuf::from("."),
                        size: 0,
                    }],
                }),
            },
            Source::Local { .. } => {
                unreachable!("remote expander is only invoked for Repo/Url sources")
            }
        }
    }

    fn default_variant(&self) -> Option<RepoVariant> {
        self.preferred_precision_fp16.then_some(RepoVariant::Fp16)
    }
}

fn source_access_token(source: &Source) -> Option<String> {
    match source {
        Source::Repo { access_token, .. } => access_token.clone(),
        Source::Url { access_token, .. } => access_token.clone(),
        Source::Local { .. } => None,
    }
}
