//! `ModelInstaller`: the public API that wires every component together.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::bridge::InstallerCallbacks;
use crate::config::InstallerConfig;
use crate::error::{InstallError, Result};
use crate::events::EventBus;
use crate::jobs::{InstallJob, JobConfig, JobRegistry, Status};
use crate::path_ops;
use crate::ports::{
    CredentialCache, DownloadCallbacks, DownloadQueue, DownloadRequest, MetadataFetcher, Probe, RecordsStore,
};
use crate::register::Registrar;
use crate::remote::RemoteExpander;
use crate::source::{heuristic_import, Source};
use crate::startup;
use crate::sync_event::ManualResetEvent;
use crate::worker::{self, WorkerContext};

const JOB_COMPLETED_POLL: Duration = Duration::from_secs(5);
const DOWNLOADS_CHANGED_POLL: Duration = Duration::from_millis(250);

/// The installer's external collaborators, supplied by the host.
pub struct Collaborators {
    pub records: Arc<dyn RecordsStore>,
    pub probe: Arc<dyn Probe>,
    pub metadata_fetcher: Arc<dyn MetadataFetcher>,
    pub download_queue: Arc<dyn DownloadQueue>,
    pub event_bus: Arc<dyn EventBus>,
    pub credential_cache: Arc<dyn CredentialCache>,
}

struct Runtime {
    install_queue_tx: Sender<i64>,
    stop_requested: Arc<AtomicBool>,
    worker_handle: JoinHandle<()>,
}

/// Coordinates model installs from local paths, hub repos, and URLs.
pub struct ModelInstaller {
    config: Mutex<InstallerConfig>,
    collaborators: Collaborators,
    registry: Arc<JobRegistry>,
    install_completed: Arc<ManualResetEvent>,
    downloads_changed: Arc<ManualResetEvent>,
    runtime: Mutex<Option<Runtime>>,
}

impl ModelInstaller {
    pub fn new(config: InstallerConfig, collaborators: Collaborators) -> Self {
        Self {
            config: Mutex::new(config),
            collaborators,
            registry: Arc::new(JobRegistry::new()),
            install_completed: Arc::new(ManualResetEvent::new()),
            downloads_changed: Arc::new(ManualResetEvent::new()),
            runtime: Mutex::new(None),
        }
    }

    fn config_snapshot(&self) -> InstallerConfig {
        self.config.lock().unwrap().clone()
    }

    // ---------------------------------------------------------------- C8

    /// Starts the install worker and runs one-time startup maintenance:
    /// scratch-dir cleanup, legacy migration, orphan scan, and a
    /// missing-model sweep.
    pub fn start(&self) -> Result<()> {
        if self.registry.is_running() {
            return Err(InstallError::AlreadyStarted);
        }

        let cfg = self.config_snapshot();
        path_ops_ensure_dir(&cfg.models_root)?;

        startup::remove_dangling_scratch_dirs(&cfg.models_root)?;

        let registrar = Registrar {
            models_root: &cfg.models_root,
            legacy_config_root: &cfg.legacy_config_root,
            hashing_algorithm: &cfg.hashing_algorithm,
            probe: self.collaborators.probe.as_ref(),
            records: self.collaborators.records.as_ref(),
        };

        if let Some(legacy_path) = &cfg.legacy_models_yaml_path {
            match startup::migrate_legacy_yaml(
                legacy_path,
                &cfg.models_root,
                &cfg.legacy_config_root,
                &registrar,
            ) {
                Ok(_) => self.config.lock().unwrap().legacy_models_yaml_path = None,
                Err(e) => tracing::warn!(error = %e, "legacy yaml migration failed"),
            }
        }

        if cfg.scan_models_on_startup {
            if let Err(e) = startup::register_orphaned_models(&cfg.models_root, &registrar) {
                tracing::warn!(error = %e, "orphan model scan failed");
            }
        }

        match startup::scan_for_missing_models(&cfg.models_root, self.collaborators.records.as_ref()) {
            Ok(missing) => {
                for (name, path) in missing {
                    tracing::warn!(%name, %path, "missing model file");
                }
            }
            Err(e) => tracing::warn!(error = %e, "missing-model scan failed"),
        }

        let (tx, rx) = mpsc::channel();
        let stop_requested = Arc::new(AtomicBool::new(false));
        let pending = Arc::new(AtomicUsize::new(0));

        let worker_ctx = Arc::new(WorkerContext {
            registry: Arc::clone(&self.registry),
            probe: Arc::clone(&self.collaborators.probe),
            records: Arc::clone(&self.collaborators.records),
            event_bus: Arc::clone(&self.collaborators.event_bus),
            models_root: cfg.models_root.clone(),
            legacy_config_root: cfg.legacy_config_root.clone(),
            hashing_algorithm: cfg.hashing_algorithm.clone(),
            install_completed: Arc::clone(&self.install_completed),
            pending,
        });

        let stop_clone = Arc::clone(&stop_requested);
        let worker_handle = std::thread::spawn(move || worker::run(worker_ctx, rx, stop_clone));

        self.registry.set_running(true);
        *self.runtime.lock().unwrap() = Some(Runtime {
            install_queue_tx: tx,
            stop_requested,
            worker_handle,
        });
        Ok(())
    }

    /// Stops the worker and cancels every non-terminal job still in flight.
    pub fn stop(&self) -> Result<()> {
        let runtime = self.runtime.lock().unwrap().take().ok_or(InstallError::NotStarted)?;
        runtime.stop_requested.store(true, Ordering::SeqCst);

        for id in self.registry.all_non_terminal_ids() {
            if let Ok(job) = self.registry.get(id) {
                self.cancel_job(&job);
            }
        }

        drop(runtime.install_queue_tx);
        let _ = runtime.worker_handle.join();
        self.registry.set_running(false);
        Ok(())
    }

    fn callbacks(&self, tx: Sender<i64>) -> Arc<dyn DownloadCallbacks> {
        Arc::new(InstallerCallbacks {
            registry: Arc::clone(&self.registry),
            download_queue: Arc::clone(&self.collaborators.download_queue),
            install_queue: tx,
            downloads_changed: Arc::clone(&self.downloads_changed),
            event_bus: Arc::clone(&self.collaborators.event_bus),
        })
    }

    fn enqueue(&self, id: i64) -> Result<()> {
        let runtime = self.runtime.lock().unwrap();
        let runtime = runtime.as_ref().ok_or(InstallError::NotStarted)?;
        if runtime.stop_requested.load(Ordering::SeqCst) {
            if let Ok(job) = self.registry.get(id) {
                self.cancel_job(&job);
            }
        } else {
            let _ = runtime.install_queue_tx.send(id);
        }
        Ok(())
    }

    // ---------------------------------------------------------------- C3/C7

    /// Parses `source` and forwards to [`Self::import_model`].
    pub fn heuristic_import(
        &self,
        source: &str,
        config: Option<JobConfig>,
        access_token: Option<String>,
        inplace: bool,
    ) -> Result<InstallJob> {
        let cfg = self.config_snapshot();
        let parsed = heuristic_import(source, access_token, inplace, &cfg)?;
        self.import_model(parsed, config.unwrap_or_default())
    }

    /// Submits a new install job for `source`, or returns the existing
    /// non-terminal job for the same source (invariant 5).
    pub fn import_model(&self, source: Source, config_in: JobConfig) -> Result<InstallJob> {
        if let Some(existing) = self.registry.find_active_by_source(&source) {
            tracing::warn!(%source, "an active install job already exists for this source, not enqueuing");
            return Ok(existing);
        }

        let cfg = self.config_snapshot();
        // Local jobs are inserted here, after construction. Remote jobs are
        // inserted by `RemoteExpander` itself, before any download is
        // submitted, so a fast download callback always finds its job.
        let job = match &source {
            Source::Local { path, inplace } => {
                let id = self.registry.next_id();
                let job = InstallJob::new_local(id, source.clone(), config_in, path.clone(), *inplace);
                self.registry.insert(job.clone());
                self.enqueue(job.id)?;
                job
            }
            Source::Repo { .. } | Source::Url { .. } => {
                let tx = self.runtime_tx()?;
                let callbacks = self.callbacks(tx);
                let expander = RemoteExpander {
                    models_root: &cfg.models_root,
                    preferred_precision_fp16: cfg.preferred_precision_fp16,
                    metadata_fetcher: self.collaborators.metadata_fetcher.as_ref(),
                    download_queue: self.collaborators.download_queue.as_ref(),
                    credential_cache: self.collaborators.credential_cache.as_ref(),
                };
                expander.expand(source.clone(), config_in, &self.registry, callbacks)?
            }
        };

        Ok(job)
    }

    fn runtime_tx(&self) -> Result<Sender<i64>> {
        let runtime = self.runtime.lock().unwrap();
        runtime
            .as_ref()
            .map(|r| r.install_queue_tx.clone())
            .ok_or(InstallError::NotStarted)
    }

    pub fn list_jobs(&self) -> Vec<InstallJob> {
        self.registry.list()
    }

    pub fn get_job_by_id(&self, id: i64) -> Result<InstallJob> {
        self.registry.get(id)
    }

    pub fn get_job_by_source(&self, source: &Source) -> Vec<InstallJob> {
        self.registry.list_by_source(source)
    }

    /// Blocks until `job` reaches a terminal state, or `timeout` elapses.
    pub fn wait_for_job(&self, job_id: i64, timeout: Option<Duration>) -> Result<InstallJob> {
        let start = Instant::now();
        loop {
            let job = self.registry.get(job_id)?;
            if job.in_terminal_state() {
                return Ok(job);
            }
            if self.install_completed.wait(JOB_COMPLETED_POLL) {
                self.install_completed.clear();
            }
            if let Some(timeout) = timeout {
                if start.elapsed() > timeout {
                    return Err(InstallError::Timeout);
                }
            }
        }
    }

    /// Blocks until the download cache is empty, meaning every in-flight
    /// remote job has finished downloading (or errored/cancelled).
    pub fn wait_for_installs(&self, timeout: Option<Duration>) -> Result<Vec<InstallJob>> {
        let start = Instant::now();
        while self.registry.download_cache_len() > 0 {
            if self.downloads_changed.wait(DOWNLOADS_CHANGED_POLL) {
                self.downloads_changed.clear();
            }
            if let Some(timeout) = timeout {
                if start.elapsed() > timeout {
                    return Err(InstallError::Timeout);
                }
            }
        }
        Ok(self.registry.list())
    }

    /// Marks `job` cancelled and cascades cancel to its download parts
    /// (idempotent, safe from any thread).
    pub fn cancel_job(&self, job: &InstallJob) {
        let _ = self.registry.with_job(job.id, |slot| {
            if !slot.in_terminal_state() {
                slot.status = Status::Cancelled;
            }
        });
        if let Ok(job) = self.registry.get(job.id) {
            for part in &job.download_parts {
                if !part.terminal {
                    self.collaborators.download_queue.cancel(part.handle);
                }
            }
            if job.all_parts_terminal() {
                let _ = self.enqueue(job.id);
            }
        }
    }

    pub fn prune_jobs(&self) {
        self.registry.prune();
    }

    // ---------------------------------------------------------------- path ops

    /// Unregisters `key`, physically deleting the backing file only if it
    /// is managed (lives under `models_root`).
    pub fn delete(&self, key: &str) -> Result<()> {
        let cfg = self.config_snapshot();
        let record = self.collaborators.records.get(key)?;
        let resolved = resolve_record_path(&record.path, &cfg.models_root);
        if resolved.starts_with(&cfg.models_root) {
            self.unconditionally_delete_resolved(key, &resolved)
        } else {
            self.collaborators.records.delete(key)
        }
    }

    /// Always deletes the backing file (if present) then unregisters.
    pub fn unconditionally_delete(&self, key: &str) -> Result<()> {
        let cfg = self.config_snapshot();
        let record = self.collaborators.records.get(key)?;
        let resolved = resolve_record_path(&record.path, &cfg.models_root);
        self.unconditionally_delete_resolved(key, &resolved)
    }

    fn unconditionally_delete_resolved(&self, key: &str, resolved: &Path) -> Result<()> {
        let metadata = std::fs::symlink_metadata(resolved);
        match metadata {
            Ok(m) if m.is_dir() => std::fs::remove_dir_all(resolved)?,
            Ok(_) => std::fs::remove_file(resolved)?,
            Err(_) => {}
        }
        self.collaborators.records.delete(key)
    }

    /// Moves a managed model into its canonical `<base>/<type>/<name>`
    /// location if it has drifted, updating the stored record.
    pub fn sync_model_path(&self, key: &str) -> Result<crate::ports::ModelConfigRecord> {
        let cfg = self.config_snapshot();
        let mut record = self.collaborators.records.get(key)?;
        let old_path = resolve_record_path(&record.path, &cfg.models_root);

        if !old_path.starts_with(&cfg.models_root) {
            return Ok(record);
        }

        let name = old_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let new_path = cfg.models_root.join(&record.base).join(&record.model_type).join(&name);

        if old_path == new_path {
            return Ok(record);
        }

        let moved = path_ops::move_model(&old_path, &new_path)?;
        let relative = moved
            .strip_prefix(&cfg.models_root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| moved.to_string_lossy().replace('\\', "/"));
        self.collaborators.records.update(
            key,
            crate::ports::ModelRecordChanges {
                path: Some(relative.clone()),
            },
        )?;
        record.path = relative;
        Ok(record)
    }

    /// Downloads `source` into the URL→file convert cache, returning the
    /// cached file's path; a second call for the same source returns the
    /// cached copy without downloading again.
    pub fn download_and_cache(
        &self,
        source: &str,
        access_token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<PathBuf> {
        let cfg = self.config_snapshot();
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        let digest = hex::encode(hasher.finalize());
        let cache_dir = cfg.convert_cache_root.join(&digest[0..32]);

        if cache_dir.exists() {
            if let Some(existing) = first_file_in(&cache_dir) {
                return Ok(existing);
            }
        }
        std::fs::create_dir_all(&cache_dir)?;

        let (tx, rx) = mpsc::channel::<DownloadOutcome>();
        let callbacks: Arc<dyn DownloadCallbacks> = Arc::new(ConvertCacheCallbacks { tx });
        self.collaborators.download_queue.submit(
            DownloadRequest {
                url: source.to_string(),
                dest_dir: cache_dir.clone(),
                access_token,
            },
            callbacks,
        );

        let outcome = match timeout {
            Some(t) => rx.recv_timeout(t).map_err(|_| InstallError::Timeout)?,
            None => rx.recv().map_err(|_| InstallError::Timeout)?,
        };

        match outcome {
            DownloadOutcome::Complete(path) => Ok(path),
            DownloadOutcome::Failed(message) => Err(InstallError::DownloadFailed(message)),
        }
    }
}

enum DownloadOutcome {
    Complete(PathBuf),
    Failed(String),
}

struct ConvertCacheCallbacks {
    tx: Sender<DownloadOutcome>,
}

impl DownloadCallbacks for ConvertCacheCallbacks {
    fn on_start(&self, _: crate::ports::DownloadPartInfo) {}
    fn on_progress(&self, _: crate::ports::DownloadPartInfo) {}
    fn on_complete(&self, part: crate::ports::DownloadPartInfo) {
        let path = part.download_path.unwrap_or_default();
        let _ = self.tx.send(DownloadOutcome::Complete(path));
    }
    fn on_error(&self, _: crate::ports::DownloadPartInfo, error: String) {
        let _ = self.tx.send(DownloadOutcome::Failed(error));
    }
    fn on_cancelled(&self, _: crate::ports::DownloadPartInfo) {
        let _ = self.tx.send(DownloadOutcome::Failed("download cancelled".to_string()));
    }
}

fn first_file_in(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .find(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
}

fn resolve_record_path(record_path: &str, models_root: &Path) -> PathBuf {
    let path = Path::new(record_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        models_root.join(path)
    }
}

fn path_ops_ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}
