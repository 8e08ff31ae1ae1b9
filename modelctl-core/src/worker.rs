//! Install worker: the single consumer of the install queue.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::events::{EventBus, InstallEvent};
use crate::jobs::{InstallJob, JobRegistry, Status};
use crate::ports::{Probe, RecordsStore, SourceType as PortSourceType};
use crate::register::Registrar;
use crate::source::Source;
use crate::sync_event::ManualResetEvent;

const QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Everything the worker needs to finalize a job, owned jointly with the
/// rest of the service.
pub struct WorkerContext {
    pub registry: Arc<JobRegistry>,
    pub probe: Arc<dyn Probe>,
    pub records: Arc<dyn RecordsStore>,
    pub event_bus: Arc<dyn EventBus>,
    pub models_root: PathBuf,
    pub legacy_config_root: PathBuf,
    pub hashing_algorithm: String,
    pub install_completed: Arc<ManualResetEvent>,
    /// Number of jobs pushed into the install queue but not yet finalized;
    /// `wait_for_installs` treats zero-and-empty-cache as "drained".
    pub pending: Arc<AtomicUsize>,
}

/// Runs the worker loop until `stop_requested` is set, after finishing
/// whatever item it is currently processing.
pub fn run(ctx: Arc<WorkerContext>, receiver: Receiver<i64>, stop_requested: Arc<AtomicBool>) {
    loop {
        let job_id = match receiver.recv_timeout(QUEUE_POLL_INTERVAL) {
            Ok(id) => id,
            Err(RecvTimeoutError::Timeout) => {
                if stop_requested.load(Ordering::SeqCst) {
                    return;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        };
        process_one(&ctx, job_id);
        ctx.pending.fetch_sub(1, Ordering::SeqCst);
        ctx.install_completed.set();
        if stop_requested.load(Ordering::SeqCst) {
            return;
        }
    }
}

fn process_one(ctx: &WorkerContext, job_id: i64) {
    let job = match ctx.registry.get(job_id) {
        Ok(job) => job,
        Err(_) => return,
    };

    let scratch_dir = job.scratch_dir.clone();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| dispatch(ctx, job)));

    if let Some(dir) = scratch_dir {
        if dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                tracing::warn!(job = job_id, error = %e, "failed to remove scratch dir");
            }
        }
    }

    if let Err(panic) = result {
        let message = panic_message(&panic);
        let _ = ctx.registry.with_job(job_id, |job| {
            job.set_error("Panic", message.clone());
        });
        emit_error_for(ctx, job_id, "Panic", &message);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

fn emit_error_for(ctx: &WorkerContext, job_id: i64, error_type: &str, message: &str) {
    if let Ok(job) = ctx.registry.get(job_id) {
        ctx.event_bus.emit(InstallEvent::Error {
            source: job.source.to_string(),
            id: job_id,
            error_type: error_type.to_string(),
            error: message.to_string(),
        });
    }
}

fn dispatch(ctx: &WorkerContext, job: InstallJob) {
    match job.status {
        Status::Cancelled => {
            ctx.event_bus.emit(InstallEvent::Cancelled {
                source: job.source.to_string(),
                id: job.id,
            });
        }
        Status::Error => {
            ctx.event_bus.emit(InstallEvent::Error {
                source: job.source.to_string(),
                id: job.id,
                error_type: job.error_type.clone().unwrap_or_default(),
                error: job.error.clone().unwrap_or_default(),
            });
        }
        Status::Waiting | Status::DownloadsDone => {
            register_or_install(ctx, job);
        }
        other => {
            tracing::warn!(job = job.id, status = ?other, "install worker saw an unexpected status");
        }
    }
}

/// The register-or-install finalization step.
fn register_or_install(ctx: &WorkerContext, mut job: InstallJob) {
    let job_id = job.id;
    job.total_bytes = crate::path_ops::recursive_size(&job.local_path);
    job.bytes = job.total_bytes;
    job.status = Status::Running;

    ctx.event_bus.emit(InstallEvent::Running {
        source: job.source.to_string(),
        id: job_id,
    });

    stamp_source(&mut job);

    let registrar = Registrar {
        models_root: &ctx.models_root,
        legacy_config_root: &ctx.legacy_config_root,
        hashing_algorithm: &ctx.hashing_algorithm,
        probe: ctx.probe.as_ref(),
        records: ctx.records.as_ref(),
    };

    let result = if job.inplace {
        registrar.register_path(&job.local_path, &job.config_in)
    } else {
        registrar.install_path(&job.local_path, &job.config_in)
    };

    match result {
        Ok(key) => {
            let record = ctx.records.get(&key).ok();
            job.config_out = record;
            job.status = Status::Completed;
            ctx.event_bus.emit(InstallEvent::Completed {
                source: job.source.to_string(),
                id: job_id,
                key,
            });
        }
        Err(e) => {
            let (error_type, message) = match html_auth_wall(&job) {
                Some(path) => (
                    "InvalidModelConfig",
                    format!(
                        "at least one file in {} is an HTML page, not a model; \
                         this can happen when an access token is required to download",
                        path.display()
                    ),
                ),
                None => (error_type_name(&e), e.to_string()),
            };
            job.set_error(error_type, message.clone());
            ctx.event_bus.emit(InstallEvent::Error {
                source: job.source.to_string(),
                id: job_id,
                error_type: error_type.to_string(),
                error: message,
            });
        }
    }

    ctx.registry.with_job(job_id, |slot| *slot = job).ok();
}

/// If any downloaded part came back as an HTML page, its local path - this
/// overrides whatever the probe's real error was.
fn html_auth_wall(job: &InstallJob) -> Option<PathBuf> {
    job.download_parts
        .iter()
        .find(|p| {
            p.content_type
                .as_deref()
                .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
                .unwrap_or(false)
        })
        .map(|p| p.download_path.clone().unwrap_or_else(|| job.local_path.clone()))
}

fn error_type_name(err: &crate::error::InstallError) -> &'static str {
    use crate::error::InstallError::*;
    match err {
        BadSource(_) => "BadSource",
        Duplicate(_) => "Duplicate",
        InvalidModelConfig(_) => "InvalidModelConfig",
        EmptyRemote(_) => "EmptyRemote",
        UnsupportedMigration(_) => "UnsupportedMigration",
        NotFound(_) => "NotFound",
        UnknownModel(_) => "UnknownModel",
        AlreadyStarted => "AlreadyStarted",
        NotStarted => "NotStarted",
        Timeout => "Timeout",
        DownloadFailed(_) => "DownloadFailed",
        Io(_) => "Io",
    }
}

fn stamp_source(job: &mut InstallJob) {
    let (source_str, source_type) = match &job.source {
        Source::Local { path, .. } => (path.to_string_lossy().into_owned(), PortSourceType::Path),
        Source::Repo { repo_id, .. } => (repo_id.clone(), PortSourceType::Hf),
        Source::Url { url, .. } => (url.clone(), PortSourceType::Url),
    };
    job.config_in.source = Some(source_str);
    job.config_in.source_type = Some(source_type);
    if let Some(Value::Object(_)) = &job.source_metadata {
        job.config_in.source_api_response = job.source_metadata.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventBus;
    use crate::jobs::{DownloadPart, JobConfig};
    use crate::ports::{
        ConfigOverrides, DownloadHandle, DownloadPartInfo, ModelConfigRecord, ModelRecordChanges,
        ProbedModel,
    };
    use std::cell::RefCell;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct FixedProbe(ProbedModel);
    impl Probe for FixedProbe {
        fn probe(&self, _: &std::path::Path, _: &ConfigOverrides, _: &str) -> crate::error::Result<ProbedModel> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct InMemoryRecords(Mutex<RefCell<Vec<ModelConfigRecord>>>);
    impl RecordsStore for InMemoryRecords {
        fn add(&self, record: ModelConfigRecord) -> crate::error::Result<()> {
            self.0.lock().unwrap().borrow_mut().push(record);
            Ok(())
        }
        fn get(&self, key: &str) -> crate::error::Result<ModelConfigRecord> {
            self.0
                .lock()
                .unwrap()
                .borrow()
                .iter()
                .find(|r| r.key == key)
                .cloned()
                .ok_or_else(|| crate::error::InstallError::UnknownModel(key.to_string()))
        }
        fn update(&self, _: &str, _: ModelRecordChanges) -> crate::error::Result<()> {
            Ok(())
        }
        fn delete(&self, _: &str) -> crate::error::Result<()> {
            Ok(())
        }
        fn list_all(&self) -> crate::error::Result<Vec<ModelConfigRecord>> {
            Ok(self.0.lock().unwrap().borrow().clone())
        }
    }

    fn ctx(models_root: PathBuf, probe: ProbedModel) -> (Arc<WorkerContext>, Arc<RecordingEventBus>) {
        let events = Arc::new(RecordingEventBus::new());
        let ctx = Arc::new(WorkerContext {
            registry: Arc::new(JobRegistry::new()),
            probe: Arc::new(FixedProbe(probe)),
            records: Arc::new(InMemoryRecords::default()),
            event_bus: events.clone(),
            models_root: models_root.clone(),
            legacy_config_root: models_root,
            hashing_algorithm: "sha256".to_string(),
            install_completed: Arc::new(ManualResetEvent::new()),
            pending: Arc::new(AtomicUsize::new(0)),
        });
        (ctx, events)
    }

    fn probed(base: &str, model_type: &str) -> ProbedModel {
        ProbedModel {
            base: base.to_string(),
            model_type: model_type.to_string(),
            key: "key-1".to_string(),
            config_path: None,
            hash: "deadbeef".to_string(),
        }
    }

    #[test]
    fn register_or_install_completes_a_local_copy_job() {
        let dir = tempdir().unwrap();
        let models_root = dir.path().join("models");
        fs::create_dir_all(&models_root).unwrap();
        let src = dir.path().join("m.safetensors");
        fs::write(&src, b"hi").unwrap();

        let (ctx, events) = ctx(models_root.clone(), probed("sdxl", "main"));
        let job = InstallJob::new_local(
            0,
            Source::Local {
                path: src.clone(),
                inplace: false,
            },
            JobConfig::default(),
            src,
            false,
        );
        ctx.registry.insert(job.clone());

        register_or_install(&ctx, job);

        let stored = ctx.registry.get(0).unwrap();
        assert!(stored.complete());
        assert!(models_root.join("sdxl/main/m.safetensors").exists());
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, crate::events::InstallEvent::Completed { id: 0, .. })));
    }

    #[test]
    fn register_or_install_surfaces_html_auth_wall_error() {
        let dir = tempdir().unwrap();
        let models_root = dir.path().join("models");
        fs::create_dir_all(&models_root).unwrap();
        let src = dir.path().join("m.safetensors");
        fs::write(&src, b"<html>login please</html>").unwrap();

        struct FailingProbe;
        impl Probe for FailingProbe {
            fn probe(
                &self,
                _: &std::path::Path,
                _: &ConfigOverrides,
                _: &str,
            ) -> crate::error::Result<ProbedModel> {
                Err(crate::error::InstallError::InvalidModelConfig(
                    "unrecognized format".to_string(),
                ))
            }
        }

        let events = Arc::new(RecordingEventBus::new());
        let ctx = Arc::new(WorkerContext {
            registry: Arc::new(JobRegistry::new()),
            probe: Arc::new(FailingProbe),
            records: Arc::new(InMemoryRecords::default()),
            event_bus: events.clone(),
            models_root: models_root.clone(),
            legacy_config_root: models_root,
            hashing_algorithm: "sha256".to_string(),
            install_completed: Arc::new(ManualResetEvent::new()),
            pending: Arc::new(AtomicUsize::new(0)),
        });

        let mut job = InstallJob::new_remote(
            1,
            Source::Url {
                url: "https://example.com/m.safetensors".into(),
                access_token: None,
            },
            JobConfig::default(),
            None,
            dir.path().join("scratch"),
        );
        job.local_path = src.clone();
        job.download_parts.push(DownloadPart::new(&DownloadPartInfo {
            handle: DownloadHandle(1),
            url: "https://example.com/m.safetensors".into(),
            download_path: Some(src.clone()),
            bytes: 10,
            total_bytes: 10,
            content_type: Some("text/html; charset=utf-8".to_string()),
        }));
        ctx.registry.insert(job.clone());

        register_or_install(&ctx, job);

        let stored = ctx.registry.get(1).unwrap();
        assert!(stored.errored());
        assert_eq!(stored.error_type.as_deref(), Some("InvalidModelConfig"));
        assert!(stored.error.as_ref().unwrap().contains("HTML page"));
    }
}
