//! Download-callback bridge: the `DownloadCallbacks` implementation the
//! installer hands to the download queue when submitting remote parts.
//!
//! Every callback body runs under the job registry's lock (design note:
//! "callback dispatch under lock") and must never re-enter the download
//! queue while holding it - cascade cancellation calls `cancel` on the
//! queue, which must be non-blocking.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::events::{DownloadPartSnapshot, EventBus, InstallEvent};
use crate::jobs::{InstallJob, JobRegistry, Status};
use crate::ports::{DownloadCallbacks, DownloadPartInfo, DownloadQueue};
use crate::sync_event::ManualResetEvent;

enum ProgressOutcome {
    Cascade(InstallJob),
    Emit(InstallJob),
}

pub struct InstallerCallbacks {
    pub registry: Arc<JobRegistry>,
    pub download_queue: Arc<dyn DownloadQueue>,
    pub install_queue: Sender<i64>,
    pub downloads_changed: Arc<ManualResetEvent>,
    pub event_bus: Arc<dyn EventBus>,
}

impl InstallerCallbacks {
    /// Submits a cancel for every non-terminal part. Non-blocking: it only
    /// calls into the download queue, it does not wait for parts to settle.
    fn cascade_cancel(&self, job: &InstallJob) {
        for part in &job.download_parts {
            if !part.terminal {
                self.download_queue.cancel(part.handle);
            }
        }
    }

    fn push_if_all_parts_terminal(&self, job: &InstallJob) {
        if job.all_parts_terminal() {
            let _ = self.install_queue.send(job.id);
        }
    }

    fn emit_downloading(&self, job: &InstallJob) {
        self.event_bus.emit(InstallEvent::Downloading {
            source: job.source.to_string(),
            id: job.id,
            local_path: job.local_path.to_string_lossy().into_owned(),
            parts: job
                .download_parts
                .iter()
                .map(|p| DownloadPartSnapshot {
                    url: p.url.clone(),
                    local_path: p
                        .download_path
                        .as_ref()
                        .map(|p| p.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    bytes: p.bytes,
                    total_bytes: p.total_bytes,
                })
                .collect(),
            bytes: job.bytes,
            total_bytes: job.total_bytes,
        });
    }
}

impl DownloadCallbacks for InstallerCallbacks {
    fn on_start(&self, part: DownloadPartInfo) {
        let handle = part.handle;
        self.registry.with_job_for_download(handle, |job| {
            job.status = Status::Downloading;
            if let Some(existing) = job.download_parts.iter_mut().find(|p| p.handle == handle) {
                existing.apply(&part);
            }
            if job.scratch_dir.as_deref() == Some(job.local_path.as_path()) {
                if let Some(download_path) = &part.download_path {
                    if let Some(top_level) = download_path
                        .strip_prefix(job.local_path.as_path())
                        .ok()
                        .and_then(|rel| rel.components().next())
                    {
                        job.local_path = job.local_path.join(top_level.as_os_str());
                    }
                }
            }
            if job.total_bytes == 0 {
                job.total_bytes = job.download_parts.iter().map(|p| p.total_bytes).sum();
            }
        });
    }

    fn on_progress(&self, part: DownloadPartInfo) {
        let handle = part.handle;
        let outcome = self.registry.with_job_for_download(handle, |job| {
            if job.cancelled() {
                return ProgressOutcome::Cascade(job.clone());
            }
            if let Some(existing) = job.download_parts.iter_mut().find(|p| p.handle == handle) {
                existing.apply(&part);
            }
            job.bytes = job.download_parts.iter().map(|p| p.bytes).sum();
            ProgressOutcome::Emit(job.clone())
        });
        match outcome {
            Some(ProgressOutcome::Cascade(job)) => self.cascade_cancel(&job),
            Some(ProgressOutcome::Emit(job)) => self.emit_downloading(&job),
            None => {}
        }
    }

    fn on_complete(&self, part: DownloadPartInfo) {
        let handle = part.handle;
        let done = self.registry.with_job_for_download(handle, |job| {
            if let Some(existing) = job.download_parts.iter_mut().find(|p| p.handle == handle) {
                existing.apply(&part);
                existing.terminal = true;
            }
            if !job.downloading() || !job.all_parts_terminal() {
                return None;
            }
            job.status = Status::DownloadsDone;
            Some(job.clone())
        });
        self.registry.unregister_download_part(handle);
        if let Some(job) = done.flatten() {
            self.event_bus.emit(InstallEvent::DownloadsDone {
                source: job.source.to_string(),
                id: job.id,
            });
            let _ = self.install_queue.send(job.id);
        }
        self.downloads_changed.set();
    }

    fn on_error(&self, part: DownloadPartInfo, error: String) {
        let handle = part.handle;
        let job = self.registry.with_job_for_download(handle, |job| {
            if let Some(existing) = job.download_parts.iter_mut().find(|p| p.handle == handle) {
                existing.apply(&part);
                existing.terminal = true;
            }
            if !job.errored() {
                job.set_error("DownloadFailed", error);
            }
            job.clone()
        });
        self.registry.unregister_download_part(handle);
        if let Some(job) = job {
            self.cascade_cancel(&job);
            self.push_if_all_parts_terminal(&job);
        }
        self.downloads_changed.set();
    }

    fn on_cancelled(&self, part: DownloadPartInfo) {
        let handle = part.handle;
        let job = self.registry.with_job_for_download(handle, |job| {
            if let Some(existing) = job.download_parts.iter_mut().find(|p| p.handle == handle) {
                existing.terminal = true;
            }
            if !job.errored() {
                job.status = Status::Cancelled;
            }
            job.clone()
        });
        self.registry.unregister_download_part(handle);
        if let Some(job) = job {
            self.cascade_cancel(&job);
            self.push_if_all_parts_terminal(&job);
        }
        self.downloads_changed.set();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{DownloadPart, InstallJob, JobConfig};
    use crate::ports::{DownloadHandle, DownloadRequest};
    use crate::source::Source;
    use std::path::PathBuf;
    use std::sync::mpsc;

    struct NoopQueue;
    impl DownloadQueue for NoopQueue {
        fn submit(&self, _: DownloadRequest, _: Arc<dyn DownloadCallbacks>) -> DownloadHandle {
            DownloadHandle(0)
        }
        fn cancel(&self, _: DownloadHandle) {}
    }

    fn remote_job(id: i64, scratch: &str, handles: &[u64]) -> InstallJob {
        let mut job = InstallJob::new_remote(
            id,
            Source::Url {
                url: "https://example.com/m.bin".into(),
                access_token: None,
            },
            JobConfig::default(),
            None,
            PathBuf::from(scratch),
        );
        for h in handles {
            job.download_parts.push(DownloadPart::new(&DownloadPartInfo {
                handle: DownloadHandle(*h),
                url: format!("https://example.com/{h}"),
                download_path: None,
                bytes: 0,
                total_bytes: 100,
                content_type: None,
            }));
        }
        job
    }

    fn part_info(handle: u64, bytes: u64, content_type: Option<&str>) -> DownloadPartInfo {
        DownloadPartInfo {
            handle: DownloadHandle(handle),
            url: format!("https://example.com/{handle}"),
            download_path: Some(PathBuf::from(format!("/scratch/{handle}.bin"))),
            bytes,
            total_bytes: 100,
            content_type: content_type.map(str::to_string),
        }
    }

    fn harness() -> (InstallerCallbacks, mpsc::Receiver<i64>, Arc<crate::events::RecordingEventBus>) {
        let registry = Arc::new(JobRegistry::new());
        let (tx, rx) = mpsc::channel();
        let events = Arc::new(crate::events::RecordingEventBus::new());
        let callbacks = InstallerCallbacks {
            registry: Arc::clone(&registry),
            download_queue: Arc::new(NoopQueue),
            install_queue: tx,
            downloads_changed: Arc::new(ManualResetEvent::new()),
            event_bus: Arc::clone(&events) as Arc<dyn EventBus>,
        };
        (callbacks, rx, events)
    }

    /// Inserts `job` and registers every one of its parts in the download
    /// cache, the way `RemoteExpander::expand` does before any download is
    /// submitted - callbacks resolve their owning job through that cache.
    fn insert_job(callbacks: &InstallerCallbacks, job: InstallJob) {
        let id = job.id;
        for part in &job.download_parts {
            callbacks.registry.register_download_part(part.handle, id);
        }
        callbacks.registry.insert(job);
    }

    #[test]
    fn on_complete_emits_downloads_done_once_all_parts_finish() {
        let (callbacks, rx, events) = harness();
        let job = remote_job(1, "/scratch", &[10, 11]);
        insert_job(&callbacks, job);

        callbacks.on_complete(part_info(10, 100, None));
        assert!(rx.try_recv().is_err(), "should not enqueue until every part finishes");
        assert!(events.events().is_empty());

        callbacks.on_complete(part_info(11, 100, None));
        let enqueued = rx.try_recv().unwrap();
        assert_eq!(enqueued, 1);

        let job = callbacks.registry.get(1).unwrap();
        assert!(job.downloads_done());
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, crate::events::InstallEvent::DownloadsDone { id: 1, .. })));
    }

    #[test]
    fn on_complete_records_content_type_for_later_auth_wall_detection() {
        let (callbacks, rx, _events) = harness();
        let job = remote_job(2, "/scratch", &[20]);
        insert_job(&callbacks, job);

        callbacks.on_complete(part_info(20, 5, Some("text/html; charset=utf-8")));
        rx.try_recv().unwrap();

        let job = callbacks.registry.get(2).unwrap();
        assert!(job.downloads_done());
        let part = job.download_parts.first().unwrap();
        assert_eq!(part.content_type.as_deref(), Some("text/html; charset=utf-8"));
    }

    #[test]
    fn on_error_cascades_cancel_to_sibling_parts() {
        let (callbacks, _rx, _events) = harness();
        let job = remote_job(3, "/scratch", &[30, 31]);
        insert_job(&callbacks, job);

        callbacks.on_error(part_info(30, 0, None), "connection reset".to_string());

        let job = callbacks.registry.get(3).unwrap();
        assert!(job.errored());
        let part30 = job.download_parts.iter().find(|p| p.handle == DownloadHandle(30)).unwrap();
        assert!(part30.terminal);
    }

    #[test]
    fn on_progress_cascades_cancel_once_job_is_cancelled() {
        let (callbacks, _rx, _events) = harness();
        let mut job = remote_job(4, "/scratch", &[40, 41]);
        job.status = Status::Cancelled;
        insert_job(&callbacks, job);

        callbacks.on_progress(part_info(40, 10, None));

        let job = callbacks.registry.get(4).unwrap();
        assert!(job.cancelled());
    }

    #[test]
    fn on_progress_emits_a_downloading_event_with_aggregate_bytes() {
        let (callbacks, _rx, events) = harness();
        let job = remote_job(5, "/scratch", &[50, 51]);
        insert_job(&callbacks, job);

        callbacks.on_progress(part_info(50, 40, None));

        let emitted = events.events();
        let downloading = emitted
            .iter()
            .find_map(|e| match e {
                crate::events::InstallEvent::Downloading { bytes, parts, .. } => Some((*bytes, parts.len())),
                _ => None,
            })
            .expect("expected a Downloading event");
        assert_eq!(downloading, (40, 2));
    }
}
