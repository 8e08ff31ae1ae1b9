//! The job table: every piece of shared state guarded by one coarse mutex,
//! plus the operations exposed to callers.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{InstallError, Result};
use crate::ports::DownloadHandle;
use crate::source::Source;

use super::types::InstallJob;

#[derive(Default)]
struct Inner {
    jobs: HashMap<i64, InstallJob>,
    /// Maps an active download part back to the job that owns it
    /// (design note: "two separate maps keyed by id/url rather than
    /// back-pointers", to avoid an ownership cycle with `InstallJob`).
    download_cache: HashMap<DownloadHandle, i64>,
    next_job_id: i64,
    running: bool,
}

/// The installer's in-memory job table. Every method takes the lock for the
/// duration of the call; none perform I/O while holding it.
#[derive(Default)]
pub struct JobRegistry {
    inner: Mutex<Inner>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_job_id;
        inner.next_job_id += 1;
        id
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().running
    }

    pub fn set_running(&self, running: bool) {
        self.inner.lock().unwrap().running = running;
    }

    pub fn insert(&self, job: InstallJob) {
        self.inner.lock().unwrap().jobs.insert(job.id, job);
    }

    /// Finds a non-terminal job whose source matches `source`, for the
    /// duplicate-suppression check (invariant 5).
    pub fn find_active_by_source(&self, source: &Source) -> Option<InstallJob> {
        let inner = self.inner.lock().unwrap();
        inner
            .jobs
            .values()
            .find(|j| !j.in_terminal_state() && &j.source == source)
            .cloned()
    }

    pub fn get(&self, id: i64) -> Result<InstallJob> {
        let inner = self.inner.lock().unwrap();
        inner.jobs.get(&id).cloned().ok_or(InstallError::NotFound(id))
    }

    pub fn list(&self) -> Vec<InstallJob> {
        let inner = self.inner.lock().unwrap();
        let mut jobs: Vec<_> = inner.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }

    pub fn list_by_source(&self, source: &Source) -> Vec<InstallJob> {
        let inner = self.inner.lock().unwrap();
        let mut jobs: Vec<_> = inner
            .jobs
            .values()
            .filter(|j| &j.source == source)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }

    /// Drops every job whose status is terminal.
    pub fn prune(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.jobs.retain(|_, job| !job.in_terminal_state());
    }

    pub fn register_download_part(&self, handle: DownloadHandle, job_id: i64) {
        self.inner.lock().unwrap().download_cache.insert(handle, job_id);
    }

    pub fn unregister_download_part(&self, handle: DownloadHandle) {
        self.inner.lock().unwrap().download_cache.remove(&handle);
    }

    pub fn download_cache_len(&self) -> usize {
        self.inner.lock().unwrap().download_cache.len()
    }

    pub fn job_for_download(&self, handle: DownloadHandle) -> Option<i64> {
        self.inner.lock().unwrap().download_cache.get(&handle).copied()
    }

    /// Runs `f` against the job's current state under the lock, replacing it
    /// with whatever `f` returns. Every mutation of a job funnels through
    /// here so no caller can forget to take the lock.
    pub fn with_job<T>(&self, id: i64, f: impl FnOnce(&mut InstallJob) -> T) -> Result<T> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner.jobs.get_mut(&id).ok_or(InstallError::NotFound(id))?;
        Ok(f(job))
    }

    /// Same as [`Self::with_job`] but looked up by the download handle that
    /// triggered the callback.
    pub fn with_job_for_download<T>(
        &self,
        handle: DownloadHandle,
        f: impl FnOnce(&mut InstallJob) -> T,
    ) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        let id = *inner.download_cache.get(&handle)?;
        let job = inner.jobs.get_mut(&id)?;
        Some(f(job))
    }

    pub fn all_non_terminal_ids(&self) -> Vec<i64> {
        let inner = self.inner.lock().unwrap();
        inner
            .jobs
            .values()
            .filter(|j| !j.in_terminal_state())
            .map(|j| j.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::JobConfig;
    use std::path::PathBuf;

    fn local_job(id: i64, path: &str) -> InstallJob {
        InstallJob::new_local(
            id,
            Source::Local {
                path: PathBuf::from(path),
                inplace: true,
            },
            JobConfig::default(),
            PathBuf::from(path),
            true,
        )
    }

    #[test]
    fn next_id_increments_monotonically() {
        let registry = JobRegistry::new();
        assert_eq!(registry.next_id(), 0);
        assert_eq!(registry.next_id(), 1);
        assert_eq!(registry.next_id(), 2);
    }

    #[test]
    fn find_active_by_source_ignores_terminal_jobs() {
        let registry = JobRegistry::new();
        let mut job = local_job(0, "/a");
        job.status = super::super::types::Status::Completed;
        let source = job.source.clone();
        registry.insert(job);

        assert!(registry.find_active_by_source(&source).is_none());
    }

    #[test]
    fn find_active_by_source_matches_non_terminal_jobs() {
        let registry = JobRegistry::new();
        let job = local_job(0, "/a");
        let source = job.source.clone();
        registry.insert(job);

        let found = registry.find_active_by_source(&source).unwrap();
        assert_eq!(found.id, 0);
    }

    #[test]
    fn get_missing_job_is_not_found() {
        let registry = JobRegistry::new();
        let err = registry.get(42).unwrap_err();
        assert!(matches!(err, InstallError::NotFound(42)));
    }

    #[test]
    fn prune_drops_only_terminal_jobs() {
        let registry = JobRegistry::new();
        let mut done = local_job(0, "/a");
        done.status = super::super::types::Status::Completed;
        registry.insert(done);
        registry.insert(local_job(1, "/b"));

        registry.prune();

        assert!(registry.get(0).is_err());
        assert!(registry.get(1).is_ok());
    }

    #[test]
    fn download_cache_roundtrip() {
        let registry = JobRegistry::new();
        let handle = DownloadHandle(7);
        registry.register_download_part(handle, 3);
        assert_eq!(registry.job_for_download(handle), Some(3));
        assert_eq!(registry.download_cache_len(), 1);
        registry.unregister_download_part(handle);
        assert_eq!(registry.job_for_download(handle), None);
    }
}
