//! The `InstallJob` state machine.

use std::path::PathBuf;

use serde_json::Value;

use crate::ports::{DownloadHandle, DownloadPartInfo, ModelConfigRecord};
use crate::source::Source;

/// Where an `InstallJob` sits in its lifecycle. Transitions follow the DAG
/// `Waiting -> {Downloading -> DownloadsDone}? -> Running -> Completed`, with
/// `Cancelled`/`Error` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Waiting,
    Downloading,
    DownloadsDone,
    Running,
    Completed,
    Error,
    Cancelled,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Error | Status::Cancelled)
    }
}

/// State for one remote download belonging to a job.
#[derive(Debug, Clone)]
pub struct DownloadPart {
    pub handle: DownloadHandle,
    pub url: String,
    pub download_path: Option<PathBuf>,
    pub bytes: u64,
    pub total_bytes: u64,
    pub content_type: Option<String>,
    pub terminal: bool,
}

impl DownloadPart {
    pub fn new(info: &DownloadPartInfo) -> Self {
        Self {
            handle: info.handle,
            url: info.url.clone(),
            download_path: info.download_path.clone(),
            bytes: info.bytes,
            total_bytes: info.total_bytes,
            content_type: info.content_type.clone(),
            terminal: false,
        }
    }

    pub fn apply(&mut self, info: &DownloadPartInfo) {
        self.download_path = info.download_path.clone();
        self.bytes = info.bytes;
        self.total_bytes = info.total_bytes;
        self.content_type = info.content_type.clone();
    }
}

/// User-supplied overrides, modeled as known fields plus an open extension
/// bag (design note 4: "options record with known fields plus general
/// purpose extension mapping").
#[derive(Debug, Clone, Default)]
pub struct JobConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    pub config_path: Option<String>,
    pub source: Option<String>,
    pub source_type: Option<crate::ports::SourceType>,
    pub source_api_response: Option<Value>,
    pub extra: std::collections::HashMap<String, Value>,
}

/// One logical install request, tracked from submission through completion.
#[derive(Debug, Clone)]
pub struct InstallJob {
    pub id: i64,
    pub source: Source,
    pub config_in: JobConfig,
    pub config_out: Option<ModelConfigRecord>,
    pub source_metadata: Option<Value>,
    pub local_path: PathBuf,
    pub scratch_dir: Option<PathBuf>,
    pub inplace: bool,
    pub download_parts: Vec<DownloadPart>,
    pub bytes: u64,
    pub total_bytes: u64,
    pub status: Status,
    pub error: Option<String>,
    pub error_type: Option<String>,
}

impl InstallJob {
    pub fn new_local(id: i64, source: Source, config_in: JobConfig, local_path: PathBuf, inplace: bool) -> Self {
        Self {
            id,
            source,
            config_in,
            config_out: None,
            source_metadata: None,
            local_path,
            scratch_dir: None,
            inplace,
            download_parts: Vec::new(),
            bytes: 0,
            total_bytes: 0,
            status: Status::Waiting,
            error: None,
            error_type: None,
        }
    }

    pub fn new_remote(
        id: i64,
        source: Source,
        config_in: JobConfig,
        source_metadata: Option<Value>,
        scratch_dir: PathBuf,
    ) -> Self {
        Self {
            id,
            source,
            config_in,
            config_out: None,
            source_metadata,
            local_path: scratch_dir.clone(),
            scratch_dir: Some(scratch_dir),
            inplace: false,
            download_parts: Vec::new(),
            bytes: 0,
            total_bytes: 0,
            status: Status::Waiting,
            error: None,
            error_type: None,
        }
    }

    pub fn in_terminal_state(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn cancelled(&self) -> bool {
        self.status == Status::Cancelled
    }

    pub fn errored(&self) -> bool {
        self.status == Status::Error
    }

    pub fn complete(&self) -> bool {
        self.status == Status::Completed
    }

    pub fn downloading(&self) -> bool {
        self.status == Status::Downloading
    }

    pub fn downloads_done(&self) -> bool {
        self.status == Status::DownloadsDone
    }

    pub fn waiting(&self) -> bool {
        self.status == Status::Waiting
    }

    pub fn all_parts_terminal(&self) -> bool {
        self.download_parts.iter().all(|p| p.terminal)
    }

    pub fn set_error(&mut self, error_type: &str, message: impl Into<String>) {
        self.status = Status::Error;
        self.error_type = Some(error_type.to_string());
        self.error = Some(message.into());
    }
}
