//! Fire-and-forget event notifications emitted on job-state transitions.
//!
//! The event bus is an external collaborator (the host decides where events
//! go - a websocket, a log sink, a metrics counter); this module only defines
//! the payload shapes and the trait the installer calls into.

/// Snapshot of one download part, included in `Downloading` events.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadPartSnapshot {
    pub url: String,
    pub local_path: String,
    pub bytes: u64,
    pub total_bytes: u64,
}

/// One payload per job-state transition. Every variant carries the
/// stringified source and the job id.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallEvent {
    Running {
        source: String,
        id: i64,
    },
    Downloading {
        source: String,
        id: i64,
        local_path: String,
        parts: Vec<DownloadPartSnapshot>,
        bytes: u64,
        total_bytes: u64,
    },
    DownloadsDone {
        source: String,
        id: i64,
    },
    Completed {
        source: String,
        id: i64,
        key: String,
    },
    Error {
        source: String,
        id: i64,
        error_type: String,
        error: String,
    },
    Cancelled {
        source: String,
        id: i64,
    },
}

/// Emits install events to whatever sink the host has wired up.
pub trait EventBus: Send + Sync {
    fn emit(&self, event: InstallEvent);
}

/// An event bus that logs every event via `tracing` and otherwise drops it.
/// Suitable as the default when the host has nothing richer to offer.
#[derive(Debug, Default)]
pub struct TracingEventBus;

impl EventBus for TracingEventBus {
    fn emit(&self, event: InstallEvent) {
        match event {
            InstallEvent::Running { source, id } => {
                tracing::info!(job = id, %source, "model install started");
            }
            InstallEvent::Downloading {
                source,
                id,
                bytes,
                total_bytes,
                ..
            } => {
                tracing::debug!(job = id, %source, bytes, total_bytes, "model install downloading");
            }
            InstallEvent::DownloadsDone { source, id } => {
                tracing::info!(job = id, %source, "model download complete");
            }
            InstallEvent::Completed { source, id, key } => {
                tracing::info!(job = id, %source, %key, "model install complete");
            }
            InstallEvent::Error {
                source,
                id,
                error_type,
                error,
            } => {
                tracing::error!(job = id, %source, %error_type, %error, "model install error");
            }
            InstallEvent::Cancelled { source, id } => {
                tracing::info!(job = id, %source, "model install canceled");
            }
        }
    }
}

/// Event bus that records every event in order, for test assertions.
#[derive(Debug, Default)]
pub struct RecordingEventBus {
    events: std::sync::Mutex<Vec<InstallEvent>>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InstallEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventBus for RecordingEventBus {
    fn emit(&self, event: InstallEvent) {
        self.events.lock().unwrap().push(event);
    }
}
