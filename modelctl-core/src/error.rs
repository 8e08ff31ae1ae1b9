//! Typed error taxonomy for the install coordinator.
//!
//! Every public operation returns one of these variants rather than an
//! opaque string, so callers can match on error kind the way the service
//! itself decides whether a worker failure is recoverable.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the install coordinator's public API and worker loop.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("unsupported model source: '{0}'")]
    BadSource(String),

    #[error("a model is already installed at {0}")]
    Duplicate(PathBuf),

    #[error("invalid model config: {0}")]
    InvalidModelConfig(String),

    #[error("{0}: no downloadable files found")]
    EmptyRemote(String),

    #[error("attempted migration of unsupported models.yaml v{0}; only v3.0.0 is supported")]
    UnsupportedMigration(String),

    #[error("no job with id {0} known")]
    NotFound(i64),

    #[error("no model with key {0} known")]
    UnknownModel(String),

    #[error("attempt to start the installer service twice")]
    AlreadyStarted,

    #[error("attempt to stop the install service before it was started")]
    NotStarted,

    #[error("timeout exceeded")]
    Timeout,

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InstallError>;
