//! Core engine for the modelctl model install coordinator.
//!
//! Coordinates installing ML models from local paths, model-hub repos, or
//! bare URLs: resolving the source, expanding remote repos into individual
//! file downloads, tracking job progress, and registering the finished
//! model with a host-supplied records store.

pub mod adapters;
pub mod bridge;
pub mod config;
pub mod error;
pub mod events;
pub mod jobs;
pub mod logging;
pub mod path_ops;
pub mod ports;
pub mod register;
pub mod remote;
pub mod service;
pub mod source;
pub mod startup;
pub mod sync_event;
mod worker;

pub use error::{InstallError, Result};
pub use service::ModelInstaller;
