//! Minimal reference implementations of the installer's external
//! collaborators, so the crate builds into a runnable demonstration end to
//! end without a host application.
//!
//! None of these are meant to be production-grade: the records store keeps
//! everything in memory, the probe sniffs a handful of known extensions, and
//! the download queue shells out to `curl` on a worker thread per job. A real
//! deployment swaps each of these for its own implementation of the trait in
//! [`crate::ports`].

mod credential;
mod download_queue;
mod metadata;
mod probe;
mod records;

pub use credential::{HfFolderCredentialCache, NoCredentialCache};
pub use download_queue::CurlDownloadQueue;
pub use metadata::{HttpTransport, HuggingFaceMetadataFetcher, MetadataTransport};
pub use probe::ExtensionProbe;
pub use records::InMemoryRecordsStore;
