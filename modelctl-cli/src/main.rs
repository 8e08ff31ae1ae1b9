use std::sync::Arc;

use modelctl_core::adapters::{
    CurlDownloadQueue, ExtensionProbe, HfFolderCredentialCache, HttpTransport, HuggingFaceMetadataFetcher,
    InMemoryRecordsStore,
};
use modelctl_core::config;
use modelctl_core::events::TracingEventBus;
use modelctl_core::logging;
use modelctl_core::service::Collaborators;
use modelctl_core::ModelInstaller;

mod cli;

use crate::cli::CliCommand;

fn main() {
    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    if let Err(err) = run() {
        eprintln!("modelctl error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cfg = config::load_or_init()?;
    tracing::debug!(?cfg, "loaded modelctl config");

    let installer = ModelInstaller::new(
        cfg,
        Collaborators {
            records: Arc::new(InMemoryRecordsStore::new()),
            probe: Arc::new(ExtensionProbe::new()),
            metadata_fetcher: Arc::new(HuggingFaceMetadataFetcher::new(HttpTransport)),
            download_queue: Arc::new(CurlDownloadQueue::new()),
            event_bus: Arc::new(TracingEventBus),
            credential_cache: Arc::new(HfFolderCredentialCache::new()),
        },
    );

    installer.start()?;
    let result = CliCommand::run_from_args(&installer);
    installer.stop()?;
    result
}
