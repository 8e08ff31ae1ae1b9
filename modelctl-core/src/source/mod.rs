//! Source-string parsing: turns what a caller types into a typed `Source`.

mod parse;
mod types;
mod variant;

pub use parse::parse_source;
pub use types::Source;
pub use variant::RepoVariant;

use std::path::Path;

use crate::config::InstallerConfig;
use crate::error::Result;

/// Convenience wrapper over [`parse_source`] that reads token config from an
/// [`InstallerConfig`] and checks the real filesystem. Named after the
/// original `heuristic_import` entry point this logic is modeled on.
pub fn heuristic_import(
    source: &str,
    access_token: Option<String>,
    inplace: bool,
    config: &InstallerConfig,
) -> Result<Source> {
    parse_source(source, access_token, inplace, &config.remote_api_tokens, |p: &Path| {
        p.exists()
    })
}
