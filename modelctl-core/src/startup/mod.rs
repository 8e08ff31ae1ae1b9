//! Startup and maintenance routines: scratch-dir cleanup, orphan scan,
//! and legacy configuration migration, run once from `ModelInstaller::start`.

mod migrate;
mod scan;

pub use migrate::migrate_legacy_yaml;
pub use scan::{register_orphaned_models, remove_dangling_scratch_dirs, scan_for_missing_models};
