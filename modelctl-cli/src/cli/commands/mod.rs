//! One module per subcommand, mirroring the top-level `CliCommand` variants.

mod cancel;
mod delete;
mod import;
mod list;
mod prune;
mod status;

pub use cancel::run_cancel;
pub use delete::run_delete;
pub use import::run_import;
pub use list::run_list;
pub use prune::run_prune;
pub use status::run_status;
