//! `modelctl prune` - drop terminal jobs from the in-memory job table.

use anyhow::Result;
use modelctl_core::ModelInstaller;

pub fn run_prune(installer: &ModelInstaller) -> Result<()> {
    installer.prune_jobs();
    println!("pruned terminal jobs");
    Ok(())
}
