//! `modelctl delete <key>` - unregister a model, optionally forcing file deletion.

use anyhow::Result;
use modelctl_core::ModelInstaller;

pub fn run_delete(installer: &ModelInstaller, key: &str, force: bool) -> Result<()> {
    if force {
        installer.unconditionally_delete(key)?;
    } else {
        installer.delete(key)?;
    }
    println!("deleted {key}");
    Ok(())
}
