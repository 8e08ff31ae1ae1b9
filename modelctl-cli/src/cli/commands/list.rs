//! `modelctl list` - show every tracked install job.

use anyhow::Result;
use modelctl_core::ModelInstaller;

pub fn run_list(installer: &ModelInstaller) -> Result<()> {
    let jobs = installer.list_jobs();
    if jobs.is_empty() {
        println!("no jobs tracked.");
        return Ok(());
    }
    println!("{:<6} {:<14} {:<10} {}", "ID", "STATUS", "BYTES", "SOURCE");
    for job in jobs {
        println!(
            "{:<6} {:<14} {:<10} {}",
            job.id,
            format!("{:?}", job.status).to_lowercase(),
            job.bytes,
            job.source
        );
    }
    Ok(())
}
