//! `modelctl status <id>` - show one job's status.

use anyhow::Result;
use modelctl_core::ModelInstaller;

pub fn run_status(installer: &ModelInstaller, id: i64) -> Result<()> {
    let job = installer.get_job_by_id(id)?;
    println!("id: {}", job.id);
    println!("source: {}", job.source);
    println!("status: {:?}", job.status);
    println!("bytes: {}/{}", job.bytes, job.total_bytes);
    if !job.download_parts.is_empty() {
        println!("parts:");
        for part in &job.download_parts {
            println!(
                "  {} {}/{} terminal={} {}",
                part.handle.0, part.bytes, part.total_bytes, part.terminal, part.url
            );
        }
    }
    if let Some(error) = &job.error {
        println!("error ({}): {error}", job.error_type.as_deref().unwrap_or("unknown"));
    }
    Ok(())
}
