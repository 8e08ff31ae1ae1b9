//! `modelctl cancel <id>` - cancel a job in flight.

use anyhow::Result;
use modelctl_core::ModelInstaller;

pub fn run_cancel(installer: &ModelInstaller, id: i64) -> Result<()> {
    let job = installer.get_job_by_id(id)?;
    installer.cancel_job(&job);
    println!("cancelled job {id}");
    Ok(())
}
