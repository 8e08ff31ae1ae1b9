//! `modelctl import <source>` - submit a new install job.

use std::time::Duration;

use anyhow::Result;
use modelctl_core::ModelInstaller;

pub fn run_import(
    installer: &ModelInstaller,
    source: &str,
    token: Option<String>,
    inplace: bool,
    wait: bool,
    timeout: Option<Duration>,
) -> Result<()> {
    let job = installer.heuristic_import(source, None, token, inplace)?;
    println!("started job {} for {}", job.id, source);

    if wait {
        let finished = installer.wait_for_job(job.id, timeout)?;
        println!("job {} finished: {:?}", finished.id, finished.status);
        if let Some(error) = &finished.error {
            println!("error: {error}");
        }
    }
    Ok(())
}
