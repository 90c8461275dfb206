//! Profile an external command as a single call-site
//!
//! The command is one activation keyed `<program>:main`. At line
//! granularity the window is sliced at a fixed interval while the child
//! runs, since an opaque process has no statement boundaries to report.

use crate::backend::EnergyBackend;
use crate::results::ProfileResults;
use crate::tracer::{CallSite, EnergyTracer};
use anyhow::{Context, Result};
use std::process::{Command, ExitStatus};
use std::thread;
use std::time::Duration;

/// Slice length for line-level profiling of a child process
pub const SLICE_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub struct RunOutcome {
    pub status: ExitStatus,
    pub results: ProfileResults,
}

/// Run `command` (program followed by its arguments) under `tracer`
///
/// # Errors
/// Fails if `command` is empty or the program cannot be launched. The
/// tracer is drained either way.
pub fn run_command<B: EnergyBackend>(
    mut tracer: EnergyTracer<B>,
    command: &[String],
) -> Result<RunOutcome> {
    let (program, args) = command.split_first().context("No command given")?;
    let site = CallSite::new(program.as_str(), "main");

    tracing::info!("Profiling {} with {} backend", program, tracer.backend().name());
    let status = tracer.measure(&site, |t| wait_for(t, program, args));
    let results = tracer.finish();

    Ok(RunOutcome {
        status: status?,
        results,
    })
}

fn wait_for<B: EnergyBackend>(
    tracer: &mut EnergyTracer<B>,
    program: &str,
    args: &[String],
) -> Result<ExitStatus> {
    let mut child = Command::new(program)
        .args(args)
        .spawn()
        .with_context(|| format!("Failed to launch {}", program))?;

    if !tracer.line_level() {
        return child
            .wait()
            .with_context(|| format!("Failed to wait for {}", program));
    }

    loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| format!("Failed to poll {}", program))?
        {
            return Ok(status);
        }
        thread::sleep(SLICE_INTERVAL);
        tracer.line();
    }
}
