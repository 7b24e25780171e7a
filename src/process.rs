//! External command execution with captured output and an optional hard timeout.
//!
//! Every subprocess the pipeline launches (model tool, build tool, test
//! binary) goes through here. Commands run one at a time; the caller awaits
//! each before starting the next.

use anyhow::{Context, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::types::CommandOutcome;

/// Exit code reported when the timeout fires (matches coreutils `timeout`).
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Build a command from a program-plus-arguments vector.
pub fn command_from(argv: &[String]) -> Result<Command> {
    let (program, args) = argv.split_first().context("empty command")?;
    let mut cmd = Command::new(program);
    cmd.args(args);
    Ok(cmd)
}

/// Run a command to completion, capturing stdout and stderr.
///
/// - `timeout`: hard wall-clock limit; `None` waits indefinitely
///
/// When the limit is hit the child is killed and the outcome carries
/// `timed_out = true` with exit code 124. Spawn failures are returned as
/// errors so callers can tell "could not run" apart from "ran and failed".
pub async fn run_with_timeout(mut cmd: Command, timeout: Option<Duration>) -> Result<CommandOutcome> {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let child = cmd.spawn()?;
    let wait = child.wait_with_output();

    let output = match timeout {
        Some(limit) => match tokio::time::timeout(limit, wait).await {
            Ok(res) => res?,
            Err(_) => {
                // Dropping the wait future drops the child, which kills it.
                tracing::warn!("Command timed out after {}s", limit.as_secs());
                return Ok(CommandOutcome {
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    exit_code: TIMEOUT_EXIT_CODE,
                    timed_out: true,
                });
            }
        },
        None => wait.await?,
    };

    Ok(CommandOutcome {
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.status.code().unwrap_or(-1),
        timed_out: false,
    })
}
