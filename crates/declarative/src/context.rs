//! Apply context and provider traits
//!
//! These traits allow the declarative crate to be used without
//! depending on how commands are actually spawned, so resources can be
//! exercised against a recording fake in tests.

use crate::error::{Error, Result};
use crate::types::{ApplyResult, CommandOutput};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval while waiting on a bounded child process
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Render a program and its arguments as a single command line
pub fn display_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Executes external commands on behalf of resources
///
/// Every call blocks until the process finishes. Only [`run_bounded`]
/// places an upper limit on how long that can take.
///
/// [`run_bounded`]: CommandRunner::run_bounded
pub trait CommandRunner {
    /// Run a command to completion, capturing its output
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run a command with inherited stdio, killing it and everything it
    /// spawned if it outlives `timeout`
    fn run_bounded(&self, program: &str, args: &[&str], timeout: Duration)
    -> Result<CommandOutput>;

    /// Run a command and capture stdout, treating a non-zero exit as a query failure
    fn run_capture(&self, program: &str, args: &[&str]) -> Result<String> {
        let output = self.run(program, args)?;
        if !output.success {
            let stderr = output.stderr_str();
            let message = match stderr.trim() {
                "" => format!(
                    "exited with code {}",
                    output
                        .exit_code
                        .map_or_else(|| "none".to_string(), |c| c.to_string())
                ),
                stderr => stderr.to_string(),
            };
            return Err(Error::query(display_command(program, args), message));
        }
        Ok(output.stdout_str())
    }
}

/// Runner backed by `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        log::debug!("Running: {}", display_command(program, args));
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| Error::Spawn {
                command: display_command(program, args),
                source,
            })?;
        Ok(output.into())
    }

    fn run_bounded(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let command = display_command(program, args);
        log::debug!("Running (timeout {}s): {}", timeout.as_secs(), command);

        // Own process group, so wrappers such as strace take their tracees with them
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|source| Error::Spawn {
                command: command.clone(),
                source,
            })?;

        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    return Ok(CommandOutput {
                        stdout: Vec::new(),
                        stderr: Vec::new(),
                        success: status.success(),
                        exit_code: status.code(),
                    });
                }
                Ok(None) => {
                    if start.elapsed() >= timeout {
                        kill_process_group(&mut child);
                        log::warn!("Killed `{}` after {}s", command, timeout.as_secs());
                        return Err(Error::Timeout { command, timeout });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(source) => {
                    kill_process_group(&mut child);
                    return Err(Error::Spawn { command, source });
                }
            }
        }
    }
}

/// SIGKILL the child's whole process group, then reap the child
fn kill_process_group(child: &mut Child) {
    match libc::pid_t::try_from(child.id()) {
        Ok(pgid) => {
            // SAFETY: kill(2) takes no pointers; the child leads group `pgid`
            // and has not been reaped yet, so the id cannot have been reused.
            if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
                log::debug!(
                    "killpg({}) failed: {}",
                    pgid,
                    std::io::Error::last_os_error()
                );
                let _ = child.kill();
            }
        }
        Err(_) => {
            let _ = child.kill();
        }
    }
    // Reap after kill so no zombie is left behind
    let _ = child.wait();
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called when starting to apply a single step
    fn on_step_start(&mut self, id: &str, description: &str);

    /// Called when a step completes successfully
    fn on_step_complete(&mut self, id: &str, result: &ApplyResult);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_step_start(&mut self, _id: &str, _description: &str) {}
    fn on_step_complete(&mut self, _id: &str, _result: &ApplyResult) {}
}

/// Context passed to resource apply operations
pub struct ApplyContext<'a> {
    /// Whether this is a dry run (no actual changes)
    pub dry_run: bool,
    /// Whether to output verbose information
    pub verbose: bool,
    /// Command runner used for every external invocation
    pub runner: &'a dyn CommandRunner,
}

impl<'a> ApplyContext<'a> {
    /// Create a new apply context
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            dry_run: false,
            verbose: false,
            runner,
        }
    }

    /// Set dry-run mode
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set verbose mode
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
