//! Precondition-gated actions
//!
//! A [`GuardedAction`] pairs a command with an `only_if` / `not_if` guard.
//! The guard runs exactly once, immediately before the command would run.
//! A guard that fails to evaluate is an error, never a silent skip.

use crate::context::{ApplyContext, CommandRunner, display_command};
use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::types::{ApplyResult, ResourceState};
use std::fmt;
use std::time::Duration;

/// A zero-argument precondition that may perform I/O
pub type Guard<'a> = Box<dyn Fn() -> Result<bool> + 'a>;

/// Work that runs after the guard passes but before the command
pub type PrepareHook<'a> = Box<dyn Fn(&ApplyContext<'_>) -> Result<()> + 'a>;

/// Post-condition checked after the command exits successfully
pub type PostCheck<'a> = Box<dyn Fn(&dyn CommandRunner) -> Result<bool> + 'a>;

/// How a guard's boolean is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Run the command only if the guard returns true
    OnlyIf,
    /// Run the command only if the guard returns false
    NotIf,
}

impl Polarity {
    fn proceeds(self, value: bool) -> bool {
        match self {
            Self::OnlyIf => value,
            Self::NotIf => !value,
        }
    }

    fn skip_reason(self) -> &'static str {
        match self {
            Self::OnlyIf => "only_if guard returned false",
            Self::NotIf => "not_if guard returned true",
        }
    }
}

/// An executable invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn arg_refs(&self) -> Vec<&str> {
        self.args.iter().map(String::as_str).collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", display_command(&self.program, &self.arg_refs()))
    }
}

/// A command wrapped with an optional guard, prepare hook, timeout and post-check
pub struct GuardedAction<'a> {
    name: String,
    command: CommandSpec,
    guard: Option<(Guard<'a>, Polarity)>,
    prepare: Option<PrepareHook<'a>>,
    post_check: Option<PostCheck<'a>>,
    timeout: Option<Duration>,
}

impl<'a> GuardedAction<'a> {
    /// An unguarded action
    pub fn new(name: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            name: name.into(),
            command,
            guard: None,
            prepare: None,
            post_check: None,
            timeout: None,
        }
    }

    /// Run only if `guard` returns true
    pub fn only_if(mut self, guard: impl Fn() -> Result<bool> + 'a) -> Self {
        self.guard = Some((Box::new(guard), Polarity::OnlyIf));
        self
    }

    /// Run only if `guard` returns false
    pub fn not_if(mut self, guard: impl Fn() -> Result<bool> + 'a) -> Self {
        self.guard = Some((Box::new(guard), Polarity::NotIf));
        self
    }

    /// Work to do after the guard passes, before the command runs
    pub fn prepare(mut self, hook: impl Fn(&ApplyContext<'_>) -> Result<()> + 'a) -> Self {
        self.prepare = Some(Box::new(hook));
        self
    }

    /// Require `check` to hold after a successful exit
    pub fn verify(mut self, check: impl Fn(&dyn CommandRunner) -> Result<bool> + 'a) -> Self {
        self.post_check = Some(Box::new(check));
        self
    }

    /// Bound the command's runtime
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Evaluate the guard (once) and run the command if it says proceed
    pub fn execute(&self, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
        if let Some((guard, polarity)) = &self.guard {
            let value = guard().map_err(|source| Error::Guard {
                action: self.name.clone(),
                source: Box::new(source),
            })?;
            if !polarity.proceeds(value) {
                log::info!("Skipping `{}`: {}", self.name, polarity.skip_reason());
                return Ok(ApplyResult::Skipped {
                    reason: polarity.skip_reason().to_string(),
                });
            }
        }

        if ctx.dry_run {
            log::info!("Would run `{}` ({})", self.name, self.command);
            return Ok(ApplyResult::Skipped {
                reason: "dry run".to_string(),
            });
        }

        if let Some(prepare) = &self.prepare {
            prepare(ctx)?;
        }

        log::info!("Running `{}`: {}", self.name, self.command);
        let args = self.command.arg_refs();
        let output = match self.timeout {
            Some(timeout) => ctx
                .runner
                .run_bounded(&self.command.program, &args, timeout)?,
            None => ctx.runner.run(&self.command.program, &args)?,
        };

        if !output.success {
            let stderr = output.stderr_str();
            if !stderr.trim().is_empty() {
                log::error!("{}", stderr.trim());
            }
            return Err(Error::ActionExecution {
                command: self.command.to_string(),
                exit_code: output.exit_code,
            });
        }

        if let Some(check) = &self.post_check
            && !check(ctx.runner)?
        {
            return Err(Error::InstallVerification {
                subject: self.name.clone(),
                message: format!("`{}` exited successfully but the post-check failed", self.command),
            });
        }

        Ok(ApplyResult::Executed)
    }
}

impl fmt::Debug for GuardedAction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedAction")
            .field("name", &self.name)
            .field("command", &self.command)
            .field("polarity", &self.guard.as_ref().map(|(_, p)| *p))
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Resource for GuardedAction<'_> {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!("Execute {}", self.command)
    }

    fn resource_type(&self) -> &'static str {
        "execute"
    }

    // The guard is only evaluated at apply time, immediately before the command
    fn current_state(&self) -> Result<ResourceState> {
        Ok(ResourceState::Unknown)
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(self.command.to_string()),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        self.execute(ctx)
    }
}
