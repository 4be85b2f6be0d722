//! CA certificate package sanity check
//!
//! Bundlers have a habit of deleting `*.pem` files. If any file owned by the
//! `ca-certificates` package is missing, the package is reinstalled.

use declarative::{
    ApplyContext, ApplyResult, CommandRunner, Error, Resource, ResourceState, Result,
    display_command,
};
use std::path::PathBuf;

use crate::paths::Layout;

const PACKAGE: &str = "ca-certificates";

#[derive(Debug, Clone)]
pub struct CaBundleCheck {
    layout: Layout,
}

impl CaBundleCheck {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Package-owned paths that are missing on disk
    pub fn missing_files(&self, runner: &dyn CommandRunner) -> Result<Vec<PathBuf>> {
        let listing = runner.run_capture("rpm", &["-ql", PACKAGE])?;
        Ok(listing
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('/'))
            .map(|line| self.layout.path(line))
            .filter(|path| !path.exists())
            .collect())
    }
}

impl Resource for CaBundleCheck {
    fn id(&self) -> String {
        format!("check {}", PACKAGE)
    }

    fn description(&self) -> String {
        format!("Verify files of the {} package", PACKAGE)
    }

    fn resource_type(&self) -> &'static str {
        "package_check"
    }

    // Needs the runner; evaluated in apply
    fn current_state(&self) -> Result<ResourceState> {
        Ok(ResourceState::Unknown)
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let missing = self.missing_files(ctx.runner)?;
        if missing.is_empty() {
            return Ok(ApplyResult::NoChange);
        }

        let listed: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
        log::info!("Found missing files: {}", listed.join(", "));

        let args = ["reinstall", "-y", PACKAGE];
        if ctx.dry_run {
            log::info!("Would run {}", display_command("yum", &args));
            return Ok(ApplyResult::Skipped {
                reason: "dry run".into(),
            });
        }

        log::info!("Reinstalling {}...", PACKAGE);
        let output = ctx.runner.run("yum", &args)?;
        if !output.success {
            let stderr = output.stderr_str();
            if !stderr.trim().is_empty() {
                log::error!("{}", stderr.trim());
            }
            return Err(Error::ActionExecution {
                command: display_command("yum", &args),
                exit_code: output.exit_code,
            });
        }
        Ok(ApplyResult::Executed)
    }
}
