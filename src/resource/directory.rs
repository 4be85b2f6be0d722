//! Managed directory resource

use declarative::{ApplyContext, ApplyResult, Error, Resource, ResourceState, Result};
use std::fs;
use std::path::PathBuf;

/// A directory created recursively if missing
#[derive(Debug, Clone)]
pub struct ManagedDirectory {
    pub path: PathBuf,
}

impl ManagedDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Resource for ManagedDirectory {
    fn id(&self) -> String {
        self.path.display().to_string()
    }

    fn description(&self) -> String {
        format!("Create directory {}", self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "directory"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.path.is_dir() {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if !self.needs_apply()? {
            return Ok(ApplyResult::NoChange);
        }
        if ctx.dry_run {
            log::info!("Would create directory {}", self.path.display());
            return Ok(ApplyResult::Skipped {
                reason: "dry run".into(),
            });
        }

        fs::create_dir_all(&self.path).map_err(|e| Error::io(&self.path, e))?;
        log::info!("Created directory {}", self.path.display());
        Ok(ApplyResult::Created)
    }
}
