//! Step execution - applies one resource, reporting progress
//!
//! Callers apply steps in order and stop at the first error. There is no
//! rollback: steps applied before a failure stay applied, and a re-run
//! converges the rest because every resource is idempotent.

use crate::context::{ApplyContext, ProgressCallback};
use crate::error::Result;
use crate::resource::Resource;
use crate::types::ApplyResult;

/// Apply a single resource, reporting progress
pub fn apply_step<P: ProgressCallback>(
    resource: &dyn Resource,
    ctx: &mut ApplyContext,
    progress: &mut P,
) -> Result<ApplyResult> {
    let id = resource.id();
    progress.on_step_start(&id, &resource.description());
    let result = resource.apply(ctx).inspect_err(|e| {
        log::error!("{} ({}) failed: {}", id, resource.resource_type(), e);
    })?;
    log::debug!("{}: {}", id, result.label());
    progress.on_step_complete(&id, &result);
    Ok(result)
}
