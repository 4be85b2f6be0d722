//! Resource trait for declarative state management
//!
//! A Resource represents something that can be in a certain state,
//! and can be changed to reach a desired state.

use crate::context::ApplyContext;
use crate::error::Result;
use crate::types::{ApplyResult, ResourceState};
use std::fmt;

/// Core trait for declarative resources
///
/// Every convergence step that touches the system implements this trait,
/// which provides:
/// - Identity (id, description, type)
/// - State detection (current vs desired)
/// - State convergence (apply)
///
/// `apply` must be re-entrant: running it against an already converged
/// system returns [`ApplyResult::NoChange`] or [`ApplyResult::Skipped`].
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
///
/// #[derive(Debug)]
/// struct Marker { path: String }
///
/// impl Resource for Marker {
///     fn id(&self) -> String { self.path.clone() }
///     fn description(&self) -> String { format!("Ensure marker {}", self.path) }
///     fn resource_type(&self) -> &'static str { "marker" }
///
///     fn current_state(&self) -> declarative::Result<ResourceState> {
///         if std::path::Path::new(&self.path).exists() {
///             Ok(ResourceState::Present { details: None })
///         } else {
///             Ok(ResourceState::Absent)
///         }
///     }
///
///     fn desired_state(&self) -> ResourceState {
///         ResourceState::Present { details: None }
///     }
///
///     fn apply(&self, ctx: &mut ApplyContext) -> declarative::Result<ApplyResult> {
///         if !self.needs_apply()? {
///             return Ok(ApplyResult::NoChange);
///         }
///         if ctx.dry_run {
///             return Ok(ApplyResult::Skipped { reason: "dry run".into() });
///         }
///         std::fs::write(&self.path, b"")
///             .map_err(|e| declarative::Error::io(&self.path, e))?;
///         Ok(ApplyResult::Created)
///     }
/// }
/// ```
pub trait Resource: fmt::Debug {
    /// Unique identifier for this resource
    ///
    /// Examples:
    /// - "/etc/stack_release" for a managed file
    /// - "install chef client" for a guarded action
    fn id(&self) -> String;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Resource type category
    ///
    /// Used for grouping and status output. Examples:
    /// - "file", "directory"
    /// - "execute"
    fn resource_type(&self) -> &'static str;

    /// Detect the current state of this resource
    ///
    /// Must be read-only.
    fn current_state(&self) -> Result<ResourceState>;

    /// Get the desired state for this resource
    fn desired_state(&self) -> ResourceState;

    /// Check if the resource needs changes to reach desired state
    ///
    /// Default implementation compares current and desired states.
    fn needs_apply(&self) -> Result<bool> {
        let current = self.current_state()?;
        let desired = self.desired_state();
        Ok(current != desired)
    }

    /// Apply changes to reach the desired state
    ///
    /// This method should:
    /// 1. Check if already in desired state (return NoChange)
    /// 2. Respect ctx.dry_run (return Skipped if true)
    /// 3. Make the necessary changes
    /// 4. Return the appropriate ApplyResult
    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult>;
}
