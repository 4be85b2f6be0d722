//! # Declarative
//!
//! Primitives for idempotent, single-pass node convergence.
//!
//! This crate provides the core abstractions for declaring desired state,
//! gating actions on preconditions, and converging a system step by step.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (files, directories, commands)
//! - **GuardedAction**: A command wrapped in an `only_if` / `not_if` guard
//! - **Version gate**: Decides whether an installed version must be upgraded
//! - **apply_step**: Applies one resource, reporting progress; callers stop at the first failure
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     ApplyContext, CommandSpec, GuardedAction, NoProgress, SystemRunner, apply_step,
//! };
//!
//! let runner = SystemRunner;
//! let mut ctx = ApplyContext::new(&runner);
//!
//! let marker = GuardedAction::new("touch marker", CommandSpec::new("touch").arg("/tmp/marker"))
//!     .not_if(|| Ok(std::path::Path::new("/tmp/marker").exists()));
//!
//! let result = apply_step(&marker, &mut ctx, &mut NoProgress)?;
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`CommandRunner`]: Spawns external commands (real or recorded)
//! - [`VersionQuery`]: Probes an installed version
//! - [`ProgressCallback`]: Receives progress updates
//!
//! This keeps every external invocation replaceable by a fake in tests.

pub mod context;
pub mod error;
pub mod executor;
pub mod guard;
pub mod resource;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use context::{
    ApplyContext, CommandRunner, NoProgress, ProgressCallback, SystemRunner, display_command,
};
pub use error::{Error, ErrorCategory, Result};
pub use executor::apply_step;
pub use guard::{CommandSpec, Guard, GuardedAction, Polarity};
pub use resource::Resource;
pub use types::{ApplyResult, CommandOutput, ExecuteSummary, ResourceState};
pub use version::{SENTINEL_VERSION, Version, VersionQuery, needs_action};
