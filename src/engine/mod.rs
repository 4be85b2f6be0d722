//! Convergence engine for chefboot
//!
//! The orchestrator walks the fixed bootstrap sequence; `agent_run` builds
//! the final agent invocation and `metadata` decides the EC2 hint.

pub mod agent_run;
pub mod metadata;
pub mod orchestrator;

pub use orchestrator::{ConvergeOptions, ConvergeReport, Orchestrator, derive_node_name};
