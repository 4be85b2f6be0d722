//! Core types for declarative convergence

use serde::{Deserialize, Serialize};
use std::process::Output;

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    /// Resource exists/is configured
    Present { details: Option<String> },
    /// Resource does not exist/is not configured
    Absent,
    /// Resource exists but differs from desired
    Modified { from: String, to: String },
    /// State cannot be determined
    Unknown,
}

/// Result of applying a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
    /// A command ran to completion
    Executed,
    /// Apply was skipped (guard said no, empty source, dry run)
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Modified | Self::Removed | Self::Executed
        )
    }

    /// Short label for status output
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoChange => "up to date",
            Self::Created => "created",
            Self::Modified => "updated",
            Self::Removed => "removed",
            Self::Executed => "executed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub executed: usize,
    pub skipped: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed + self.executed
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.skipped + self.no_change
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Executed => self.executed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Output from a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
            exit_code: output.status.code(),
        }
    }
}

impl CommandOutput {
    /// Successful output carrying the given stdout
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Vec::new(),
            success: true,
            exit_code: Some(0),
        }
    }

    /// Failed output with the given exit code
    pub fn failed(exit_code: i32) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            success: false,
            exit_code: Some(exit_code),
        }
    }

    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut summary = ExecuteSummary::default();
        summary.add_result(&ApplyResult::Created);
        summary.add_result(&ApplyResult::Executed);
        summary.add_result(&ApplyResult::NoChange);
        summary.add_result(&ApplyResult::Skipped {
            reason: "guard".into(),
        });

        assert_eq!(summary.total_changes(), 2);
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn test_skipped_is_not_a_change() {
        assert!(!ApplyResult::Skipped { reason: "x".into() }.is_change());
        assert!(ApplyResult::Removed.is_change());
    }
}
