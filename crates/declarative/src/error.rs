//! Error types for convergence operations.
//!
//! Errors are categorized so callers can tell a failed precondition query
//! apart from a command that ran and failed, and so the top-level runner can
//! print a useful hint for the step that aborted the run.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for convergence operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of convergence errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A read-only query (version probe, package manifest) failed.
    Query,
    /// Input data could not be interpreted.
    Format,
    /// A command ran and reported failure.
    Execution,
    /// A bounded command ran out of time.
    Timeout,
    /// Filesystem error.
    Io,
    /// Network transfer failed.
    Network,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Query => "Precondition query failed",
            Self::Format => "Malformed input",
            Self::Execution => "Command failed",
            Self::Timeout => "Command timed out",
            Self::Io => "Filesystem error",
            Self::Network => "Download failed",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Query => "Check that the queried tool is installed and on PATH",
            Self::Format => "Check the attribute values supplied for this node",
            Self::Execution => "Inspect the command output above, then re-run to converge",
            Self::Timeout => "Raise chef.client.run_timeout or investigate the hung run",
            Self::Io => "Check directory permissions and available disk space",
            Self::Network => "Check connectivity and the pinned CA bundle, then re-run",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while converging a node.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A query subprocess could not be run or its output could not be parsed.
    #[error("query `{query}` failed: {message}")]
    QueryFailure {
        /// The query that was attempted.
        query: String,
        /// What went wrong.
        message: String,
    },

    /// A version string did not start with a dotted numeric run.
    #[error("malformed version string: {0:?}")]
    MalformedVersion(String),

    /// Guard evaluation failed, so the guarded command was not attempted.
    #[error("guard for `{action}` failed")]
    Guard {
        /// Name of the guarded action.
        action: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// A command exited unsuccessfully.
    #[error("command `{command}` failed with exit code {}", exit_code_label(.exit_code))]
    ActionExecution {
        /// Rendered command line.
        command: String,
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
    },

    /// A bounded command exceeded its timeout and was killed.
    #[error("command `{command}` timed out after {}s", .timeout.as_secs())]
    Timeout {
        /// Rendered command line.
        command: String,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// A process could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// IO error during file operations.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Downloading an artifact failed.
    #[error("download of {url} failed: {message}")]
    Download {
        /// Source URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// A command exited successfully but its post-condition does not hold.
    #[error("installation of {subject} could not be verified: {message}")]
    InstallVerification {
        /// What was being installed.
        subject: String,
        /// Why verification failed.
        message: String,
    },

    /// A template could not be rendered.
    #[error("failed to render template {template}: {message}")]
    Render {
        /// Template name.
        template: String,
        /// Renderer message.
        message: String,
    },

    /// Generic error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a query failure.
    pub fn query(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueryFailure {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::QueryFailure { .. } | Error::Spawn { .. } => ErrorCategory::Query,
            Error::MalformedVersion(_) | Error::Render { .. } => ErrorCategory::Format,
            Error::Guard { source, .. } => source.category(),
            Error::ActionExecution { .. } | Error::InstallVerification { .. } => {
                ErrorCategory::Execution
            }
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::Io { .. } => ErrorCategory::Io,
            Error::Download { .. } => ErrorCategory::Network,
            Error::Other(_) => ErrorCategory::Other,
        }
    }
}
