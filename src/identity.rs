//! Node identity - `<filtered base>-<launch timestamp>`
//!
//! The launch timestamp is captured once per node and persisted, so every
//! converge on the same node registers under the same name.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::path::PathBuf;

/// Timestamp layout used in node names
pub const LAUNCH_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Source of the node's launch time
pub trait LaunchTime {
    fn launch_time(&self) -> Result<DateTime<Utc>>;
}

/// A fixed launch time
#[derive(Debug, Clone, Copy)]
pub struct FixedLaunchTime(pub DateTime<Utc>);

impl LaunchTime for FixedLaunchTime {
    fn launch_time(&self) -> Result<DateTime<Utc>> {
        Ok(self.0)
    }
}

/// Launch time recorded in a file on first use
#[derive(Debug, Clone)]
pub struct PersistedLaunchTime {
    path: PathBuf,
    dry_run: bool,
}

impl PersistedLaunchTime {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            dry_run: false,
        }
    }

    /// Report the current time without recording it
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl LaunchTime for PersistedLaunchTime {
    fn launch_time(&self) -> Result<DateTime<Utc>> {
        if self.path.exists() {
            let raw = fs::read_to_string(&self.path)
                .with_context(|| format!("Failed to read {}", self.path.display()))?;
            let parsed = NaiveDateTime::parse_from_str(raw.trim(), LAUNCH_TIME_FORMAT)
                .with_context(|| {
                    format!("Invalid launch time {:?} in {}", raw.trim(), self.path.display())
                })?;
            return Ok(parsed.and_utc());
        }

        let now = Utc::now();
        if self.dry_run {
            return Ok(now);
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, format!("{}\n", now.format(LAUNCH_TIME_FORMAT)))
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        log::debug!("Recorded launch time in {}", self.path.display());
        Ok(now)
    }
}

/// Keep only `[A-Za-z0-9_-]`
pub fn filter_base(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Derive the node name from a configured base and the launch time
pub fn node_name(base: &str, launched: DateTime<Utc>) -> Result<String> {
    let filtered = filter_base(base);
    if filtered.is_empty() {
        bail!(
            "Node name base {:?} has no characters left after filtering to [A-Za-z0-9_-]",
            base
        );
    }
    Ok(format!("{}-{}", filtered, launched.format(LAUNCH_TIME_FORMAT)))
}

/// The system hostname, or `localhost` if it cannot be read
pub fn system_hostname() -> String {
    let mut buf = [0u8; 256];
    // SAFETY: `buf` is valid for writes of `buf.len()` bytes; the result is
    // NUL-terminated on success for names shorter than the buffer.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return "localhost".to_string();
    }
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    match String::from_utf8_lossy(&buf[..end]).trim() {
        "" => "localhost".to_string(),
        name => name.to_string(),
    }
}
