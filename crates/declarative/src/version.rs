//! Version gate - decides whether an install/upgrade must run
//!
//! Versions are dotted numeric strings compared component by component,
//! with missing trailing components treated as zero.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// Version substituted when the installed version cannot be detected
pub const SENTINEL_VERSION: &str = "0.0.0";

/// A dotted numeric version
#[derive(Debug, Clone, Eq)]
pub struct Version {
    components: Vec<u64>,
}

impl Version {
    /// Parse a strictly dotted numeric version (`12.3.1`)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::MalformedVersion(s.to_string()));
        }
        let components = s
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| Error::MalformedVersion(s.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { components })
    }

    /// Parse the leading `[0-9.]+` run of a version with a trailing qualifier
    ///
    /// `12.3.1-2` parses as `12.3.1`; a string that does not start with a
    /// digit is malformed.
    pub fn parse_leading(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let end = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let run = trimmed[..end].trim_end_matches('.');
        if run.is_empty() || run.starts_with('.') {
            return Err(Error::MalformedVersion(s.to_string()));
        }
        Self::parse(run).map_err(|_| Error::MalformedVersion(s.to_string()))
    }

    /// The first (major) component
    pub fn major(&self) -> u64 {
        self.components.first().copied().unwrap_or(0)
    }

    fn component(&self, idx: usize) -> u64 {
        self.components.get(idx).copied().unwrap_or(0)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// A read-only probe for the currently installed version of something
pub trait VersionQuery {
    /// Human-readable name of what is being probed (for logs)
    fn subject(&self) -> String;

    /// Query the installed version string
    fn installed_version(&self) -> Result<String>;
}

/// Decide whether the installed version is older than the required one
///
/// A failed query is logged and treated as [`SENTINEL_VERSION`], so an
/// undetectable install counts as "needs install". A malformed required
/// version is an error.
pub fn needs_action(current: &dyn VersionQuery, required: &str) -> Result<bool> {
    let required = Version::parse_leading(required)?;

    let installed = match current.installed_version() {
        Ok(v) => match Version::parse_leading(&v) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!(
                    "Could not parse installed {} version ({}); assuming {}",
                    current.subject(),
                    e,
                    SENTINEL_VERSION
                );
                Version::parse(SENTINEL_VERSION)?
            }
        },
        Err(e) => {
            log::warn!(
                "Could not detect installed {} ({}); assuming {}",
                current.subject(),
                e,
                SENTINEL_VERSION
            );
            Version::parse(SENTINEL_VERSION)?
        }
    };

    let needed = installed < required;
    log::info!(
        "{}: installed {}, required {} -> {}",
        current.subject(),
        installed,
        required,
        if needed { "action needed" } else { "up to date" }
    );
    Ok(needed)
}
