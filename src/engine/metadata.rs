//! Cloud metadata sniffing for the Ohai EC2 hint
//!
//! Ohai does not detect EC2 inside a VPC on its own. The hint file is
//! present exactly when the cloud-init metadata names the AWS domain.

use serde::Deserialize;
use std::fs;
use std::path::Path;

const AWS_DOMAIN: &str = "amazonaws.com";

#[derive(Debug, Default, Deserialize)]
struct CloudMetadata {
    #[serde(default)]
    services: Services,
}

#[derive(Debug, Default, Deserialize)]
struct Services {
    #[serde(default)]
    domain: Option<String>,
}

/// Whether the metadata at `path` describes an EC2 instance
///
/// A missing or unparseable metadata file counts as "not EC2".
pub fn is_ec2(path: &Path) -> bool {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            log::debug!("No cloud metadata at {}: {}", path.display(), e);
            return false;
        }
    };
    match serde_json::from_str::<CloudMetadata>(&raw) {
        Ok(meta) => meta.services.domain.as_deref() == Some(AWS_DOMAIN),
        Err(e) => {
            log::warn!("Ignoring unparseable cloud metadata {}: {}", path.display(), e);
            false
        }
    }
}
