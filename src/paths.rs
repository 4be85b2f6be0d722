//! Filesystem layout for chefboot
//!
//! Every path the converge run reads or writes is an absolute system path
//! (`/etc/stack_release`, `/etc/chef/client.rb`, ...). A [`Layout`] maps
//! those onto an optional root prefix so a run can be staged in a scratch
//! directory.
//!
//! # Environment Variables
//!
//! - `CHEFBOOT_ROOT` - Relocate every filesystem output under this prefix
//!
//! # Root Resolution Priority
//!
//! 1. `--root` on the command line
//! 2. `CHEFBOOT_ROOT` environment variable
//! 3. `/`

use std::path::{Component, Path, PathBuf};

/// Environment variable for the root prefix override
pub const ENV_ROOT: &str = "CHEFBOOT_ROOT";

/// Release marker read by other tooling on the node
pub const STACK_RELEASE: &str = "/etc/stack_release";

/// Site attributes exported as JSON for the agent's recipes
pub const COUPA_ATTR_JSON: &str = "/etc/chef_coupa_attr.json";

/// Ohai hint directory
pub const OHAI_HINTS_DIR: &str = "/etc/chef/ohai/hints";

/// Cloud-init metadata dropped by the image
pub const CLOUD_METADATA: &str = "/var/spool/cloud/meta-data.json";

/// Staged agent installer
pub const INSTALL_SCRIPT: &str = "/tmp/install.sh";

/// Extra CA certificate for the agent's HTTPS client
pub const HTTPS_CA_FILE: &str = "/etc/chef/https_ca_file.crt";

/// System CA bundle used to pin gem downloads
pub const SYSTEM_CA_BUNDLE: &str = "/etc/ssl/certs/ca-bundle.crt";

/// Maps absolute system paths onto a root prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self::system()
    }
}

impl Layout {
    /// The live system root
    pub fn system() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }

    /// Layout rooted at `root`
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the root from the CLI flag, then the environment
    pub fn resolve(cli_root: Option<&Path>) -> Self {
        if let Some(root) = cli_root {
            log::debug!("Using root from --root: {}", root.display());
            return Self::rooted(root);
        }

        if let Ok(root) = std::env::var(ENV_ROOT)
            && !root.is_empty()
        {
            log::debug!("Using root from {}: {}", ENV_ROOT, root);
            return Self::rooted(root);
        }

        Self::system()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether this layout writes to the live system
    pub fn is_system(&self) -> bool {
        self.root == Path::new("/")
    }

    /// Map an absolute system path under the root
    pub fn path(&self, system_path: impl AsRef<Path>) -> PathBuf {
        let system_path = system_path.as_ref();
        if self.is_system() {
            return system_path.to_path_buf();
        }
        let relative: PathBuf = system_path
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();
        self.root.join(relative)
    }
}
