//! System resources managed by the converge run
//!
//! Each resource implements [`declarative::Resource`]: it detects its
//! current state, and `apply` converges it, returning `NoChange` when the
//! node already matches.

pub mod ca_bundle;
pub mod directory;
pub mod file;
pub mod ownership;

pub use ca_bundle::CaBundleCheck;
pub use directory::ManagedDirectory;
pub use file::{Ensure, FileSource, ManagedFile};
