// Node convergence
pub mod converge;

// Read-only views of the node's attributes
pub mod attributes;

use anyhow::{Context as AnyhowContext, Result};

use crate::attributes::AttributeStore;
use crate::cli::AttributeArgs;

/// Build the attribute store: defaults, then each file, then each `--set`
pub fn load_attributes(args: &AttributeArgs) -> Result<AttributeStore> {
    let mut store = AttributeStore::with_defaults()?;
    for file in &args.attribute_files {
        store
            .load_file(file)
            .with_context(|| format!("Failed to load attributes from {}", file.display()))?;
    }
    for assignment in &args.assignments {
        store
            .apply_assignment(assignment)
            .with_context(|| format!("Invalid --set {assignment:?}"))?;
    }
    Ok(store)
}
