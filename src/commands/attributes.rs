//! `chefboot attributes` and `chefboot node-name`

use anyhow::Result;

use super::converge::LAUNCH_TIME_FILE;
use crate::cli::AttributeArgs;
use crate::engine::derive_node_name;
use crate::identity::PersistedLaunchTime;
use crate::paths::Layout;

/// Print the merged attribute tree as pretty JSON
pub fn show(args: &AttributeArgs) -> Result<()> {
    let attrs = super::load_attributes(args)?;
    println!("{}", serde_json::to_string_pretty(&attrs.merged())?);
    Ok(())
}

/// Print the node name a converge would register under
///
/// Never records a launch time; a node that has not converged yet gets a
/// name based on the current time.
pub fn node_name(args: &AttributeArgs) -> Result<()> {
    let attrs = super::load_attributes(args)?;
    let layout = Layout::resolve(args.root.as_deref());
    let path = layout
        .path(attrs.str_or_empty("chef.client.config_dir"))
        .join(LAUNCH_TIME_FILE);
    let launch_time = PersistedLaunchTime::new(path).dry_run(true);
    println!("{}", derive_node_name(&attrs, &launch_time)?);
    Ok(())
}
