//! `chefboot converge` - bring this node to its desired state

use anyhow::Result;
use declarative::SystemRunner;
use std::path::{Path, PathBuf};

use crate::Context;
use crate::cli::ConvergeArgs;
use crate::engine::{ConvergeOptions, ConvergeReport, Orchestrator};
use crate::fetch::HttpFetcher;
use crate::identity::PersistedLaunchTime;
use crate::paths::Layout;
use crate::ui;

/// File under the agent config dir holding the node's launch time
pub const LAUNCH_TIME_FILE: &str = "launch_time";

pub fn run(ctx: &Context, args: ConvergeArgs) -> Result<()> {
    let mut attrs = super::load_attributes(&args.attributes)?;
    let layout = Layout::resolve(args.attributes.root.as_deref());

    let config_dir = attrs.str_or_empty("chef.client.config_dir");
    let launch_time =
        PersistedLaunchTime::new(launch_time_path(&layout, &config_dir)).dry_run(args.dry_run);
    let runner = SystemRunner;
    let fetcher = HttpFetcher;

    if !ctx.quiet {
        ui::header("Converging node");
        if !layout.is_system() {
            ui::dim(&format!("filesystem rooted at {}", layout.root().display()));
        }
        if args.dry_run {
            ui::warn("Dry run: nothing on this node will change");
        }
    }

    let mut progress = ui::ConsoleProgress::new(ctx.quiet);
    let report = Orchestrator::new(
        &mut attrs,
        &layout,
        &runner,
        &fetcher,
        &launch_time,
    )?
    .options(ConvergeOptions {
        dry_run: args.dry_run,
        verbose: ctx.verbose > 0,
    })
    .run(&mut progress)?;

    if !ctx.quiet {
        print_report(&report, args.dry_run);
    }
    Ok(())
}

fn launch_time_path(layout: &Layout, config_dir: &str) -> PathBuf {
    layout.path(Path::new(config_dir).join(LAUNCH_TIME_FILE))
}

fn print_report(report: &ConvergeReport, dry_run: bool) {
    ui::header("Summary");
    if let Some(name) = &report.node_name {
        ui::kv("node name", name);
    }
    let roles = if report.roles.is_empty() {
        "(none)"
    } else {
        report.roles.as_str()
    };
    ui::kv("roles", roles);
    ui::kv("log level", &report.log_level);
    ui::kv("log location", &report.log_location);

    let summary = &report.summary;
    println!();
    let counts = format!(
        "{} created, {} modified, {} executed, {} unchanged, {} skipped",
        summary.created, summary.modified, summary.executed, summary.no_change, summary.skipped
    );
    if dry_run {
        ui::info(&format!("Would apply: {counts}"));
    } else {
        ui::success(&format!("Converged: {counts}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_time_path_follows_layout() {
        let layout = Layout::rooted("/tmp/stage");
        assert_eq!(
            launch_time_path(&layout, "/etc/chef"),
            Path::new("/tmp/stage/etc/chef/launch_time")
        );
        assert_eq!(
            launch_time_path(&Layout::system(), "/etc/chef"),
            Path::new("/etc/chef/launch_time")
        );
    }
}
