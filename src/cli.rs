use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chefboot")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Install, configure and run the Chef client on this node", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge this node: install the agent, write its config, run it
    Converge(ConvergeArgs),

    /// Print the merged node attributes as JSON
    Attributes(AttributeArgs),

    /// Print the node name this node registers under
    NodeName(AttributeArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Where node attributes come from
#[derive(Args, Debug, Clone)]
pub struct AttributeArgs {
    /// TOML attribute file (repeatable, later files win)
    #[arg(short = 'a', long = "attributes", value_name = "FILE")]
    pub attribute_files: Vec<PathBuf>,

    /// Override a single attribute, e.g. `chef.client.environment=prod`
    #[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
    pub assignments: Vec<String>,

    /// Relocate every filesystem path under this directory
    #[arg(long, env = "CHEFBOOT_ROOT", value_name = "DIR")]
    pub root: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ConvergeArgs {
    #[command(flatten)]
    pub attributes: AttributeArgs,

    /// Show what would change without changing anything
    #[arg(long)]
    pub dry_run: bool,
}
