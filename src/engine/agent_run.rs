//! Agent run command assembly

use declarative::CommandSpec;
use std::path::Path;
use std::time::Duration;

use crate::agent::CHEF_CLIENT;

/// Upper bound on an agent run when none is configured
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(86_400);

/// How the agent should be invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRun {
    pub json_attributes: String,
    pub environment: String,
    pub runlist_override: String,
    /// Wrap the run in `strace`, writing to `<log_location>.strace`
    pub strace: bool,
    pub log_location: String,
    pub timeout: Duration,
}

impl AgentRun {
    /// Settings for an agent whose configuration lives in `config_dir`
    pub fn new(config_dir: &Path) -> Self {
        Self {
            json_attributes: config_dir.join("runlist.json").display().to_string(),
            environment: String::new(),
            runlist_override: String::new(),
            strace: false,
            log_location: String::new(),
            timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    /// Arguments appended to `chef-client`
    ///
    /// `--environment` and `--override-runlist` only appear when their
    /// values are non-empty.
    pub fn extension(&self) -> Vec<String> {
        let mut args = vec![
            "--json-attributes".to_string(),
            self.json_attributes.clone(),
        ];
        if !self.environment.is_empty() {
            args.extend(["--environment".to_string(), self.environment.clone()]);
        }
        if !self.runlist_override.is_empty() {
            args.extend([
                "--override-runlist".to_string(),
                self.runlist_override.clone(),
            ]);
        }
        args
    }

    /// The full command, strace wrapper included
    pub fn command(&self) -> CommandSpec {
        let agent = CommandSpec::new(CHEF_CLIENT).args(self.extension());
        if !self.strace {
            return agent;
        }
        CommandSpec::new("strace")
            .args([
                "-f".to_string(),
                "-o".to_string(),
                format!("{}.strace", self.log_location),
                "-T".to_string(),
                "-ttt".to_string(),
            ])
            .arg(agent.program)
            .args(agent.args)
    }
}
