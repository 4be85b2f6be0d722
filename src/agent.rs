//! Probes for the installed agent and its embedded Ruby tooling

use declarative::{CommandRunner, Error, Result, Version, VersionQuery, display_command};
use regex::Regex;
use std::sync::LazyLock;

/// Agent binary as found on PATH
pub const CHEF_CLIENT: &str = "chef-client";

/// Agent binary at its omnibus install location
pub const CHEF_CLIENT_OMNIBUS: &str = "/opt/chef/bin/chef-client";

/// Gem binary shipped with the agent's embedded Ruby
pub const EMBEDDED_GEM: &str = "/opt/chef/embedded/bin/gem";

/// Oldest RubyGems that keeps persistent connections during installs
pub const RUBYGEMS_MINIMUM: &str = "2.3.0";

/// First agent major version the API client gem is installed for
pub const API_CLIENT_MIN_MAJOR: u64 = 12;

static CHEF_VERSION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Chef: (.*)$").expect("version line regex is valid"));

/// `chef-client --version`, reporting the text after `Chef: `
pub struct AgentVersionQuery<'a> {
    runner: &'a dyn CommandRunner,
    program: &'a str,
}

impl<'a> AgentVersionQuery<'a> {
    /// Query the agent found on PATH
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            program: CHEF_CLIENT,
        }
    }

    /// Query a specific agent binary
    pub fn at(runner: &'a dyn CommandRunner, program: &'a str) -> Self {
        Self { runner, program }
    }

    /// Parsed installed version; every failure propagates
    pub fn version(&self) -> Result<Version> {
        Version::parse_leading(&self.installed_version()?)
    }
}

impl VersionQuery for AgentVersionQuery<'_> {
    fn subject(&self) -> String {
        self.program.to_string()
    }

    fn installed_version(&self) -> Result<String> {
        let output = self.runner.run_capture(self.program, &["--version"])?;
        parse_chef_version(&output).ok_or_else(|| {
            Error::query(
                display_command(self.program, &["--version"]),
                format!("no `Chef: <version>` line in {:?}", output.trim()),
            )
        })
    }
}

fn parse_chef_version(output: &str) -> Option<String> {
    CHEF_VERSION_LINE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// `gem --version` of the embedded Ruby
pub struct GemVersionQuery<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> GemVersionQuery<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }
}

impl VersionQuery for GemVersionQuery<'_> {
    fn subject(&self) -> String {
        "rubygems".to_string()
    }

    fn installed_version(&self) -> Result<String> {
        let output = self.runner.run_capture(EMBEDDED_GEM, &["--version"])?;
        Ok(output.trim().to_string())
    }
}

/// Whether `gem list <name>` reports a gem whose line starts with `name`
pub fn gem_listed(runner: &dyn CommandRunner, name: &str) -> Result<bool> {
    let output = runner.run_capture(EMBEDDED_GEM, &["list", name])?;
    Ok(output.lines().any(|line| line.starts_with(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::CommandOutput;
    use std::time::Duration;

    /// Replies to every command with the same output
    struct Canned(CommandOutput);

    impl CommandRunner for Canned {
        fn run(&self, _program: &str, _args: &[&str]) -> Result<CommandOutput> {
            Ok(self.0.clone())
        }

        fn run_bounded(&self, program: &str, args: &[&str], _t: Duration) -> Result<CommandOutput> {
            self.run(program, args)
        }
    }

    #[test]
    fn test_parse_chef_version_line() {
        assert_eq!(parse_chef_version("Chef: 12.5.1\n").as_deref(), Some("12.5.1"));
        assert_eq!(
            parse_chef_version("warning: foo\nChef: 11.18.12\n").as_deref(),
            Some("11.18.12")
        );
        assert_eq!(parse_chef_version("Chef Infra Client: 17.0.0"), None);
    }

    #[test]
    fn test_agent_query_reports_version() {
        let runner = Canned(CommandOutput::ok("Chef: 12.5.0\n"));
        let query = AgentVersionQuery::new(&runner);
        assert_eq!(query.installed_version().unwrap(), "12.5.0");
        assert_eq!(query.version().unwrap().major(), 12);
    }

    #[test]
    fn test_agent_query_without_match_fails() {
        let runner = Canned(CommandOutput::ok("command not found\n"));
        let err = AgentVersionQuery::new(&runner).installed_version().unwrap_err();
        assert!(matches!(err, Error::QueryFailure { .. }));
    }

    #[test]
    fn test_gem_version_trimmed() {
        let runner = Canned(CommandOutput::ok("2.1.11\n"));
        assert_eq!(GemVersionQuery::new(&runner).installed_version().unwrap(), "2.1.11");
    }

    #[test]
    fn test_gem_listed_matches_line_prefix() {
        let runner = Canned(CommandOutput::ok(
            "\n*** LOCAL GEMS ***\n\nright_api_client (1.5.26)\n",
        ));
        assert!(gem_listed(&runner, "right_api_client").unwrap());

        let runner = Canned(CommandOutput::ok("\n*** LOCAL GEMS ***\n\n"));
        assert!(!gem_listed(&runner, "right_api_client").unwrap());
    }

    #[test]
    fn test_gem_list_failure_propagates() {
        let runner = Canned(CommandOutput::failed(1));
        assert!(gem_listed(&runner, "right_api_client").is_err());
    }
}
