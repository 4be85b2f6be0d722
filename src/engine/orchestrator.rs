//! Convergence orchestrator - the fixed bootstrap sequence
//!
//! Steps run in order, each at most once. The first failing step aborts the
//! run; nothing applied before it is rolled back, and every step is
//! idempotent, so a re-run picks up where the failed one stopped.

use anyhow::{Context, Result, bail};
use declarative::{
    ApplyContext, ApplyResult, CommandRunner, CommandSpec, ExecuteSummary, GuardedAction,
    ProgressCallback, Resource, apply_step, needs_action,
};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::agent_run::{AgentRun, DEFAULT_RUN_TIMEOUT};
use super::metadata;
use crate::agent::{
    API_CLIENT_MIN_MAJOR, AgentVersionQuery, CHEF_CLIENT_OMNIBUS, EMBEDDED_GEM, GemVersionQuery,
    RUBYGEMS_MINIMUM, gem_listed,
};
use crate::attributes::AttributeStore;
use crate::fetch::Fetcher;
use crate::identity::{self, LaunchTime};
use crate::paths::{self, Layout};
use crate::resource::{CaBundleCheck, ManagedDirectory, ManagedFile};
use crate::template::{self, TemplateRenderer};

/// Skip reason reported by resources during a dry run
const DRY_RUN: &str = "dry run";

/// Run-wide switches
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvergeOptions {
    pub dry_run: bool,
    pub verbose: bool,
}

/// Outcome of one applied step
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub id: String,
    pub result: ApplyResult,
}

/// What a converge run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConvergeReport {
    pub steps: Vec<StepRecord>,
    pub node_name: Option<String>,
    pub roles: String,
    pub log_location: String,
    pub log_level: String,
    pub summary: ExecuteSummary,
}

impl ConvergeReport {
    fn record(&mut self, id: String, result: &ApplyResult) {
        self.summary.add_result(result);
        self.steps.push(StepRecord {
            id,
            result: result.clone(),
        });
    }

    /// Result of the step with the given id
    pub fn result_of(&self, id: &str) -> Option<&ApplyResult> {
        self.steps.iter().find(|s| s.id == id).map(|s| &s.result)
    }
}

/// Split on commas, trim, drop empties, rejoin
pub fn normalize_roles(raw: &str) -> String {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Derive the node name from the attributes and a launch time source
pub fn derive_node_name(attrs: &AttributeStore, launch_time: &dyn LaunchTime) -> Result<String> {
    let launched = launch_time.launch_time()?;
    identity::node_name(&attrs.str_or_empty("chef.client.node_name"), launched)
}

/// Walks the bootstrap sequence against one node
pub struct Orchestrator<'a> {
    attrs: &'a mut AttributeStore,
    layout: &'a Layout,
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn Fetcher,
    launch_time: &'a dyn LaunchTime,
    renderer: TemplateRenderer,
    options: ConvergeOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        attrs: &'a mut AttributeStore,
        layout: &'a Layout,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn Fetcher,
        launch_time: &'a dyn LaunchTime,
    ) -> Result<Self> {
        Ok(Self {
            attrs,
            layout,
            runner,
            fetcher,
            launch_time,
            renderer: TemplateRenderer::from_embedded()?,
            options: ConvergeOptions::default(),
        })
    }

    pub fn options(mut self, options: ConvergeOptions) -> Self {
        self.options = options;
        self
    }

    /// Converge the node
    pub fn run<P: ProgressCallback>(mut self, progress: &mut P) -> Result<ConvergeReport> {
        let runner = self.runner;
        let mut ctx = ApplyContext::new(runner)
            .dry_run(self.options.dry_run)
            .verbose(self.options.verbose);
        let mut report = ConvergeReport::default();
        let mut steps = Steps {
            ctx: &mut ctx,
            report: &mut report,
            progress,
        };

        self.prepare_system(&mut steps)?;
        self.install_agent(&mut steps)?;
        let config_dir = self.configure_agent(&mut steps)?;
        self.run_agent(&mut steps, &config_dir)?;

        self.summarize(&mut report);
        Ok(report)
    }

    /// CA bundle, release marker, roles, site attributes, Ohai hints
    fn prepare_system<P: ProgressCallback>(&mut self, steps: &mut Steps<'_, '_, P>) -> Result<()> {
        let layout = self.layout;

        steps.apply(&CaBundleCheck::new(layout.clone()))?;

        steps.apply(&ManagedFile::new(
            layout.path(paths::STACK_RELEASE),
            self.attrs.str_or_empty("coupa.stack_release"),
            0o444,
        ))?;

        let roles = normalize_roles(&self.attrs.str_or_empty("chef.client.roles"));
        log::info!(
            "Node role(s): {}",
            if roles.is_empty() { "(none)" } else { roles.as_str() }
        );
        self.attrs.override_value("coupa.role", roles)?;

        let coupa = serde_json::to_string_pretty(&self.attrs.subtree("coupa"))
            .context("Failed to serialize coupa attributes")?;
        let mut coupa_attr = ManagedFile::new(
            layout.path(paths::COUPA_ATTR_JSON),
            format!("{}\n", coupa),
            0o400,
        );
        if layout.is_system() {
            coupa_attr = coupa_attr.owned_by("root", "root");
        }
        steps.apply(&coupa_attr)?;

        let hints = layout.path(paths::OHAI_HINTS_DIR);
        steps.apply(&ManagedDirectory::new(&hints))?;
        let ec2_hint = hints.join("ec2.json");
        if metadata::is_ec2(&layout.path(paths::CLOUD_METADATA)) {
            steps.apply(&ManagedFile::new(ec2_hint, "", 0o644))?;
        } else {
            steps.apply(&ManagedFile::absent(ec2_hint))?;
        }
        Ok(())
    }

    /// Agent, RubyGems, HTTPS CA file, API client gem
    fn install_agent<P: ProgressCallback>(&mut self, steps: &mut Steps<'_, '_, P>) -> Result<()> {
        let layout = self.layout;
        let runner = self.runner;
        let fetcher = self.fetcher;

        let version = self.attrs.str_or_empty("chef.client.version");
        if version.trim().is_empty() {
            bail!("chef.client.version is not set");
        }
        let script_url = self.attrs.str_or_empty("chef.client.install_script_url");
        let script_path = layout.path(paths::INSTALL_SCRIPT);
        let install = GuardedAction::new(
            "install chef client",
            CommandSpec::new(script_path.display().to_string()).args(["-v", version.as_str()]),
        )
        .only_if(|| needs_action(&AgentVersionQuery::new(runner), &version))
        .prepare(|ctx| {
            let script = fetcher.fetch(&script_url, None)?;
            let mut staging = ApplyContext::new(ctx.runner);
            ManagedFile::bytes(&script_path, script, 0o755)
                .no_backup()
                .apply(&mut staging)?;
            Ok(())
        });
        let agent_pending = matches!(
            steps.apply(&install)?,
            ApplyResult::Skipped { ref reason } if reason == DRY_RUN
        );

        let rubygems = GuardedAction::new(
            "install newer rubygems",
            CommandSpec::new(EMBEDDED_GEM).args(["update", "--system", RUBYGEMS_MINIMUM]),
        )
        .only_if(|| needs_action(&GemVersionQuery::new(runner), RUBYGEMS_MINIMUM));
        steps.apply(&rubygems)?;

        steps.apply(
            &ManagedFile::new(
                layout.path(paths::HTTPS_CA_FILE),
                self.attrs.str_or_empty("chef.client.ca_file"),
                0o600,
            )
            .skip_when_empty(),
        )?;

        let gem_name = self.attrs.str_or_empty("chef.client.api_client_gem.name");
        let gem_version = self.attrs.str_or_empty("chef.client.api_client_gem.version");
        let gem_file = format!("{}-{}.gem", gem_name, gem_version);
        let gem_url = format!(
            "https://s3.amazonaws.com/packages.{}/{}",
            self.attrs.str_or_empty("coupa.serverdomain"),
            gem_file
        );
        let gem_path = layout.path(Path::new("/tmp").join(&gem_file));
        let ca_bundle = layout.path(paths::SYSTEM_CA_BUNDLE);
        let api_client = GuardedAction::new(
            format!("install {} gem", gem_name),
            CommandSpec::new(EMBEDDED_GEM)
                .arg("install")
                .arg(gem_path.display().to_string()),
        )
        .only_if(|| {
            let agent = AgentVersionQuery::at(runner, CHEF_CLIENT_OMNIBUS).version()?;
            Ok(agent.major() >= API_CLIENT_MIN_MAJOR && !gem_listed(runner, &gem_name)?)
        })
        .prepare(|ctx| {
            let gem = fetcher.fetch(&gem_url, Some(&ca_bundle))?;
            let mut staging = ApplyContext::new(ctx.runner);
            ManagedFile::bytes(&gem_path, gem, 0o644)
                .no_backup()
                .apply(&mut staging)?;
            Ok(())
        })
        .verify(|runner| gem_listed(runner, &gem_name));
        // The agent a dry run would install is not there to be queried
        if agent_pending {
            steps.skip(&api_client, "agent not installed (dry run)");
        } else {
            steps.apply(&api_client)?;
        }

        log::info!("Chef Client version {} installation is completed", version);
        Ok(())
    }

    /// Config directory, node identity, configuration and credentials
    fn configure_agent<P: ProgressCallback>(
        &mut self,
        steps: &mut Steps<'_, '_, P>,
    ) -> Result<PathBuf> {
        let layout = self.layout;
        let attrs = &*self.attrs;

        let config_dir_attr = attrs.str_or_empty("chef.client.config_dir");
        if config_dir_attr.is_empty() {
            bail!("chef.client.config_dir is not set");
        }
        let config_dir = layout.path(&config_dir_attr);
        steps.apply(&ManagedDirectory::new(&config_dir))?;

        let node_name = derive_node_name(attrs, self.launch_time)?;
        log::info!("Chef node name: {}", node_name);
        steps.report.node_name = Some(node_name.clone());

        let ca_file = attrs.str_or_empty("chef.client.ca_file");
        steps.apply(
            &ManagedFile::template(
                config_dir.join("client.rb"),
                &self.renderer,
                template::CLIENT_RB,
                json!({
                    "server_url": attrs.str_or_empty("chef.client.server_url"),
                    "validation_name": attrs.str_or_empty("chef.client.validation_name"),
                    "node_name": node_name,
                    "ca_file": ca_file,
                    "ca_path": paths::HTTPS_CA_FILE,
                    "config_dir": config_dir_attr,
                    "log_level": attrs.str_or_empty("chef.client.log_level"),
                    "log_location": attrs.str_or_empty("chef.client.log_location"),
                }),
                0o644,
            )
            .no_backup(),
        )?;

        steps.apply(
            &ManagedFile::template(
                config_dir.join("validation.pem"),
                &self.renderer,
                template::VALIDATION_PEM,
                json!({ "validation_key": attrs.str_or_empty("chef.client.validator_pem") }),
                0o600,
            )
            .no_backup(),
        )?;

        steps.apply(
            &ManagedFile::new(
                config_dir.join("encrypted_data_bag_secret"),
                attrs.str_or_empty("chef.client.data_bag_secret"),
                0o600,
            )
            .skip_when_empty(),
        )?;

        let run_list: Vec<String> = normalize_roles(&attrs.str_or_empty("chef.client.roles"))
            .split(',')
            .filter(|r| !r.is_empty())
            .map(|r| format!("role[{}]", r))
            .collect();
        steps.apply(
            &ManagedFile::template(
                config_dir.join("runlist.json"),
                &self.renderer,
                template::RUNLIST_JSON,
                json!({
                    "node_name": node_name,
                    "environment": attrs.str_or_empty("chef.client.environment"),
                    "company": attrs.str_or_empty("chef.client.company"),
                    "run_list": run_list,
                }),
                0o440,
            )
            .no_backup(),
        )?;

        let roles = self.attrs.str_or_empty("chef.client.roles");
        self.attrs.set("chef.client.current_roles", roles)?;
        log::info!("Chef Client configuration is completed");
        Ok(config_dir)
    }

    /// The bounded agent run
    fn run_agent<P: ProgressCallback>(
        &mut self,
        steps: &mut Steps<'_, '_, P>,
        config_dir: &Path,
    ) -> Result<()> {
        let attrs = &*self.attrs;
        let timeout = attrs
            .get_u64("chef.client.run_timeout")?
            .map_or(DEFAULT_RUN_TIMEOUT, Duration::from_secs);
        let run = AgentRun {
            environment: attrs.str_or_empty("chef.client.environment"),
            runlist_override: attrs.str_or_empty("chef.client.runlist_override"),
            strace: attrs.str_or_empty("chef.client.strace") == "true",
            log_location: attrs.str_or_empty("chef.client.log_location"),
            timeout,
            ..AgentRun::new(config_dir)
        };

        steps.apply(&GuardedAction::new("run chef-client", run.command()).timeout(run.timeout))?;
        Ok(())
    }

    fn summarize(&self, report: &mut ConvergeReport) {
        report.roles = self.attrs.str_or_empty("chef.client.current_roles");
        report.log_location = self.attrs.str_or_empty("chef.client.log_location");
        report.log_level = self.attrs.str_or_empty("chef.client.log_level");

        log::info!("Chef Client role(s) are: {}", report.roles);
        log::info!("Chef Client logging location: {}", report.log_location);
        log::info!("Chef Client logging level: {}", report.log_level);
    }
}

/// Applies resources in order, recording each outcome
struct Steps<'c, 'r, P> {
    ctx: &'c mut ApplyContext<'r>,
    report: &'c mut ConvergeReport,
    progress: &'c mut P,
}

impl<P: ProgressCallback> Steps<'_, '_, P> {
    fn apply(&mut self, resource: &dyn Resource) -> Result<ApplyResult> {
        let id = resource.id();
        let result = apply_step(resource, self.ctx, self.progress)
            .with_context(|| format!("Converge step `{}` failed", id))?;
        self.report.record(id, &result);
        Ok(result)
    }

    /// Record a step as skipped without applying it
    fn skip(&mut self, resource: &dyn Resource, reason: &str) {
        let id = resource.id();
        let result = ApplyResult::Skipped {
            reason: reason.to_string(),
        };
        log::info!("Skipping `{}`: {}", id, reason);
        self.progress.on_step_start(&id, &resource.description());
        self.progress.on_step_complete(&id, &result);
        self.report.record(id, &result);
    }
}
