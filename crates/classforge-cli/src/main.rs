//! classforge - course repository provisioning
//!
//! Usage:
//!   classforge provision groups batch.toml     # create team repositories
//!   classforge repair project batch.toml       # converge student repositories
//!   classforge teardown team team9             # delete a recorded repository
//!   classforge teams list                      # inspect the organization

mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use classforge_core::config::{ClassforgeConfig, ConfigStore};
use classforge_core::entity::{EntityRef, EntityStore, FileEntityStore};
use classforge_core::github::{GitHubClient, HostingApi};
use classforge_core::provision::{
    BatchRunner, EntityOutcome, GroupManifest, ProjectManifest, ProvisionTargets, Provisioner,
    RepairFacet, teardown,
};

use crate::report::OutputFormat;

/// Token override read at the process boundary only.
const TOKEN_ENV: &str = "CLASSFORGE_GITHUB_TOKEN";

#[derive(Parser)]
#[command(name = "classforge")]
#[command(about = "Provision course repositories and teams on GitHub", long_about = None)]
struct Cli {
    /// Path to classforge.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision every entity in a batch file
    Provision(ProvisionArgs),

    /// Repair every entity in a batch file
    ///
    /// Without --facet, provisioned entities get their default facets
    /// re-applied and half-finished ones are resumed.
    Repair {
        kind: Kind,
        /// Batch file listing the entities
        batch: PathBuf,
        /// Repair only these facets (repeatable)
        #[arg(long = "facet")]
        facets: Vec<RepairFacet>,
    },

    /// Delete the repository recorded on an entity
    Teardown {
        kind: Kind,
        /// Entity id as used in the batch file
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Organization teams
    Teams(ListArgs),

    /// Organization repositories
    Repos(ListArgs),

    /// Commit lookups and feedback
    Commits(CommitsArgs),

    /// Manage classforge.toml
    Config(ConfigArgs),
}

#[derive(Args)]
struct ProvisionArgs {
    #[command(subcommand)]
    command: ProvisionSubcommand,
}

#[derive(Subcommand)]
enum ProvisionSubcommand {
    /// Shared team repositories
    Groups { batch: PathBuf },
    /// Individual student repositories
    Projects { batch: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    /// Shared team repository
    #[value(alias = "team")]
    Group,
    /// Individual student repository
    Project,
}

#[derive(Args)]
struct ListArgs {
    #[command(subcommand)]
    command: ListSubcommand,
}

#[derive(Subcommand)]
enum ListSubcommand {
    /// List everything in the organization
    List,
}

#[derive(Args)]
struct CommitsArgs {
    #[command(subcommand)]
    command: CommitsSubcommand,
}

#[derive(Subcommand)]
enum CommitsSubcommand {
    /// Newest commit authored at or before a deadline
    Latest {
        repo: String,
        /// Deadline as RFC 3339, e.g. 2026-03-01T23:59:00Z
        #[arg(long)]
        before: String,
    },
    /// Post a comment on a commit
    Comment {
        repo: String,
        sha: String,
        body: String,
    },
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Write a starter classforge.toml
    Init {
        /// Organization owning the repositories
        #[arg(long)]
        org: String,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so JSON reports stay parseable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "classforge=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_store = match cli.config {
        Some(path) => ConfigStore::at(path),
        None => ConfigStore::from_default_location()?,
    };

    run_cli(cli.command, &config_store, cli.format).await
}

async fn run_cli(
    command: Commands,
    config_store: &ConfigStore,
    format: OutputFormat,
) -> Result<ExitCode> {
    match command {
        Commands::Provision(args) => {
            let ctx = AppContext::load(config_store)?;
            let outcomes = match args.command {
                ProvisionSubcommand::Groups { batch } => {
                    let manifest = GroupManifest::load(&batch)?;
                    let runner = ctx.runner(manifest.targets(&ctx.config)?)?;
                    runner.provision_groups(manifest.descriptions()).await
                }
                ProvisionSubcommand::Projects { batch } => {
                    let manifest = ProjectManifest::load(&batch)?;
                    let runner = ctx.runner(manifest.targets(&ctx.config)?)?;
                    runner.provision_projects(manifest.descriptions()).await
                }
            };
            finish_batch(&outcomes, format)
        }
        Commands::Repair {
            kind,
            batch,
            facets,
        } => {
            let ctx = AppContext::load(config_store)?;
            let facets = (!facets.is_empty()).then_some(facets);
            let outcomes = match kind {
                Kind::Group => {
                    let manifest = GroupManifest::load(&batch)?;
                    let runner = ctx.runner(manifest.targets(&ctx.config)?)?;
                    runner.repair_groups(manifest.descriptions(), facets).await
                }
                Kind::Project => {
                    let manifest = ProjectManifest::load(&batch)?;
                    let runner = ctx.runner(manifest.targets(&ctx.config)?)?;
                    runner.repair_projects(manifest.descriptions(), facets).await
                }
            };
            finish_batch(&outcomes, format)
        }
        Commands::Teardown { kind, id, yes } => {
            let ctx = AppContext::load(config_store)?;
            let entity = match kind {
                Kind::Group => EntityRef::team(id),
                Kind::Project => EntityRef::project(id),
            };
            run_teardown(&ctx, &entity, yes, format).await
        }
        Commands::Teams(ListArgs {
            command: ListSubcommand::List,
        }) => {
            let ctx = AppContext::load(config_store)?;
            let teams = ctx.client()?.list_teams().await?;
            report::print_teams(&teams, format)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Repos(ListArgs {
            command: ListSubcommand::List,
        }) => {
            let ctx = AppContext::load(config_store)?;
            let repos = ctx.client()?.list_repos().await?;
            report::print_repos(&repos, format)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Commits(args) => {
            let ctx = AppContext::load(config_store)?;
            run_commits(&ctx, args.command, format).await
        }
        Commands::Config(args) => run_config(config_store, args.command),
    }
}

/// Loaded configuration plus the resolved state-file location.
struct AppContext {
    config: ClassforgeConfig,
    state_path: PathBuf,
    token: Option<String>,
}

impl AppContext {
    fn load(config_store: &ConfigStore) -> Result<Self> {
        if !config_store.exists() {
            anyhow::bail!(
                "No config at {}. Create one with: classforge config init --org <org>",
                config_store.config_path().display()
            );
        }
        let config = config_store.load()?;
        let state_path = config.store_path(&config_store.sibling_state_path());
        let token = std::env::var(TOKEN_ENV).ok();
        Ok(Self {
            config,
            state_path,
            token,
        })
    }

    fn client(&self) -> Result<GitHubClient> {
        let settings = self.config.github_settings(self.token.clone())?;
        GitHubClient::new(settings).context("Failed to build GitHub client")
    }

    fn store(&self) -> FileEntityStore {
        FileEntityStore::new(&self.state_path)
    }

    fn provisioner(&self) -> Result<Provisioner> {
        let transplanter = self
            .config
            .transplanter(self.config.resolve_token(self.token.clone()));
        Ok(Provisioner::new(
            Arc::new(self.client()?),
            Arc::new(self.store()),
            Arc::new(transplanter),
        ))
    }

    fn runner(&self, targets: ProvisionTargets) -> Result<BatchRunner> {
        Ok(BatchRunner::new(self.provisioner()?, targets).with_schedules(
            self.config.create_schedule(),
            self.config.repair_schedule(),
        ))
    }
}

fn finish_batch(outcomes: &[EntityOutcome], format: OutputFormat) -> Result<ExitCode> {
    report::print_outcomes(outcomes, format)?;
    if outcomes.iter().all(EntityOutcome::is_success) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn run_teardown(
    ctx: &AppContext,
    entity: &EntityRef,
    yes: bool,
    format: OutputFormat,
) -> Result<ExitCode> {
    let state = ctx.store().load(entity).await?;
    if state.repo.name.is_empty() {
        println!("{entity} has no repository recorded; nothing to tear down.");
        return Ok(ExitCode::SUCCESS);
    }

    if !yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Delete repository '{}' recorded on {entity}? This cannot be undone",
                state.repo.name
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("{}", style("Teardown cancelled.").yellow());
            return Ok(ExitCode::SUCCESS);
        }
    }

    let deleted = state.repo.name.clone();
    teardown(&ctx.provisioner()?, entity).await?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "entity": entity.to_string(),
                "deleted": deleted,
            }))?
        ),
        OutputFormat::Table => {
            println!("{} Deleted {deleted} ({entity})", style("✓").green());
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_commits(
    ctx: &AppContext,
    command: CommitsSubcommand,
    format: OutputFormat,
) -> Result<ExitCode> {
    let client = ctx.client()?;
    match command {
        CommitsSubcommand::Latest { repo, before } => {
            let deadline: DateTime<Utc> = DateTime::parse_from_rfc3339(&before)
                .with_context(|| format!("Invalid --before timestamp: {before}"))?
                .with_timezone(&Utc);
            let commit = client.latest_commit_before(&repo, deadline).await?;
            report::print_commit(&repo, commit.as_ref(), format)?;
            Ok(if commit.is_some() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        CommitsSubcommand::Comment { repo, sha, body } => {
            let comment = client.post_commit_comment(&repo, &sha, &body).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&comment)?),
                OutputFormat::Table => println!("Comment posted: {}", comment.html_url),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_config(config_store: &ConfigStore, command: ConfigSubcommand) -> Result<ExitCode> {
    match command {
        ConfigSubcommand::Init { org, force } => {
            if config_store.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    config_store.config_path().display()
                );
            }
            let mut config = ClassforgeConfig::new();
            config.github.org = org;
            config.validate()?;
            config_store.save(&config)?;
            println!("Wrote {}", config_store.config_path().display());
            println!("Set github.token there or export {TOKEN_ENV} before provisioning.");
        }
        ConfigSubcommand::Path => println!("{}", config_store.config_path().display()),
    }
    Ok(ExitCode::SUCCESS)
}
