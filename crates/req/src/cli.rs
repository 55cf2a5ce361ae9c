use std::path::{Path, PathBuf};

mod comment;
mod config;
mod create;
mod delete;
mod init;
mod list;
mod r#move;
mod regenerate;
mod show;
mod terminal;
mod update;

use anyhow::Context;
use clap::ArgAction;
use reqtree_core::{
    Config, HierarchicalPath, MemoryStore, ProjectId, Regeneration, RequirementId,
    RequirementService, StaticIdentity, StoredProjects,
};
use terminal::Colorize;

/// Directory holding the configuration and the document snapshot.
const WORKSPACE_DIR: &str = ".req";

type Service = RequirementService<MemoryStore, StoredProjects<MemoryStore>, StaticIdentity>;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the root of the requirements workspace
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command.run(&self.root).await
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Initialize a new requirements workspace with one project
    Init(init::Command),

    /// Create a new requirement
    Create(create::Command),

    /// Edit the content of a requirement
    Update(update::Command),

    /// Re-parent or re-order a requirement
    Move(r#move::Command),

    /// Delete a leaf requirement and its comments
    Delete(delete::Command),

    /// List the project's requirements as a tree
    List(list::Command),

    /// Show detailed information about a requirement
    Show(show::Command),

    /// Recompute hierarchical paths for the whole project
    ///
    /// Use this to repair paths left stale by a failed regeneration.
    Regenerate(regenerate::Command),

    /// Discuss a requirement
    #[command(subcommand)]
    Comment(comment::Command),

    /// Show or modify configuration settings
    Config(config::Command),
}

impl Command {
    async fn run(self, root: &Path) -> anyhow::Result<()> {
        match self {
            Self::Init(command) => command.run(root).await?,
            Self::Create(command) => command.run(root).await?,
            Self::Update(command) => command.run(root).await?,
            Self::Move(command) => command.run(root).await?,
            Self::Delete(command) => command.run(root).await?,
            Self::List(command) => command.run(root).await?,
            Self::Show(command) => command.run(root).await?,
            Self::Regenerate(command) => command.run(root).await?,
            Self::Comment(command) => command.run(root).await?,
            Self::Config(command) => command.run(root)?,
        }
        Ok(())
    }
}

fn config_path(root: &Path) -> PathBuf {
    root.join(WORKSPACE_DIR).join("config.toml")
}

/// An opened workspace: configuration, loaded documents and a service acting
/// as the configured user.
struct Workspace {
    store_path: PathBuf,
    config: Config,
    service: Service,
}

impl Workspace {
    async fn open(root: &Path) -> anyhow::Result<Self> {
        let config_path = config_path(root);
        if !config_path.exists() {
            anyhow::bail!(
                "No requirements workspace at {} (run `req init` first)",
                root.display()
            );
        }
        let config = Config::load(&config_path)?;

        let store_path = root.join(WORKSPACE_DIR).join(config.store_file());
        let store = if store_path.exists() {
            MemoryStore::load(&store_path)
                .await
                .with_context(|| format!("Failed to load {}", store_path.display()))?
        } else {
            MemoryStore::new()
        };

        let identity = config
            .user
            .clone()
            .map_or_else(StaticIdentity::anonymous, StaticIdentity::user);
        let service = RequirementService::new(
            store.clone(),
            StoredProjects::new(store),
            identity,
            config.default_prefix().clone(),
        );

        Ok(Self {
            store_path,
            config,
            service,
        })
    }

    fn project(&self) -> anyhow::Result<ProjectId> {
        self.config
            .project
            .clone()
            .context("No active project (set one with `req config set project <id>`)")
    }

    /// Resolves a requirement given by id or by hierarchical path.
    async fn resolve(&self, reference: &str) -> anyhow::Result<RequirementId> {
        if let Ok(path) = reference.parse::<HierarchicalPath>() {
            let project = self.project()?;
            if let Some(found) = self
                .service
                .list(&project)
                .await?
                .into_iter()
                .find(|r| r.hierarchical_path.as_ref() == Some(&path))
            {
                return Ok(found.id);
            }
        }

        let id = RequirementId::new(reference);
        self.service
            .get(&id)
            .await
            .with_context(|| format!("No requirement with id or path '{reference}'"))?;
        Ok(id)
    }

    async fn save(&self) -> anyhow::Result<()> {
        self.service
            .store()
            .save(&self.store_path)
            .await
            .with_context(|| format!("Failed to write {}", self.store_path.display()))
    }
}

/// Warns when the primary write succeeded but derived paths are stale.
fn report(regeneration: &Regeneration) {
    if let Regeneration::Failed(error) = regeneration {
        eprintln!("{}", format!("⚠️  {error}").warning());
        eprintln!("{}", "Run `req regenerate` to repair hierarchical paths.".dim());
    }
}

fn prompt_to_proceed() -> anyhow::Result<()> {
    let proceed = dialoguer::Confirm::new()
        .with_prompt("Proceed?")
        .default(false)
        .interact()?;
    if !proceed {
        println!("Cancelled");
        std::process::exit(130);
    }
    Ok(())
}
