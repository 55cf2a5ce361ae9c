use std::path::Path;

use anyhow::Context;
use reqtree_core::{
    Config, MemoryStore, Project, ProjectId, SectionPrefix, UserId,
    storage::{Batch, PROJECTS, Store, encode},
};
use tracing::instrument;

use crate::cli::{WORKSPACE_DIR, config_path, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The acting user, recorded as the project's creator
    #[arg(long, short)]
    user: String,

    /// Identifier of the project to create
    #[arg(long, short, default_value = "default")]
    project: String,

    /// Display name of the project
    #[arg(long, short)]
    name: Option<String>,

    /// Section prefix for the project's root paths (e.g. SYS)
    #[arg(long)]
    prefix: Option<SectionPrefix>,

    /// Additional users allowed to edit the project's requirements
    #[arg(long = "member", short)]
    members: Vec<String>,
}

impl Command {
    #[instrument]
    pub async fn run(self, root: &Path) -> anyhow::Result<()> {
        let config_path = config_path(root);
        if config_path.exists() {
            anyhow::bail!("Workspace already initialized at {}", root.display());
        }
        let dir = root.join(WORKSPACE_DIR);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let project = Project {
            id: ProjectId::new(self.project.clone()),
            name: self.name.unwrap_or_else(|| self.project.clone()),
            section_prefix: self.prefix,
            created_by: UserId::new(self.user),
            members: self.members.into_iter().map(UserId::new).collect(),
        };

        let mut config = Config::default();
        config.project = Some(project.id.clone());
        config.user = Some(project.created_by.clone());
        config.save(&config_path)?;

        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.set(PROJECTS, project.id.as_str(), encode(&project)?);
        store.commit(batch).await?;
        store.save(&dir.join(config.store_file())).await?;

        println!(
            "{}",
            format!(
                "✅ Initialized project '{}' as {}",
                project.id, project.created_by
            )
            .success()
        );
        Ok(())
    }
}
