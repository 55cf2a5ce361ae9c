use std::path::Path;

use reqtree_core::{RequirementDraft, SectionPrefix};
use tracing::instrument;

use crate::cli::{Workspace, report, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The title of the requirement
    title: String,

    /// The parent requirement, by id or hierarchical path (e.g. REQ_1.2)
    ///
    /// Without a parent the requirement becomes a new root.
    #[arg(long, short)]
    parent: Option<String>,

    /// The body text of the requirement
    #[arg(long, short)]
    description: Option<String>,

    /// Workflow status (default: draft)
    #[arg(long, short)]
    status: Option<String>,

    /// Tags to attach (repeatable, or comma-separated)
    #[arg(long = "tag", short, value_delimiter = ',')]
    tags: Vec<String>,

    /// Section prefix for this root's path, overriding the project's
    #[arg(long)]
    prefix: Option<SectionPrefix>,
}

impl Command {
    #[instrument]
    pub async fn run(self, root: &Path) -> anyhow::Result<()> {
        let workspace = Workspace::open(root).await?;
        let project = workspace.project()?;

        let mut draft = RequirementDraft::new(project, self.title).with_tags(self.tags);
        if let Some(parent) = &self.parent {
            draft = draft.with_parent(workspace.resolve(parent).await?);
        }
        if let Some(description) = self.description {
            draft = draft.with_description(description);
        }
        draft.status = self.status;
        draft.section_prefix = self.prefix;

        let created = workspace.service.create(draft).await?;
        workspace.save().await?;
        report(&created.regeneration);

        let requirement = workspace.service.get(&created.value).await?;
        println!(
            "{}",
            format!("✅ Added requirement {}", requirement.label()).success()
        );
        println!("{}", format!("id: {}", requirement.id).dim());
        Ok(())
    }
}
