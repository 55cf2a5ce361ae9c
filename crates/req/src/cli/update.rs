use std::path::Path;

use reqtree_core::{RequirementUpdate, SectionPrefix};
use tracing::instrument;

use crate::cli::{Workspace, report, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The requirement to edit, by id or hierarchical path
    requirement: String,

    /// New title
    #[arg(long, short)]
    title: Option<String>,

    /// New body text
    #[arg(long, short)]
    description: Option<String>,

    /// New workflow status
    #[arg(long, short)]
    status: Option<String>,

    /// Replace the tags (comma-separated; pass an empty value to clear)
    #[arg(long, value_delimiter = ',')]
    tags: Option<Vec<String>>,

    /// Section prefix for this root's path
    #[arg(long, conflicts_with = "clear_prefix")]
    prefix: Option<SectionPrefix>,

    /// Remove the section prefix override
    #[arg(long)]
    clear_prefix: bool,
}

impl Command {
    #[instrument]
    pub async fn run(self, root: &Path) -> anyhow::Result<()> {
        let workspace = Workspace::open(root).await?;
        let id = workspace.resolve(&self.requirement).await?;

        let section_prefix = if self.clear_prefix {
            Some(None)
        } else {
            self.prefix.map(Some)
        };
        let update = RequirementUpdate {
            title: self.title,
            description: self.description,
            status: self.status,
            tags: self
                .tags
                .map(|tags| tags.into_iter().filter(|t| !t.is_empty()).collect()),
            section_prefix,
        };
        if update.is_empty() {
            anyhow::bail!("Nothing to update (pass at least one field)");
        }

        let updated = workspace.service.update(&id, update).await?;
        report(&updated.regeneration);
        if !updated.value {
            println!("{}", "No changes".dim());
            return Ok(());
        }
        workspace.save().await?;

        let requirement = workspace.service.get(&id).await?;
        println!(
            "{}",
            format!("✅ Updated requirement {}", requirement.label()).success()
        );
        Ok(())
    }
}
