use std::path::Path;

use reqtree_core::Requirement;
use tracing::instrument;

use crate::cli::{Workspace, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// Only show requirements with this status
    #[arg(long, short)]
    status: Option<String>,

    /// Only show requirements carrying this tag
    #[arg(long, short)]
    tag: Option<String>,

    /// Print the stored documents as JSON
    #[arg(long)]
    json: bool,
}

impl Command {
    #[instrument]
    pub async fn run(self, root: &Path) -> anyhow::Result<()> {
        let workspace = Workspace::open(root).await?;
        let project = workspace.project()?;

        let requirements: Vec<Requirement> = workspace
            .service
            .list(&project)
            .await?
            .into_iter()
            .filter(|r| self.status.as_ref().is_none_or(|s| r.status == *s))
            .filter(|r| self.tag.as_ref().is_none_or(|t| r.tags.contains(t)))
            .collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&requirements)?);
            return Ok(());
        }

        if requirements.is_empty() {
            println!("{}", "No requirements".dim());
            return Ok(());
        }

        for requirement in &requirements {
            let indent = "  ".repeat(usize::try_from(requirement.level)?);
            let mut line = format!("{indent}{} {}", requirement.label().info(), requirement.title);
            if requirement.status != reqtree_core::domain::DEFAULT_STATUS {
                line.push_str(&format!(" [{}]", requirement.status).dim());
            }
            if !requirement.tags.is_empty() {
                line.push_str(&format!(" #{}", requirement.tags.join(" #")).dim());
            }
            println!("{line}");
        }
        Ok(())
    }
}
