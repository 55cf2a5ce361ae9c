use std::path::Path;

use tracing::instrument;

use crate::cli::{Workspace, prompt_to_proceed, report, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The requirement to delete, by id or hierarchical path
    requirement: String,

    /// Skip confirmation prompts
    #[arg(long, short)]
    yes: bool,
}

impl Command {
    #[instrument]
    pub async fn run(self, root: &Path) -> anyhow::Result<()> {
        let workspace = Workspace::open(root).await?;
        let id = workspace.resolve(&self.requirement).await?;
        let requirement = workspace.service.get(&id).await?;

        let children: Vec<_> = workspace
            .service
            .list(&requirement.project_id)
            .await?
            .into_iter()
            .filter(|r| r.parent_id.as_ref() == Some(&id))
            .collect();
        if !children.is_empty() {
            eprintln!(
                "{}",
                format!(
                    "⚠️  Cannot delete {}: requirement has {} children",
                    requirement.label(),
                    children.len()
                )
                .warning()
            );
            eprintln!("\nChildren:");
            for child in &children {
                eprintln!("  • {} {}", child.label(), child.title);
            }
            eprintln!("\n{}", "Move or delete the children first".dim());
            anyhow::bail!("Cannot delete requirement with children");
        }

        if !self.yes {
            let comments = workspace.service.get_comments(&id).await?.len();
            println!("Will delete {} {}", requirement.label(), requirement.title);
            if comments > 0 {
                println!("  and {comments} comment(s)");
            }
            prompt_to_proceed()?;
        }

        let deleted = workspace.service.delete(&id).await?;
        workspace.save().await?;
        report(&deleted.regeneration);

        println!(
            "{}",
            format!("✅ Deleted {}", requirement.label()).success()
        );
        Ok(())
    }
}
