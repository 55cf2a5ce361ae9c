use std::path::Path;

use tracing::instrument;

use crate::cli::{Workspace, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {}

impl Command {
    #[instrument]
    pub async fn run(self, root: &Path) -> anyhow::Result<()> {
        let workspace = Workspace::open(root).await?;
        let project = workspace.project()?;

        let updated = workspace.service.regenerate(&project).await?;
        if updated == 0 {
            println!("{}", "All hierarchical paths are up to date".dim());
            return Ok(());
        }
        workspace.save().await?;
        println!(
            "{}",
            format!("✅ Regenerated {updated} requirement(s)").success()
        );
        Ok(())
    }
}
