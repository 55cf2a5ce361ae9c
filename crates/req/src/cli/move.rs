use std::path::Path;

use clap::{ArgGroup, value_parser};
use reqtree_core::MoveRequest;
use tracing::instrument;

use crate::cli::{Workspace, report, terminal::Colorize};

#[derive(Debug, clap::Parser)]
#[command(group(
    ArgGroup::new("destination")
        .required(true)
        .multiple(true)
        .args(["parent", "root", "order"])
))]
pub struct Command {
    /// The requirement to move, by id or hierarchical path
    requirement: String,

    /// The new parent, by id or hierarchical path
    #[arg(long, short, conflicts_with = "root")]
    parent: Option<String>,

    /// Make the requirement a root
    #[arg(long)]
    root: bool,

    /// 1-based position among the new siblings (default: last)
    #[arg(long, short, value_parser = value_parser!(u32).range(1..))]
    order: Option<u32>,
}

impl Command {
    #[instrument]
    pub async fn run(self, root: &Path) -> anyhow::Result<()> {
        let workspace = Workspace::open(root).await?;
        let id = workspace.resolve(&self.requirement).await?;
        let current = workspace.service.get(&id).await?;

        let new_parent_id = if self.root {
            None
        } else if let Some(parent) = &self.parent {
            Some(workspace.resolve(parent).await?)
        } else {
            current.parent_id.clone()
        };

        let new_order = match self.order {
            Some(order) => order,
            None => {
                let siblings = workspace
                    .service
                    .list(&current.project_id)
                    .await?
                    .into_iter()
                    .filter(|r| r.parent_id == new_parent_id && r.id != id)
                    .count();
                u32::try_from(siblings + 1)?
            }
        };

        let moved = workspace
            .service
            .move_requirement(MoveRequest {
                requirement_id: id.clone(),
                new_parent_id,
                new_order,
            })
            .await?;
        report(&moved.regeneration);
        if !moved.value {
            println!("{}", "Already in place".dim());
            return Ok(());
        }
        workspace.save().await?;

        let requirement = workspace.service.get(&id).await?;
        println!(
            "{}",
            format!("✅ Moved {} to {}", current.label(), requirement.label()).success()
        );
        Ok(())
    }
}
