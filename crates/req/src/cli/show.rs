use std::path::Path;

use reqtree_core::{ChangeKind, ChangeLogEntry, Requirement};
use tracing::instrument;

use crate::cli::{Workspace, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The requirement to show, by id or hierarchical path
    requirement: String,

    /// Include the change history
    #[arg(long)]
    history: bool,

    /// Print the stored document as JSON
    #[arg(long)]
    json: bool,
}

impl Command {
    #[instrument]
    pub async fn run(self, root: &Path) -> anyhow::Result<()> {
        let workspace = Workspace::open(root).await?;
        let id = workspace.resolve(&self.requirement).await?;
        let requirement = workspace.service.get(&id).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&requirement)?);
            return Ok(());
        }

        print_requirement(&requirement);

        let comments = workspace.service.get_comments(&id).await?;
        let open = comments.iter().filter(|c| !c.resolved).count();
        println!("\n{}", "Comments".dim());
        println!("  {} ({open} open)", comments.len());

        if self.history {
            println!("\n{}", "History".dim());
            for entry in &requirement.change_log {
                print_entry(entry);
            }
        }
        Ok(())
    }
}

fn print_requirement(requirement: &Requirement) {
    println!("{} {}", requirement.label().info(), requirement.title);
    if !requirement.description.is_empty() {
        println!("\n{}", requirement.description);
    }

    println!("\n{}", "Metadata".dim());
    println!("  id:       {}", requirement.id);
    println!("  status:   {}", requirement.status);
    println!(
        "  parent:   {}",
        requirement
            .parent_id
            .as_ref()
            .map_or_else(|| "(root)".to_string(), ToString::to_string)
    );
    println!("  order:    {}", requirement.order);
    if !requirement.tags.is_empty() {
        println!("  tags:     {}", requirement.tags.join(", "));
    }
    if let Some(prefix) = &requirement.section_prefix {
        println!("  prefix:   {}", prefix.as_str());
    }
    println!("  created:  {} by {}", requirement.created_at, requirement.created_by);
    println!("  updated:  {}", requirement.updated_at);
}

fn print_entry(entry: &ChangeLogEntry) {
    let kind = match entry.kind {
        ChangeKind::Created => "created",
        ChangeKind::Updated => "updated",
        ChangeKind::Moved => "moved",
    };
    println!(
        "  {} {kind} by {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dim(),
        entry.user_id
    );
    if let Some(fields) = entry.changes.fields() {
        for (field, change) in fields {
            println!("    {field}: {} → {}", change.old, change.new);
        }
    }
}
