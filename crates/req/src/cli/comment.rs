use std::path::Path;

use reqtree_core::{Comment, CommentDraft, CommentId};
use tracing::instrument;

use crate::cli::{Workspace, terminal::Colorize};

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Start a new discussion thread on a requirement
    Add {
        /// The requirement, by id or hierarchical path
        requirement: String,

        /// The comment text
        body: String,
    },

    /// Reply to an existing comment
    Reply {
        /// The requirement, by id or hierarchical path
        requirement: String,

        /// The comment being replied to
        comment: String,

        /// The reply text
        body: String,
    },

    /// Mark a comment as resolved
    Resolve {
        /// The requirement, by id or hierarchical path
        requirement: String,

        /// The comment to resolve
        comment: String,

        /// Mark the comment as unresolved instead
        #[arg(long)]
        reopen: bool,
    },

    /// Show the comments on a requirement, threaded
    List {
        /// The requirement, by id or hierarchical path
        requirement: String,

        /// Hide resolved comments
        #[arg(long)]
        open: bool,
    },
}

impl Command {
    #[instrument]
    pub async fn run(self, root: &Path) -> anyhow::Result<()> {
        let workspace = Workspace::open(root).await?;

        match self {
            Self::Add { requirement, body } => {
                let id = workspace.resolve(&requirement).await?;
                let comment = workspace
                    .service
                    .add_comment(&id, CommentDraft::new(body))
                    .await?;
                workspace.save().await?;
                println!("{}", format!("✅ Added comment {comment}").success());
            }
            Self::Reply {
                requirement,
                comment,
                body,
            } => {
                let id = workspace.resolve(&requirement).await?;
                let reply = workspace
                    .service
                    .reply_to_comment(&id, &CommentId::new(comment), CommentDraft::new(body))
                    .await?;
                workspace.save().await?;
                println!("{}", format!("✅ Added reply {reply}").success());
            }
            Self::Resolve {
                requirement,
                comment,
                reopen,
            } => {
                let id = workspace.resolve(&requirement).await?;
                workspace
                    .service
                    .resolve_comment(&id, &CommentId::new(comment.clone()), !reopen)
                    .await?;
                workspace.save().await?;
                let verb = if reopen { "Reopened" } else { "Resolved" };
                println!("{}", format!("✅ {verb} comment {comment}").success());
            }
            Self::List { requirement, open } => {
                let id = workspace.resolve(&requirement).await?;
                print_threads(&workspace.service.get_comments(&id).await?, open);
            }
        }
        Ok(())
    }
}

fn print_threads(comments: &[Comment], open_only: bool) {
    let visible: Vec<&Comment> = comments
        .iter()
        .filter(|c| !open_only || !c.resolved)
        .collect();
    if visible.is_empty() {
        println!("{}", "No comments".dim());
        return;
    }

    // Replies whose parent is hidden or missing are shown as threads of their own.
    let is_thread_start = |comment: &&Comment| {
        comment
            .parent_comment_id
            .as_ref()
            .is_none_or(|parent| !visible.iter().any(|c| c.id == *parent))
    };
    for thread in visible.iter().filter(|c| is_thread_start(*c)) {
        print_comment(thread, 0);
        print_replies(&visible, &thread.id, 1);
    }
}

fn print_replies(visible: &[&Comment], parent: &CommentId, depth: usize) {
    for reply in visible
        .iter()
        .filter(|c| c.parent_comment_id.as_ref() == Some(parent))
    {
        print_comment(reply, depth);
        print_replies(visible, &reply.id, depth + 1);
    }
}

fn print_comment(comment: &Comment, depth: usize) {
    let indent = "  ".repeat(depth);
    let marker = if comment.resolved {
        "✓".success()
    } else {
        "•".to_string()
    };
    println!(
        "{indent}{marker} {} {}",
        comment.author_id.as_str().info(),
        format!("{} ({})", comment.created_at.format("%Y-%m-%d %H:%M"), comment.id).dim()
    );
    for line in comment.body.lines() {
        println!("{indent}  {line}");
    }
}
