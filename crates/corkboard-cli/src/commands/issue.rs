//! Issue mutation commands
//!
//! Each command opens the adapter, applies one mutation and disposes,
//! which publishes the change before the process exits.

use super::{close, open, CliResult, GlobalArgs};
use clap::{Args, Subcommand};
use corkboard_core::model::{IssueStatus, IssueType, Relation, RelationKind};
use corkboard_core::ops::{IssueUpdate, NewIssue};
use corkboard_engine::BoardBackend;

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Issue title
    pub title: String,

    #[arg(short, long, default_value = "")]
    pub description: String,

    /// 0 (most urgent) to 4
    #[arg(short, long, default_value_t = 2)]
    pub priority: i64,

    /// bug, feature, task, epic or chore
    #[arg(short = 't', long = "type", default_value = "task")]
    pub issue_type: String,

    #[arg(short, long)]
    pub assignee: Option<String>,

    /// Label to attach (repeatable)
    #[arg(short, long = "label")]
    pub labels: Vec<String>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub priority: Option<i64>,

    #[arg(long = "type")]
    pub issue_type: Option<String>,

    #[arg(long, conflicts_with = "unassign")]
    pub assignee: Option<String>,

    /// Clear the assignee
    #[arg(long)]
    pub unassign: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    pub id: String,

    /// open, in_progress, blocked or closed
    pub status: String,
}

#[derive(Debug, Args)]
pub struct LabelArgs {
    #[command(subcommand)]
    pub action: LabelAction,
}

#[derive(Debug, Subcommand)]
pub enum LabelAction {
    Add { id: String, label: String },
    Remove { id: String, label: String },
}

#[derive(Debug, Args)]
pub struct DepArgs {
    #[command(subcommand)]
    pub action: DepAction,
}

#[derive(Debug, Subcommand)]
pub enum DepAction {
    /// Record that ISSUE depends on DEPENDS_ON
    Add(RelationArgs),
    Remove(RelationArgs),
}

#[derive(Debug, Args)]
pub struct RelationArgs {
    pub issue: String,
    pub depends_on: String,

    /// blocks, parent-child, related or discovered-from
    #[arg(long, default_value = "blocks")]
    pub kind: String,
}

impl RelationArgs {
    fn relation(&self) -> Result<Relation, Box<dyn std::error::Error>> {
        Ok(Relation {
            issue_id: self.issue.clone(),
            depends_on_id: self.depends_on.clone(),
            kind: self.kind.parse::<RelationKind>()?,
        })
    }
}

#[derive(Debug, Args)]
pub struct CommentArgs {
    pub id: String,
    pub text: String,

    /// Defaults to the configured actor
    #[arg(long)]
    pub author: Option<String>,
}

fn report(changed: bool, what: &str, id: &str) {
    if changed {
        println!("{} {}", what, id);
    } else {
        println!("No change to {}", id);
    }
}

pub async fn execute_create(global: &GlobalArgs, args: CreateArgs) -> CliResult {
    let mut issue = NewIssue::new(args.title)
        .with_description(args.description)
        .with_priority(args.priority)
        .with_type(args.issue_type.parse::<IssueType>()?);
    if let Some(assignee) = args.assignee {
        issue = issue.with_assignee(assignee);
    }
    for label in args.labels {
        issue = issue.with_label(label);
    }

    let adapter = open(global).await?;
    let created = adapter.create_issue(issue).await;
    close(adapter).await?;

    println!("Created {}", created?);
    Ok(())
}

pub async fn execute_update(global: &GlobalArgs, args: UpdateArgs) -> CliResult {
    let mut update = IssueUpdate::new(&args.id);
    update.title = args.title;
    update.description = args.description;
    update.priority = args.priority;
    update.issue_type = args
        .issue_type
        .as_deref()
        .map(str::parse::<IssueType>)
        .transpose()?;
    if args.unassign {
        update.assignee = Some(None);
    } else if let Some(assignee) = args.assignee {
        update.assignee = Some(Some(assignee));
    }

    let adapter = open(global).await?;
    let changed = adapter.update_issue(update).await;
    close(adapter).await?;

    report(changed?, "Updated", &args.id);
    Ok(())
}

pub async fn execute_status(global: &GlobalArgs, args: StatusArgs) -> CliResult {
    let status = args.status.parse::<IssueStatus>()?;

    let adapter = open(global).await?;
    let changed = adapter.set_status(&args.id, status).await;
    close(adapter).await?;

    report(changed?, &format!("Moved to {}:", status), &args.id);
    Ok(())
}

pub async fn execute_label(global: &GlobalArgs, args: LabelArgs) -> CliResult {
    let adapter = open(global).await?;
    let (result, id) = match &args.action {
        LabelAction::Add { id, label } => (adapter.add_label(id, label).await, id),
        LabelAction::Remove { id, label } => (adapter.remove_label(id, label).await, id),
    };
    close(adapter).await?;

    report(result?, "Labels changed on", id);
    Ok(())
}

pub async fn execute_dep(global: &GlobalArgs, args: DepArgs) -> CliResult {
    let (relation, adding) = match &args.action {
        DepAction::Add(rel) => (rel.relation()?, true),
        DepAction::Remove(rel) => (rel.relation()?, false),
    };

    let adapter = open(global).await?;
    let result = if adding {
        adapter.add_relation(relation.clone()).await
    } else {
        adapter.remove_relation(relation.clone()).await
    };
    close(adapter).await?;

    let verb = if adding { "Added" } else { "Removed" };
    if result? {
        println!(
            "{} {} -> {} ({})",
            verb, relation.issue_id, relation.depends_on_id, relation.kind
        );
    } else {
        println!("No change to {}", relation.issue_id);
    }
    Ok(())
}

pub async fn execute_comment(global: &GlobalArgs, args: CommentArgs) -> CliResult {
    let adapter = open(global).await?;
    let author = args
        .author
        .unwrap_or_else(|| adapter.config().actor.clone());
    let comment = adapter.add_comment(&args.id, &author, &args.text).await;
    close(adapter).await?;

    let comment = comment?;
    println!("Comment {} added to {}", comment.id, comment.issue_id);
    Ok(())
}
