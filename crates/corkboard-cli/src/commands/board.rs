//! Board and issue display commands

use super::{close, open, CliResult, GlobalArgs};
use clap::Args;
use corkboard_core::model::{Board, Card, IssueDetail};

#[derive(Debug, Args)]
pub struct BoardArgs {
    /// Print the board as JSON
    #[arg(long)]
    pub json: bool,

    /// Only show issues that are ready to work on
    #[arg(long)]
    pub ready: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Issue id
    pub id: String,

    /// Print the issue as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute_board(global: &GlobalArgs, args: BoardArgs) -> CliResult {
    let adapter = open(global).await?;
    let board = adapter.get_board().await;
    close(adapter).await?;
    let board = board?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(board.as_ref())?);
    } else {
        print!("{}", render_board(&board, args.ready));
    }
    Ok(())
}

pub async fn execute_show(global: &GlobalArgs, args: ShowArgs) -> CliResult {
    let adapter = open(global).await?;
    let detail = adapter.get_issue(&args.id).await;
    close(adapter).await?;
    let detail = detail?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        print!("{}", render_detail(&detail));
    }
    Ok(())
}

fn render_card(card: &Card) -> String {
    let mut line = format!(
        "  {}  [P{}] {:<7} {}",
        card.id(),
        card.issue.priority,
        card.issue.issue_type.as_str(),
        card.issue.title
    );
    if let Some(assignee) = &card.issue.assignee {
        line.push_str(&format!("  @{}", assignee));
    }
    if !card.labels.is_empty() {
        line.push_str(&format!("  #{}", card.labels.join(" #")));
    }
    if !card.blocked_by.is_empty() {
        line.push_str(&format!("  (blocked by {})", card.blocked_by.join(", ")));
    }
    line.push('\n');
    line
}

pub fn render_board(board: &Board, ready_only: bool) -> String {
    let mut out = String::new();
    for column in &board.columns {
        let cards: Vec<&Card> = column
            .cards
            .iter()
            .filter(|c| !ready_only || c.is_ready)
            .collect();
        if ready_only && cards.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "{} ({})\n",
            column.status.as_str().to_uppercase(),
            cards.len()
        ));
        for card in cards {
            out.push_str(&render_card(card));
        }
    }
    out
}

fn render_detail(detail: &IssueDetail) -> String {
    let card = &detail.card;
    let issue = &card.issue;
    let mut out = format!(
        "{}: {}\nstatus: {}  priority: P{}  type: {}\n",
        issue.id, issue.title, issue.status, issue.priority, issue.issue_type
    );
    if let Some(assignee) = &issue.assignee {
        out.push_str(&format!("assignee: {}\n", assignee));
    }
    if !card.labels.is_empty() {
        out.push_str(&format!("labels: {}\n", card.labels.join(", ")));
    }
    if let Some(parent) = &card.parent {
        out.push_str(&format!("parent: {}\n", parent));
    }
    if !card.blocked_by.is_empty() {
        out.push_str(&format!("blocked by: {}\n", card.blocked_by.join(", ")));
    }
    if !card.blocks.is_empty() {
        out.push_str(&format!("blocks: {}\n", card.blocks.join(", ")));
    }
    if !issue.description.is_empty() {
        out.push_str(&format!("\n{}\n", issue.description));
    }
    if !detail.comments.is_empty() {
        out.push_str("\ncomments:\n");
        for comment in &detail.comments {
            out.push_str(&format!(
                "  [{}] {}: {}\n",
                comment.created_at.format("%Y-%m-%d %H:%M"),
                comment.author,
                comment.text
            ));
        }
    }
    if !detail.events.is_empty() {
        out.push_str("\nhistory:\n");
        for event in &detail.events {
            out.push_str(&format!(
                "  [{}] {} by {}\n",
                event.created_at.format("%Y-%m-%d %H:%M"),
                event.event_type,
                event.actor
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use corkboard_core::model::{BoardColumn, Issue, IssueStatus, IssueType};

    fn card(id: &str, is_ready: bool) -> Card {
        let now = Utc::now();
        Card {
            issue: Issue {
                id: id.to_string(),
                title: format!("Title of {}", id),
                description: String::new(),
                status: IssueStatus::Open,
                priority: 1,
                issue_type: IssueType::Bug,
                assignee: Some("ana".to_string()),
                created_at: now,
                updated_at: now,
                closed_at: None,
            },
            labels: vec!["ui".to_string()],
            blocked_by: Vec::new(),
            blocks: Vec::new(),
            parent: None,
            children: Vec::new(),
            comment_count: 0,
            is_ready,
        }
    }

    fn board() -> Board {
        Board {
            columns: vec![
                BoardColumn {
                    status: IssueStatus::Open,
                    cards: vec![card("bd-aaaaaa", true), card("bd-bbbbbb", false)],
                },
                BoardColumn {
                    status: IssueStatus::Closed,
                    cards: Vec::new(),
                },
            ],
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_board_lists_columns() {
        let out = render_board(&board(), false);
        assert!(out.contains("OPEN (2)"));
        assert!(out.contains("CLOSED (0)"));
        assert!(out.contains("bd-aaaaaa  [P1] bug"));
        assert!(out.contains("@ana"));
        assert!(out.contains("#ui"));
    }

    #[test]
    fn test_render_ready_only() {
        let out = render_board(&board(), true);
        assert!(out.contains("OPEN (1)"));
        assert!(!out.contains("bd-bbbbbb"));
        assert!(!out.contains("CLOSED"));
    }
}
