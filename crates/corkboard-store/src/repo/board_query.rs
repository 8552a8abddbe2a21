//! Read-model assembly
//!
//! Builds the `Board` in a fixed number of queries regardless of size:
//! issues, labels, relations (joined with the target's status) and comment
//! counts are each loaded once and stitched together in memory.

use crate::errors::{from_rusqlite, issue_not_found, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use corkboard_core::model::{
    Board, BoardColumn, Card, Comment, Issue, IssueDetail, IssueEvent, IssueStatus, IssueType,
    RelationKind,
};
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::HashMap;

const ISSUE_COLUMNS: &str =
    "id, title, description, status, priority, issue_type, assignee, created_at, updated_at, closed_at";

/// Most recent audit events returned with an issue
const DETAIL_EVENT_LIMIT: i64 = 50;

pub struct BoardQuery;

impl BoardQuery {
    /// Assemble the whole board
    pub fn board(conn: &Connection) -> Result<Board> {
        let issues = load_issues(conn)?;
        let mut labels = load_labels(conn)?;
        let mut comment_counts = load_comment_counts(conn)?;

        let mut blocked_by: HashMap<String, Vec<String>> = HashMap::new();
        let mut blocks: HashMap<String, Vec<String>> = HashMap::new();
        let mut parent: HashMap<String, String> = HashMap::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();

        for edge in load_relation_edges(conn)? {
            match edge.kind {
                RelationKind::Blocks => {
                    if edge.target_status != IssueStatus::Closed {
                        blocked_by
                            .entry(edge.issue_id.clone())
                            .or_default()
                            .push(edge.depends_on_id.clone());
                    }
                    blocks
                        .entry(edge.depends_on_id)
                        .or_default()
                        .push(edge.issue_id);
                }
                RelationKind::ParentChild => {
                    parent.insert(edge.issue_id.clone(), edge.depends_on_id.clone());
                    children
                        .entry(edge.depends_on_id)
                        .or_default()
                        .push(edge.issue_id);
                }
                RelationKind::Related | RelationKind::DiscoveredFrom => {}
            }
        }

        let mut columns: Vec<BoardColumn> = IssueStatus::ALL
            .iter()
            .map(|status| BoardColumn {
                status: *status,
                cards: Vec::new(),
            })
            .collect();

        for issue in issues {
            let id = issue.id.clone();
            let blocked = blocked_by.remove(&id).unwrap_or_default();
            let card = Card {
                is_ready: issue.status == IssueStatus::Open && blocked.is_empty(),
                labels: labels.remove(&id).unwrap_or_default(),
                blocked_by: blocked,
                blocks: blocks.remove(&id).unwrap_or_default(),
                parent: parent.remove(&id),
                children: children.remove(&id).unwrap_or_default(),
                comment_count: comment_counts.remove(&id).unwrap_or(0),
                issue,
            };
            if let Some(column) = columns.iter_mut().find(|c| c.status == card.issue.status) {
                column.cards.push(card);
            }
        }

        Ok(Board {
            columns,
            computed_at: Utc::now(),
        })
    }

    /// Assemble one issue with comments and recent audit events
    pub fn issue_detail(conn: &Connection, issue_id: &str, has_events: bool) -> Result<IssueDetail> {
        let board = Self::board(conn)?;
        let card = board
            .card(issue_id)
            .cloned()
            .ok_or_else(|| issue_not_found(issue_id))?;

        let comments = load_comments(conn, issue_id)?;
        let events = if has_events {
            load_events(conn, issue_id)?
        } else {
            Vec::new()
        };

        Ok(IssueDetail {
            card,
            comments,
            events,
        })
    }
}

/// Load one issue row
pub(crate) fn load_issue(conn: &Connection, issue_id: &str) -> Result<Option<Issue>> {
    conn.query_row(
        &format!("SELECT {} FROM issues WHERE id = ?1", ISSUE_COLUMNS),
        [issue_id],
        row_to_issue,
    )
    .optional()
    .map_err(from_rusqlite)
}

/// Timestamp format written by this crate
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Parse a stored timestamp, accepting RFC 3339 and SQLite's `DATETIME` text
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
        .unwrap_or_default()
}

fn row_to_issue(row: &Row<'_>) -> rusqlite::Result<Issue> {
    let status: String = row.get(3)?;
    let issue_type: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    let closed_at: Option<String> = row.get(9)?;

    // Rows written by other tools may carry values this build does not know
    Ok(Issue {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        status: status.parse().unwrap_or(IssueStatus::Open),
        priority: row.get(4)?,
        issue_type: issue_type.parse().unwrap_or(IssueType::Task),
        assignee: row.get(6)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
        closed_at: closed_at.as_deref().map(parse_timestamp),
    })
}

fn load_issues(conn: &Connection) -> Result<Vec<Issue>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM issues ORDER BY priority ASC, created_at ASC, id ASC",
            ISSUE_COLUMNS
        ))
        .map_err(from_rusqlite)?;
    let issues = stmt
        .query_map([], row_to_issue)
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(issues)
}

fn load_labels(conn: &Connection) -> Result<HashMap<String, Vec<String>>> {
    let mut stmt = conn
        .prepare("SELECT issue_id, label FROM labels ORDER BY issue_id, label")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(from_rusqlite)?;

    let mut labels: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        let (issue_id, label) = row.map_err(from_rusqlite)?;
        labels.entry(issue_id).or_default().push(label);
    }
    Ok(labels)
}

fn load_comment_counts(conn: &Connection) -> Result<HashMap<String, usize>> {
    let mut stmt = conn
        .prepare("SELECT issue_id, COUNT(*) FROM comments GROUP BY issue_id")
        .map_err(from_rusqlite)?;
    let counts = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<HashMap<_, _>, _>>()
        .map_err(from_rusqlite)?;
    Ok(counts)
}

struct RelationEdge {
    issue_id: String,
    depends_on_id: String,
    kind: RelationKind,
    target_status: IssueStatus,
}

fn load_relation_edges(conn: &Connection) -> Result<Vec<RelationEdge>> {
    let mut stmt = conn
        .prepare(
            "SELECT d.issue_id, d.depends_on_id, d.type, t.status
             FROM dependencies d
             JOIN issues t ON t.id = d.depends_on_id
             ORDER BY d.issue_id, d.depends_on_id",
        )
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(from_rusqlite)?;

    let mut edges = Vec::new();
    for row in rows {
        let (issue_id, depends_on_id, kind, target_status) = row.map_err(from_rusqlite)?;
        // Unknown relation kinds are skipped rather than failing the board
        let Ok(kind) = kind.parse::<RelationKind>() else {
            continue;
        };
        edges.push(RelationEdge {
            issue_id,
            depends_on_id,
            kind,
            target_status: target_status.parse().unwrap_or(IssueStatus::Open),
        });
    }
    Ok(edges)
}

fn load_comments(conn: &Connection, issue_id: &str) -> Result<Vec<Comment>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, issue_id, author, text, created_at FROM comments
             WHERE issue_id = ?1 ORDER BY id",
        )
        .map_err(from_rusqlite)?;
    let comments = stmt
        .query_map([issue_id], |row| {
            let created_at: String = row.get(4)?;
            Ok(Comment {
                id: row.get(0)?,
                issue_id: row.get(1)?,
                author: row.get(2)?,
                text: row.get(3)?,
                created_at: parse_timestamp(&created_at),
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(comments)
}

fn load_events(conn: &Connection, issue_id: &str) -> Result<Vec<IssueEvent>> {
    let mut stmt = conn
        .prepare(
            "SELECT issue_id, event_type, actor, old_value, new_value, created_at FROM events
             WHERE issue_id = ?1 ORDER BY id DESC LIMIT ?2",
        )
        .map_err(from_rusqlite)?;
    let events = stmt
        .query_map(rusqlite::params![issue_id, DETAIL_EVENT_LIMIT], |row| {
            let created_at: String = row.get(5)?;
            Ok(IssueEvent {
                issue_id: row.get(0)?,
                event_type: row.get(1)?,
                actor: row.get(2)?,
                old_value: row.get(3)?,
                new_value: row.get(4)?,
                created_at: parse_timestamp(&created_at),
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(events)
}
