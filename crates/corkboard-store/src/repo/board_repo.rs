//! Mutation execution
//!
//! Each mutation runs in one transaction: validation, existence checks,
//! the write itself and its audit event commit together or not at all.

use crate::errors::{from_rusqlite, issue_not_found, Result};
use crate::repo::board_query::{load_issue, now_timestamp};
use corkboard_core::errors::{BoardError, ErrorKind, ValidationError};
use corkboard_core::model::{Comment, IssueStatus, Relation, RelationKind};
use corkboard_core::ops::{IssueUpdate, Mutation, MutationOutcome, NewIssue};
use corkboard_core::rules::validate_mutation;
use rusqlite::{params, Connection};
use std::collections::BTreeSet;
use uuid::Uuid;

const ID_ALLOCATION_ATTEMPTS: usize = 8;
const ID_SUFFIX_LEN: usize = 6;

/// Who is writing and how new ids are formed
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext<'a> {
    pub actor: &'a str,
    pub prefix: &'a str,
    /// Whether the store has an `events` table to append to
    pub record_events: bool,
}

/// SQLite repository for board mutations
pub struct BoardRepo;

impl BoardRepo {
    /// Validate and execute a mutation in a single transaction
    ///
    /// # Errors
    /// `Validation` for bad input, `NotFound` for unknown issues, `Store`
    /// if the engine rejects a statement.
    pub fn apply(
        conn: &mut Connection,
        mutation: &Mutation,
        ctx: &ApplyContext<'_>,
    ) -> Result<MutationOutcome> {
        validate_mutation(mutation)?;

        let tx = conn.transaction().map_err(from_rusqlite)?;
        let outcome = match mutation {
            Mutation::Create(new_issue) => create_issue(&tx, new_issue, ctx)?,
            Mutation::Update(update) => update_issue(&tx, update, ctx)?,
            Mutation::SetStatus { issue_id, status } => set_status(&tx, issue_id, *status, ctx)?,
            Mutation::AddRelation(rel) => add_relation(&tx, rel, ctx)?,
            Mutation::RemoveRelation(rel) => remove_relation(&tx, rel, ctx)?,
            Mutation::AddLabel { issue_id, label } => add_label(&tx, issue_id, label, ctx)?,
            Mutation::RemoveLabel { issue_id, label } => remove_label(&tx, issue_id, label, ctx)?,
            Mutation::AddComment {
                issue_id,
                author,
                text,
            } => add_comment(&tx, issue_id, author, text, ctx)?,
        };
        tx.commit().map_err(from_rusqlite)?;

        Ok(outcome)
    }
}

fn create_issue(
    conn: &Connection,
    new_issue: &NewIssue,
    ctx: &ApplyContext<'_>,
) -> Result<MutationOutcome> {
    let id = allocate_issue_id(conn, ctx.prefix)?;
    let now = now_timestamp();
    let closed_at = (new_issue.status == IssueStatus::Closed).then(|| now.clone());

    conn.execute(
        "INSERT INTO issues (id, title, description, status, priority, issue_type, assignee, created_at, updated_at, closed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9)",
        params![
            id,
            new_issue.title.trim(),
            new_issue.description,
            new_issue.status.as_str(),
            new_issue.priority,
            new_issue.issue_type.as_str(),
            new_issue.assignee,
            now,
            closed_at,
        ],
    )
    .map_err(from_rusqlite)?;

    let labels: BTreeSet<&str> = new_issue.labels.iter().map(String::as_str).collect();
    for label in labels {
        conn.execute(
            "INSERT OR IGNORE INTO labels (issue_id, label) VALUES (?1, ?2)",
            params![id, label],
        )
        .map_err(from_rusqlite)?;
    }

    record_event(conn, ctx, &id, "created", None, Some(new_issue.title.trim()))?;

    Ok(MutationOutcome::Created { issue_id: id })
}

fn update_issue(
    conn: &Connection,
    update: &IssueUpdate,
    ctx: &ApplyContext<'_>,
) -> Result<MutationOutcome> {
    let current = load_issue(conn, &update.issue_id)?
        .ok_or_else(|| issue_not_found(&update.issue_id))?;

    let mut next = current.clone();
    if let Some(title) = &update.title {
        next.title = title.trim().to_string();
    }
    if let Some(description) = &update.description {
        next.description = description.clone();
    }
    if let Some(priority) = update.priority {
        next.priority = priority;
    }
    if let Some(issue_type) = update.issue_type {
        next.issue_type = issue_type;
    }
    if let Some(assignee) = &update.assignee {
        next.assignee = assignee.clone();
    }

    let mut old_fields = serde_json::Map::new();
    let mut new_fields = serde_json::Map::new();
    let mut diff = |field: &str, old: serde_json::Value, new: serde_json::Value| {
        if old != new {
            old_fields.insert(field.to_string(), old);
            new_fields.insert(field.to_string(), new);
        }
    };
    diff("title", current.title.into(), next.title.clone().into());
    diff(
        "description",
        current.description.into(),
        next.description.clone().into(),
    );
    diff("priority", current.priority.into(), next.priority.into());
    diff(
        "issue_type",
        current.issue_type.as_str().into(),
        next.issue_type.as_str().into(),
    );
    diff(
        "assignee",
        current.assignee.into(),
        next.assignee.clone().into(),
    );

    if new_fields.is_empty() {
        return Ok(MutationOutcome::Applied {
            issue_id: update.issue_id.clone(),
            changed: false,
        });
    }

    conn.execute(
        "UPDATE issues SET title = ?1, description = ?2, priority = ?3, issue_type = ?4, assignee = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            next.title,
            next.description,
            next.priority,
            next.issue_type.as_str(),
            next.assignee,
            now_timestamp(),
            update.issue_id,
        ],
    )
    .map_err(from_rusqlite)?;

    let old_json = serde_json::Value::Object(old_fields).to_string();
    let new_json = serde_json::Value::Object(new_fields).to_string();
    record_event(
        conn,
        ctx,
        &update.issue_id,
        "updated",
        Some(old_json.as_str()),
        Some(new_json.as_str()),
    )?;

    Ok(MutationOutcome::Applied {
        issue_id: update.issue_id.clone(),
        changed: true,
    })
}

fn set_status(
    conn: &Connection,
    issue_id: &str,
    status: IssueStatus,
    ctx: &ApplyContext<'_>,
) -> Result<MutationOutcome> {
    let current = load_issue(conn, issue_id)?.ok_or_else(|| issue_not_found(issue_id))?;
    if current.status == status {
        return Ok(MutationOutcome::Applied {
            issue_id: issue_id.to_string(),
            changed: false,
        });
    }

    let now = now_timestamp();
    let closed_at = (status == IssueStatus::Closed).then(|| now.clone());
    conn.execute(
        "UPDATE issues SET status = ?1, closed_at = ?2, updated_at = ?3 WHERE id = ?4",
        params![status.as_str(), closed_at, now, issue_id],
    )
    .map_err(from_rusqlite)?;

    record_event(
        conn,
        ctx,
        issue_id,
        "status_changed",
        Some(current.status.as_str()),
        Some(status.as_str()),
    )?;

    Ok(MutationOutcome::Applied {
        issue_id: issue_id.to_string(),
        changed: true,
    })
}

fn add_relation(
    conn: &Connection,
    rel: &Relation,
    ctx: &ApplyContext<'_>,
) -> Result<MutationOutcome> {
    ensure_issue(conn, &rel.issue_id)?;
    ensure_issue(conn, &rel.depends_on_id)?;

    if matches!(rel.kind, RelationKind::Blocks | RelationKind::ParentChild)
        && reaches(conn, &rel.depends_on_id, &rel.issue_id, rel.kind)?
    {
        return Err(ValidationError::RelationCycle {
            issue_id: rel.issue_id.clone(),
            depends_on_id: rel.depends_on_id.clone(),
        }
        .into());
    }

    let now = now_timestamp();
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO dependencies (issue_id, depends_on_id, type, created_at, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![rel.issue_id, rel.depends_on_id, rel.kind.as_str(), now, ctx.actor],
        )
        .map_err(from_rusqlite)?;

    if inserted > 0 {
        touch(conn, &rel.issue_id, &now)?;
        let value = format!("{}:{}", rel.kind, rel.depends_on_id);
        record_event(
            conn,
            ctx,
            &rel.issue_id,
            "dependency_added",
            None,
            Some(value.as_str()),
        )?;
    }

    Ok(MutationOutcome::Applied {
        issue_id: rel.issue_id.clone(),
        changed: inserted > 0,
    })
}

fn remove_relation(
    conn: &Connection,
    rel: &Relation,
    ctx: &ApplyContext<'_>,
) -> Result<MutationOutcome> {
    ensure_issue(conn, &rel.issue_id)?;

    let removed = conn
        .execute(
            "DELETE FROM dependencies WHERE issue_id = ?1 AND depends_on_id = ?2 AND type = ?3",
            params![rel.issue_id, rel.depends_on_id, rel.kind.as_str()],
        )
        .map_err(from_rusqlite)?;

    if removed > 0 {
        touch(conn, &rel.issue_id, &now_timestamp())?;
        let value = format!("{}:{}", rel.kind, rel.depends_on_id);
        record_event(
            conn,
            ctx,
            &rel.issue_id,
            "dependency_removed",
            Some(value.as_str()),
            None,
        )?;
    }

    Ok(MutationOutcome::Applied {
        issue_id: rel.issue_id.clone(),
        changed: removed > 0,
    })
}

fn add_label(
    conn: &Connection,
    issue_id: &str,
    label: &str,
    ctx: &ApplyContext<'_>,
) -> Result<MutationOutcome> {
    ensure_issue(conn, issue_id)?;

    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO labels (issue_id, label) VALUES (?1, ?2)",
            params![issue_id, label],
        )
        .map_err(from_rusqlite)?;

    if inserted > 0 {
        touch(conn, issue_id, &now_timestamp())?;
        record_event(conn, ctx, issue_id, "label_added", None, Some(label))?;
    }

    Ok(MutationOutcome::Applied {
        issue_id: issue_id.to_string(),
        changed: inserted > 0,
    })
}

fn remove_label(
    conn: &Connection,
    issue_id: &str,
    label: &str,
    ctx: &ApplyContext<'_>,
) -> Result<MutationOutcome> {
    ensure_issue(conn, issue_id)?;

    let removed = conn
        .execute(
            "DELETE FROM labels WHERE issue_id = ?1 AND label = ?2",
            params![issue_id, label],
        )
        .map_err(from_rusqlite)?;

    if removed > 0 {
        touch(conn, issue_id, &now_timestamp())?;
        record_event(conn, ctx, issue_id, "label_removed", Some(label), None)?;
    }

    Ok(MutationOutcome::Applied {
        issue_id: issue_id.to_string(),
        changed: removed > 0,
    })
}

fn add_comment(
    conn: &Connection,
    issue_id: &str,
    author: &str,
    text: &str,
    ctx: &ApplyContext<'_>,
) -> Result<MutationOutcome> {
    ensure_issue(conn, issue_id)?;

    let created_at = chrono::Utc::now();
    let stamp = created_at.to_rfc3339();
    conn.execute(
        "INSERT INTO comments (issue_id, author, text, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![issue_id, author, text, stamp],
    )
    .map_err(from_rusqlite)?;
    let id = conn.last_insert_rowid();

    touch(conn, issue_id, &stamp)?;
    record_event(conn, ctx, issue_id, "commented", None, Some(text))?;

    Ok(MutationOutcome::Commented(Comment {
        id,
        issue_id: issue_id.to_string(),
        author: author.to_string(),
        text: text.to_string(),
        created_at,
    }))
}

/// Pick an unused `<prefix>-<hex>` id
fn allocate_issue_id(conn: &Connection, prefix: &str) -> Result<String> {
    for _ in 0..ID_ALLOCATION_ATTEMPTS {
        let suffix = Uuid::new_v4().simple().to_string();
        let candidate = format!("{}-{}", prefix, &suffix[..ID_SUFFIX_LEN]);
        if !issue_exists(conn, &candidate)? {
            return Ok(candidate);
        }
    }
    Err(BoardError::new(ErrorKind::Internal)
        .with_op("allocate_issue_id")
        .with_message("could not allocate an unused issue id"))
}

fn issue_exists(conn: &Connection, issue_id: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM issues WHERE id = ?1)",
        [issue_id],
        |row| row.get(0),
    )
    .map_err(from_rusqlite)
}

fn ensure_issue(conn: &Connection, issue_id: &str) -> Result<()> {
    if issue_exists(conn, issue_id)? {
        Ok(())
    } else {
        Err(issue_not_found(issue_id))
    }
}

/// Whether `from` already depends on `to` through relations of `kind`
fn reaches(conn: &Connection, from: &str, to: &str, kind: RelationKind) -> Result<bool> {
    conn.query_row(
        "WITH RECURSIVE reach(id) AS (
             SELECT ?1
             UNION
             SELECT d.depends_on_id FROM dependencies d
             JOIN reach r ON d.issue_id = r.id
             WHERE d.type = ?3
         )
         SELECT EXISTS(SELECT 1 FROM reach WHERE id = ?2)",
        params![from, to, kind.as_str()],
        |row| row.get(0),
    )
    .map_err(from_rusqlite)
}

fn touch(conn: &Connection, issue_id: &str, stamp: &str) -> Result<()> {
    conn.execute(
        "UPDATE issues SET updated_at = ?1 WHERE id = ?2",
        params![stamp, issue_id],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

fn record_event(
    conn: &Connection,
    ctx: &ApplyContext<'_>,
    issue_id: &str,
    event_type: &str,
    old_value: Option<&str>,
    new_value: Option<&str>,
) -> Result<()> {
    if !ctx.record_events {
        return Ok(());
    }
    conn.execute(
        "INSERT INTO events (issue_id, event_type, actor, old_value, new_value, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            issue_id,
            event_type,
            ctx.actor,
            old_value,
            new_value,
            now_timestamp()
        ],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}
