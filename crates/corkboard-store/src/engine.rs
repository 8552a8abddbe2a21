//! The embedded engine holding the live copy of the record store
//!
//! The backing file is copied into an in-memory SQLite database on load
//! and copied back out on export. Between those points the file is not
//! held open, so other processes are free to rewrite it.

use crate::db;
use crate::errors::{connection_error, from_rusqlite, Result};
use crate::repo::{ApplyContext, BoardQuery, BoardRepo};
use corkboard_core::model::{Board, IssueDetail};
use corkboard_core::ops::{Mutation, MutationOutcome};
use rusqlite::backup::Backup;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

/// Tables a backing file must contain to be accepted
pub const REQUIRED_TABLES: [&str; 4] = ["issues", "dependencies", "labels", "comments"];

const PAGES_PER_STEP: i32 = 256;

pub struct SqliteEngine {
    conn: Connection,
    has_events: bool,
    issue_prefix: Option<String>,
}

impl std::fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEngine")
            .field("has_events", &self.has_events)
            .field("issue_prefix", &self.issue_prefix)
            .finish_non_exhaustive()
    }
}

impl SqliteEngine {
    /// Load the backing file into a fresh in-memory engine
    ///
    /// # Errors
    /// `Connection` if the file is missing, is not a SQLite database, or
    /// lacks any of [`REQUIRED_TABLES`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(connection_error(path, "no store file found"));
        }

        let source = db::open_read_only(path)
            .map_err(|e| connection_error(path, "cannot open store").with_source(e))?;
        let mut conn = db::open_in_memory()?;
        {
            let backup = Backup::new(&source, &mut conn).map_err(from_rusqlite)?;
            backup
                .run_to_completion(PAGES_PER_STEP, Duration::ZERO, None)
                .map_err(|e| {
                    connection_error(path, "not a readable store").with_source(from_rusqlite(e))
                })?;
        }
        drop(source);

        Self::from_connection(conn).map_err(|e| connection_error(path, e.message()))
    }

    /// Wrap an already-populated connection, verifying its structure
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let tables = table_names(&conn)?;
        let missing: Vec<&str> = REQUIRED_TABLES
            .iter()
            .copied()
            .filter(|t| !tables.iter().any(|name| name == t))
            .collect();
        if !missing.is_empty() {
            return Err(corkboard_core::BoardError::new(
                corkboard_core::ErrorKind::Connection,
            )
            .with_op("verify_structure")
            .with_message(format!("missing tables: {}", missing.join(", "))));
        }

        let has_events = tables.iter().any(|t| t == "events");
        let issue_prefix = if tables.iter().any(|t| t == "config") {
            conn.query_row(
                "SELECT value FROM config WHERE key = 'issue_prefix'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(from_rusqlite)?
            .filter(|p| !p.trim().is_empty())
        } else {
            None
        };

        Ok(Self {
            conn,
            has_events,
            issue_prefix,
        })
    }

    /// Execute a mutation against the live engine
    ///
    /// `default_prefix` is used for new ids when the store itself does not
    /// name one.
    pub fn apply(
        &mut self,
        mutation: &Mutation,
        actor: &str,
        default_prefix: &str,
    ) -> Result<MutationOutcome> {
        let ctx = ApplyContext {
            actor,
            prefix: self.issue_prefix.as_deref().unwrap_or(default_prefix),
            record_events: self.has_events,
        };
        BoardRepo::apply(&mut self.conn, mutation, &ctx)
    }

    /// Assemble the board read-model
    pub fn board(&self) -> Result<Board> {
        BoardQuery::board(&self.conn)
    }

    /// Assemble one issue with its comments and audit trail
    pub fn issue_detail(&self, issue_id: &str) -> Result<IssueDetail> {
        BoardQuery::issue_detail(&self.conn, issue_id, self.has_events)
    }

    /// Export the full content into a new database file at `dst`
    ///
    /// `dst` must not hold another database; callers remove it first.
    pub fn export_to(&self, dst: &Path) -> Result<()> {
        let mut out = db::open_for_write(dst)?;
        {
            let backup = Backup::new(&self.conn, &mut out).map_err(from_rusqlite)?;
            backup
                .run_to_completion(PAGES_PER_STEP, Duration::ZERO, None)
                .map_err(from_rusqlite)?;
        }
        out.close().map_err(|(_, e)| from_rusqlite(e))
    }

    /// Release the engine
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| from_rusqlite(e))
    }

    /// Read-only access for diagnostics and tests
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
        .map_err(from_rusqlite)?;
    let names = stmt
        .query_map([], |row| row.get(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(from_rusqlite)?;
    Ok(names)
}
