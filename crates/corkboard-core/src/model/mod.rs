//! Domain models for the board
//!
//! Records as they live in the store (issues, relations, labels, comments,
//! audit events) and the read-model assembled from them (`Board`).

pub mod board;
pub mod comment;
pub mod issue;
pub mod relation;

pub use board::{Board, BoardColumn, Card, IssueDetail};
pub use comment::{Comment, IssueEvent};
pub use issue::{Issue, IssueStatus, IssueType, MAX_PRIORITY};
pub use relation::{Relation, RelationKind};
