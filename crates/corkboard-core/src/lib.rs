//! corkboard core - domain kernel for the board
//!
//! This crate provides:
//! - The error facility (`BoardError`, `ErrorKind`, `ValidationError`)
//! - The structured logging facility and its test capture mode
//! - Issue, relation, comment and board read-model types
//! - Mutation operations and the input rules checked before execution

pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod ops;
pub mod rules;

/// Shared correlation types and schema constants
pub use corkboard_core_types as types;

// Re-export commonly used types
pub use errors::{BoardError, ErrorKind, Result, ValidationError};
pub use model::{Board, Card, Comment, Issue, IssueDetail, IssueStatus, IssueType, Relation, RelationKind};
pub use ops::{IssueUpdate, Mutation, MutationOutcome, NewIssue};
pub use rules::validate_mutation;
