//! Board read-model
//!
//! The shape callers render. Computed from the engine in one pass and
//! memoized by the snapshot cache, so it is immutable once built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::comment::{Comment, IssueEvent};
use super::issue::{Issue, IssueStatus};

/// An issue enriched with everything a card shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(flatten)]
    pub issue: Issue,
    pub labels: Vec<String>,
    /// Blockers that are not closed yet
    pub blocked_by: Vec<String>,
    /// Issues this one blocks
    pub blocks: Vec<String>,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub comment_count: usize,
    /// Open and nothing open blocks it
    pub is_ready: bool,
}

impl Card {
    pub fn id(&self) -> &str {
        &self.issue.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardColumn {
    pub status: IssueStatus,
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub columns: Vec<BoardColumn>,
    pub computed_at: DateTime<Utc>,
}

impl Board {
    /// Total number of cards across all columns
    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.cards.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find a card anywhere on the board
    pub fn card(&self, issue_id: &str) -> Option<&Card> {
        self.columns
            .iter()
            .flat_map(|c| c.cards.iter())
            .find(|card| card.id() == issue_id)
    }

    pub fn column(&self, status: IssueStatus) -> Option<&BoardColumn> {
        self.columns.iter().find(|c| c.status == status)
    }
}

/// Single-issue view: the card plus its comments and audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDetail {
    pub card: Card,
    pub comments: Vec<Comment>,
    pub events: Vec<IssueEvent>,
}
