use serde::{Deserialize, Serialize};

use crate::model::{Comment, IssueStatus, IssueType, Relation};

/// Default priority for new issues (middle of 0..=4)
pub const DEFAULT_PRIORITY: i64 = 2;

/// Fields for a new issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub status: IssueStatus,
    pub priority: i64,
    pub issue_type: IssueType,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
}

impl NewIssue {
    /// An open task with default priority
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            status: IssueStatus::Open,
            priority: DEFAULT_PRIORITY,
            issue_type: IssueType::Task,
            assignee: None,
            labels: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_type(mut self, issue_type: IssueType) -> Self {
        self.issue_type = issue_type;
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }
}

/// Partial update of an issue's editable fields
///
/// `None` leaves a field untouched. `assignee: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueUpdate {
    pub issue_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i64>,
    pub issue_type: Option<IssueType>,
    pub assignee: Option<Option<String>>,
}

impl IssueUpdate {
    pub fn new(issue_id: impl Into<String>) -> Self {
        Self {
            issue_id: issue_id.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.issue_type.is_none()
            && self.assignee.is_none()
    }
}

/// Every write the facade accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    Create(NewIssue),
    Update(IssueUpdate),
    SetStatus {
        issue_id: String,
        status: IssueStatus,
    },
    AddRelation(Relation),
    RemoveRelation(Relation),
    AddLabel {
        issue_id: String,
        label: String,
    },
    RemoveLabel {
        issue_id: String,
        label: String,
    },
    AddComment {
        issue_id: String,
        author: String,
        text: String,
    },
}

impl Mutation {
    /// Operation name used in logs and audit events
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::Create(_) => "create",
            Mutation::Update(_) => "update",
            Mutation::SetStatus { .. } => "set_status",
            Mutation::AddRelation(_) => "add_relation",
            Mutation::RemoveRelation(_) => "remove_relation",
            Mutation::AddLabel { .. } => "add_label",
            Mutation::RemoveLabel { .. } => "remove_label",
            Mutation::AddComment { .. } => "add_comment",
        }
    }

    /// Issue the mutation targets; `None` for creation
    pub fn issue_id(&self) -> Option<&str> {
        match self {
            Mutation::Create(_) => None,
            Mutation::Update(update) => Some(&update.issue_id),
            Mutation::SetStatus { issue_id, .. }
            | Mutation::AddLabel { issue_id, .. }
            | Mutation::RemoveLabel { issue_id, .. }
            | Mutation::AddComment { issue_id, .. } => Some(issue_id),
            Mutation::AddRelation(rel) | Mutation::RemoveRelation(rel) => Some(&rel.issue_id),
        }
    }
}

/// What a mutation did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MutationOutcome {
    Created { issue_id: String },
    /// `changed` is false when the store already matched (e.g. label present)
    Applied { issue_id: String, changed: bool },
    Commented(Comment),
}

impl MutationOutcome {
    /// Whether the engine content differs from before the mutation
    pub fn changed(&self) -> bool {
        match self {
            MutationOutcome::Created { .. } | MutationOutcome::Commented(_) => true,
            MutationOutcome::Applied { changed, .. } => *changed,
        }
    }

    pub fn issue_id(&self) -> &str {
        match self {
            MutationOutcome::Created { issue_id } | MutationOutcome::Applied { issue_id, .. } => {
                issue_id
            }
            MutationOutcome::Commented(comment) => &comment.issue_id,
        }
    }
}
