//! The board facade contract
//!
//! `BoardAdapter` is the file-backed implementation. Another backend (for
//! example one shelling out to a per-call command with its own cache and
//! self-mutation window) can implement the same trait and be swapped in.

use crate::adapter::BoardAdapter;
use async_trait::async_trait;
use corkboard_core::errors::{BoardError, ErrorKind, Result};
use corkboard_core::model::{Board, Comment, IssueDetail, IssueStatus, Relation};
use corkboard_core::ops::{IssueUpdate, Mutation, MutationOutcome, NewIssue};
use std::sync::Arc;

#[async_trait]
pub trait BoardBackend: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn get_board(&self) -> Result<Arc<Board>>;
    async fn get_issue(&self, issue_id: &str) -> Result<IssueDetail>;
    async fn mutate(&self, mutation: Mutation) -> Result<MutationOutcome>;
    /// Reload from the backing store; false if the reload did not happen
    async fn reload_now(&self) -> Result<bool>;
    async fn dispose(&self);

    /// Create an issue and return its id
    async fn create_issue(&self, issue: NewIssue) -> Result<String> {
        let outcome = self.mutate(Mutation::Create(issue)).await?;
        Ok(outcome.issue_id().to_string())
    }

    async fn update_issue(&self, update: IssueUpdate) -> Result<bool> {
        Ok(self.mutate(Mutation::Update(update)).await?.changed())
    }

    async fn set_status(&self, issue_id: &str, status: IssueStatus) -> Result<bool> {
        let mutation = Mutation::SetStatus {
            issue_id: issue_id.to_string(),
            status,
        };
        Ok(self.mutate(mutation).await?.changed())
    }

    async fn add_relation(&self, relation: Relation) -> Result<bool> {
        Ok(self.mutate(Mutation::AddRelation(relation)).await?.changed())
    }

    async fn remove_relation(&self, relation: Relation) -> Result<bool> {
        Ok(self.mutate(Mutation::RemoveRelation(relation)).await?.changed())
    }

    async fn add_label(&self, issue_id: &str, label: &str) -> Result<bool> {
        let mutation = Mutation::AddLabel {
            issue_id: issue_id.to_string(),
            label: label.to_string(),
        };
        Ok(self.mutate(mutation).await?.changed())
    }

    async fn remove_label(&self, issue_id: &str, label: &str) -> Result<bool> {
        let mutation = Mutation::RemoveLabel {
            issue_id: issue_id.to_string(),
            label: label.to_string(),
        };
        Ok(self.mutate(mutation).await?.changed())
    }

    async fn add_comment(&self, issue_id: &str, author: &str, text: &str) -> Result<Comment> {
        let mutation = Mutation::AddComment {
            issue_id: issue_id.to_string(),
            author: author.to_string(),
            text: text.to_string(),
        };
        match self.mutate(mutation).await? {
            MutationOutcome::Commented(comment) => Ok(comment),
            other => Err(BoardError::new(ErrorKind::Internal)
                .with_op("add_comment")
                .with_entity_id(other.issue_id())
                .with_message("backend returned no comment")),
        }
    }
}

#[async_trait]
impl BoardBackend for BoardAdapter {
    async fn connect(&self) -> Result<()> {
        BoardAdapter::connect(self).await
    }

    async fn get_board(&self) -> Result<Arc<Board>> {
        BoardAdapter::get_board(self).await
    }

    async fn get_issue(&self, issue_id: &str) -> Result<IssueDetail> {
        BoardAdapter::get_issue(self, issue_id).await
    }

    async fn mutate(&self, mutation: Mutation) -> Result<MutationOutcome> {
        BoardAdapter::mutate(self, mutation).await
    }

    async fn reload_now(&self) -> Result<bool> {
        BoardAdapter::reload_now(self).await
    }

    async fn dispose(&self) {
        BoardAdapter::dispose(self).await
    }
}
