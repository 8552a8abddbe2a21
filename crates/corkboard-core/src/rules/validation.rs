use crate::errors::ValidationError;
use crate::model::MAX_PRIORITY;
use crate::ops::{IssueUpdate, Mutation, NewIssue};

/// Longest accepted title, in characters
pub const MAX_TITLE_LEN: usize = 500;

/// Validate a mutation's caller-supplied fields
///
/// Only checks what can be decided without the store. Existence of the
/// referenced issues is checked by the store while executing.
///
/// # Errors
/// Returns the first violated rule.
pub fn validate_mutation(mutation: &Mutation) -> Result<(), ValidationError> {
    match mutation {
        Mutation::Create(new_issue) => validate_new_issue(new_issue),
        Mutation::Update(update) => validate_update(update),
        Mutation::SetStatus { issue_id, .. } => validate_issue_id(issue_id),
        Mutation::AddRelation(rel) | Mutation::RemoveRelation(rel) => {
            validate_issue_id(&rel.issue_id)?;
            validate_issue_id(&rel.depends_on_id)?;
            if rel.issue_id == rel.depends_on_id {
                return Err(ValidationError::SelfRelation {
                    issue_id: rel.issue_id.clone(),
                });
            }
            Ok(())
        }
        Mutation::AddLabel { issue_id, label } | Mutation::RemoveLabel { issue_id, label } => {
            validate_issue_id(issue_id)?;
            validate_label(label)
        }
        Mutation::AddComment { issue_id, text, .. } => {
            validate_issue_id(issue_id)?;
            if text.trim().is_empty() {
                return Err(ValidationError::EmptyComment);
            }
            Ok(())
        }
    }
}

fn validate_new_issue(new_issue: &NewIssue) -> Result<(), ValidationError> {
    validate_title(&new_issue.title)?;
    validate_priority(new_issue.priority)?;
    new_issue
        .labels
        .iter()
        .map(String::as_str)
        .try_for_each(validate_label)
}

fn validate_update(update: &IssueUpdate) -> Result<(), ValidationError> {
    validate_issue_id(&update.issue_id)?;
    if update.is_empty() {
        return Err(ValidationError::EmptyUpdate {
            issue_id: update.issue_id.clone(),
        });
    }
    if let Some(title) = &update.title {
        validate_title(title)?;
    }
    if let Some(priority) = update.priority {
        validate_priority(priority)?;
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong { max: MAX_TITLE_LEN });
    }
    Ok(())
}

pub fn validate_priority(priority: i64) -> Result<(), ValidationError> {
    if !(0..=MAX_PRIORITY).contains(&priority) {
        return Err(ValidationError::PriorityOutOfRange { priority });
    }
    Ok(())
}

pub fn validate_label(label: &str) -> Result<(), ValidationError> {
    if label.is_empty() || label.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidLabel {
            label: label.to_string(),
        });
    }
    Ok(())
}

fn validate_issue_id(issue_id: &str) -> Result<(), ValidationError> {
    if issue_id.trim().is_empty() {
        return Err(ValidationError::EmptyIssueId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Relation, RelationKind};

    #[test]
    fn test_blank_title_rejected() {
        let m = Mutation::Create(NewIssue::new("   "));
        assert_eq!(validate_mutation(&m), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn test_self_relation_rejected() {
        let m = Mutation::AddRelation(Relation {
            issue_id: "bd-1".into(),
            depends_on_id: "bd-1".into(),
            kind: RelationKind::Blocks,
        });
        assert!(matches!(
            validate_mutation(&m),
            Err(ValidationError::SelfRelation { .. })
        ));
    }

    #[test]
    fn test_label_with_space_rejected() {
        let m = Mutation::AddLabel {
            issue_id: "bd-1".into(),
            label: "needs review".into(),
        };
        assert!(matches!(
            validate_mutation(&m),
            Err(ValidationError::InvalidLabel { .. })
        ));
    }

    #[test]
    fn test_empty_update_rejected() {
        let m = Mutation::Update(IssueUpdate::new("bd-1"));
        assert!(matches!(
            validate_mutation(&m),
            Err(ValidationError::EmptyUpdate { .. })
        ));
    }

    #[test]
    fn test_empty_comment_rejected() {
        let m = Mutation::AddComment {
            issue_id: "bd-1".into(),
            author: "ana".into(),
            text: "\n".into(),
        };
        assert_eq!(validate_mutation(&m), Err(ValidationError::EmptyComment));
    }
}
