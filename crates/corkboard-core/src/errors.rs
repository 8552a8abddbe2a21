use thiserror::Error;

/// Result type alias using BoardError
pub type Result<T> = std::result::Result<T, BoardError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable code usable for programmatic handling and
/// for assertions in tests. `NotFound` is the store-level failure for an
/// operation that names an unknown issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No valid backing data found, or the expected structure is absent
    Connection,
    /// Caller-supplied mutation failed a precondition
    Validation,
    /// Referenced issue, comment or relation does not exist
    NotFound,
    /// The engine rejected a statement
    Store,
    /// Publishing the backing file failed after exhausting retries
    Persistence,
    /// Reopening the backing file failed
    Reload,
    /// A bounded wait exceeded its cap
    StuckState,
    Io,
    Config,
    Internal,
}

impl ErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "ERR_CONNECTION",
            ErrorKind::Validation => "ERR_VALIDATION",
            ErrorKind::NotFound => "ERR_NOT_FOUND",
            ErrorKind::Store => "ERR_STORE",
            ErrorKind::Persistence => "ERR_PERSISTENCE",
            ErrorKind::Reload => "ERR_RELOAD",
            ErrorKind::StuckState => "ERR_STUCK_STATE",
            ErrorKind::Io => "ERR_IO",
            ErrorKind::Config => "ERR_CONFIG",
            ErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification (`kind`), the operation that failed, the
/// entity involved and a human-readable message. Messages name the backing
/// store by file name only, never by absolute path.
#[derive(Debug, Clone)]
pub struct BoardError {
    kind: ErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    message: String,
    source: Option<Box<BoardError>>,
}

impl BoardError {
    /// Create a new error with the specified kind
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity ID context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: BoardError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&BoardError> {
        self.source.as_deref()
    }

    /// Whether retrying the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Persistence | ErrorKind::StuckState | ErrorKind::Io
        )
    }
}

impl std::fmt::Display for BoardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(source) = &self.source {
            write!(f, "; caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for BoardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Field-level validation failures for mutation input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("Title exceeds {max} characters")]
    TitleTooLong { max: usize },

    #[error("Priority {priority} is outside 0..=4")]
    PriorityOutOfRange { priority: i64 },

    #[error("Unknown status: {value}")]
    UnknownStatus { value: String },

    #[error("Unknown issue type: {value}")]
    UnknownIssueType { value: String },

    #[error("Unknown relation kind: {value}")]
    UnknownRelationKind { value: String },

    #[error("Issue id must not be empty")]
    EmptyIssueId,

    #[error("Issue {issue_id} cannot relate to itself")]
    SelfRelation { issue_id: String },

    #[error("Relation {issue_id} -> {depends_on_id} would create a cycle")]
    RelationCycle {
        issue_id: String,
        depends_on_id: String,
    },

    #[error("Label must be non-empty and contain no whitespace: {label:?}")]
    InvalidLabel { label: String },

    #[error("Comment text must not be empty")]
    EmptyComment,

    #[error("Update for {issue_id} changes no fields")]
    EmptyUpdate { issue_id: String },
}

impl From<ValidationError> for BoardError {
    fn from(err: ValidationError) -> Self {
        let entity = match &err {
            ValidationError::SelfRelation { issue_id }
            | ValidationError::EmptyUpdate { issue_id }
            | ValidationError::RelationCycle { issue_id, .. } => Some(issue_id.clone()),
            _ => None,
        };
        let error = BoardError::new(ErrorKind::Validation).with_message(err.to_string());
        match entity {
            Some(id) => error.with_entity_id(id),
            None => error,
        }
    }
}

impl From<serde_json::Error> for BoardError {
    fn from(err: serde_json::Error) -> Self {
        BoardError::new(ErrorKind::Internal)
            .with_op("serialize")
            .with_message(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorKind::Persistence.code(), "ERR_PERSISTENCE");
        assert_eq!(ErrorKind::StuckState.code(), "ERR_STUCK_STATE");
        assert_eq!(ErrorKind::Connection.code(), "ERR_CONNECTION");
    }

    #[test]
    fn test_display_includes_op_and_entity() {
        let err = BoardError::new(ErrorKind::NotFound)
            .with_op("set_status")
            .with_entity_id("bd-1a2b3c")
            .with_message("Issue not found");

        let rendered = err.to_string();
        assert!(rendered.starts_with("[ERR_NOT_FOUND]"));
        assert!(rendered.contains("set_status"));
        assert!(rendered.contains("bd-1a2b3c"));
    }

    #[test]
    fn test_validation_conversion_keeps_entity() {
        let err: BoardError = ValidationError::SelfRelation {
            issue_id: "bd-1".to_string(),
        }
        .into();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.entity_id(), Some("bd-1"));
    }

    #[test]
    fn test_source_chain() {
        let inner = BoardError::new(ErrorKind::Io).with_message("locked");
        let outer = BoardError::new(ErrorKind::Persistence).with_source(inner);

        assert_eq!(outer.source_error().map(|e| e.kind()), Some(ErrorKind::Io));
        assert!(std::error::Error::source(&outer).is_some());
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(BoardError::new(ErrorKind::Persistence).is_retryable());
        assert!(!BoardError::new(ErrorKind::Validation).is_retryable());
    }
}
