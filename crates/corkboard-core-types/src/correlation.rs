//! Correlation types for operation tracking
//!
//! Every facade call carries an `OperationId`; every publish of the backing
//! file carries a `PublishId`. Both end up as fields on log events so a
//! mutation can be followed through the debounced save that persisted it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Generate a new random id using UUIDv7
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Get the string representation
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Create from an existing string (for deserialization)
            pub fn from_string(s: String) -> Self {
                Self(s)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a single facade operation
    OperationId
);

define_id!(
    /// Unique identifier for one publish (export + rename) of the backing file
    PublishId
);

/// Context carried through a facade operation for correlation
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub op_id: OperationId,
    pub op: &'static str,
}

impl OperationContext {
    /// Create a new context for the named operation with a fresh id
    pub fn new(op: &'static str) -> Self {
        Self {
            op_id: OperationId::new(),
            op,
        }
    }

    /// Create a context with an existing OperationId
    pub fn with_op_id(op: &'static str, op_id: OperationId) -> Self {
        Self { op_id, op }
    }
}
