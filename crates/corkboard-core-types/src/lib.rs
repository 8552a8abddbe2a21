//! Core types shared across corkboard crates
//!
//! This crate provides foundational types used by both the error and
//! logging facilities:
//!
//! - **Correlation types**: OperationId, PublishId, OperationContext
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{OperationContext, OperationId, PublishId};
