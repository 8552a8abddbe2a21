//! Mutation operations accepted by the board
//!
//! Operations are plain data; the store executes them and the engine
//! wraps execution in the dirty/save protocol.

pub mod mutation;

pub use mutation::{IssueUpdate, Mutation, MutationOutcome, NewIssue};
