//! Repository layer over the engine's SQL schema
//!
//! `BoardRepo` executes mutations; `BoardQuery` assembles the read-model.

pub mod board_query;
pub mod board_repo;

pub use board_query::BoardQuery;
pub use board_repo::{ApplyContext, BoardRepo};
