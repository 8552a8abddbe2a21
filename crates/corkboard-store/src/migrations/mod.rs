//! Schema migrations for newly created stores
//!
//! Migrations only run when a store is created. An existing backing file
//! written by another process is loaded as-is and never migrated in place.

mod embedded;
mod runner;

pub use embedded::{Migration, MIGRATIONS};
pub use runner::{applied_migrations, apply_migrations};
