//! Migration SQL compiled into the binary

use sha2::{Digest, Sha256};

/// One forward-only schema step
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

impl Migration {
    /// Hex sha256 of the SQL, recorded when applied to detect later edits
    pub fn checksum(&self) -> String {
        hex::encode(Sha256::digest(self.sql.as_bytes()))
    }
}

/// All migrations in application order
pub const MIGRATIONS: &[Migration] = &[Migration {
    id: "001_board_schema",
    sql: include_str!("../../migrations/001_board_schema.sql"),
}];
