// Persistence: SQLite tables for raw exports, staging and the final log table

mod sqlite;

pub use sqlite::{quote_ident, sha256_hex, LogDatabase, RunRecord};
