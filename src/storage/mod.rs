//! SQLite persistence: user profiles, points and the current notice

pub mod db;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool, Notice, SqlitePointsLedger, User};
