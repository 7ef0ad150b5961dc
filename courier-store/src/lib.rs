//! SQLite access to the Messages `chat.db`.
//!
//! `SqliteStore::open(path)` opens the database read-only and answers
//! [`courier_core::MessageQuery`]s. Timestamps are converted from the Apple
//! epoch on the way out; see [`apple_time`].

pub mod apple_time;
pub mod schema;
mod sqlite;

pub use sqlite::{build_sql, SqliteStore};
