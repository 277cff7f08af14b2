//! # Transcript Persistence
//!
//! One relational table of transcription records behind a small gateway.
//!
//! ## Key Components:
//! - **Record**: the persisted row and its public JSON view
//! - **Store**: create/list/get/search operations over a SQLite pool

pub mod record;
pub mod store;

pub use record::{Transcription, TranscriptionView};
pub use store::TranscriptionStore;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Open the SQLite pool for the given connection string.
///
/// Creates the database file on first start. In-memory databases are pinned
/// to a single connection; separate connections would each see their own
/// empty database.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}
