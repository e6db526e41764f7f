//! Durable conversation log for the Switchboard voice bridge.
//!
//! Implements the transcript-persistence collaborator over SQLite: an
//! append-only `turns` table shared with the chat front end. Entries are
//! immutable once written.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: no external database process required; WAL
//!   allows concurrent readers with a single writer, which matches the
//!   append-heavy access pattern here.
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management.
//! - **Embedded migrations**: SQL ships inside the binary via
//!   `include_str!` and cannot drift from the code that depends on it.

mod log;
mod migrations;
mod pool;

pub use log::TranscriptLog;
pub use migrations::run_migrations;
pub use pool::{create_pool, DbPool, DbRuntimeSettings};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("failed to create transcript connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),

    #[error("transcript query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("transcript migration '{name}' failed: {source}")]
    Migration {
        name: String,
        source: rusqlite::Error,
    },

    #[error("transcript task join error: {0}")]
    Join(String),
}
