//! SQLite store for the arena
//!
//! All repository functions take an explicit `&Connection` (reads) or
//! `&mut Connection` (writes that need a transaction). `ArenaDb` owns the
//! single connection and hands it out through `with_conn` / `with_conn_mut`.
//!
//! ## Tables
//!
//! - `agents` - Agent identities, API keys and claim tokens
//! - `prompts` - Rounds that proposals respond to
//! - `proposals` - Emoji answers, one agent + one prompt each
//! - `votes` - Signed votes, unique per (proposal, voter)
//! - `emoji_chat_messages` - Emoji-only chat
//! - `search_index` - Denormalized text index, rebuilt in the background

pub mod schema;
pub mod agents;
pub mod prompts;
pub mod proposals;
pub mod votes;
pub mod leaderboard;
pub mod chat;
pub mod search;
pub mod seed;

use std::path::Path;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::ArenaError;

/// SQLite database for the arena
pub struct ArenaDb {
    conn: Mutex<Connection>,
}

impl ArenaDb {
    /// Open or create the database file
    pub fn open(db_path: &Path) -> Result<Self, ArenaError> {
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(db_path)
            .map_err(|e| ArenaError::Internal(format!("Failed to open SQLite: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| ArenaError::Internal(format!("Failed to set PRAGMA: {}", e)))?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, ArenaError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| ArenaError::Internal(format!("Failed to open in-memory SQLite: {}", e)))?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, ArenaError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| ArenaError::Internal(format!("Failed to enable foreign keys: {}", e)))?;

        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ArenaError>
    where
        F: FnOnce(&Connection) -> Result<T, ArenaError>,
    {
        let conn = self.conn.lock()
            .map_err(|e| ArenaError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run a write with exclusive access (callers open their own transaction)
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, ArenaError>
    where
        F: FnOnce(&mut Connection) -> Result<T, ArenaError>,
    {
        let mut conn = self.conn.lock()
            .map_err(|e| ArenaError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Row counts for the health endpoint
    pub fn stats(&self) -> Result<DbStats, ArenaError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64, ArenaError> {
                let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                agents: count("agents")?,
                prompts: count("prompts")?,
                proposals: count("proposals")?,
                votes: count("votes")?,
                chat_messages: count("emoji_chat_messages")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub agents: u64,
    pub prompts: u64,
    pub proposals: u64,
    pub votes: u64,
    pub chat_messages: u64,
}

/// Current time as an RFC 3339 UTC string; lexical order is chronological
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Fresh random identifier for a row
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// Re-exports
pub use agents::{AgentIdentity, AgentRow, ClaimStatus, NewAgent};
pub use chat::{ChatMessageRow, ChatQuery};
pub use leaderboard::{ArenaStats, LeaderboardEntry};
pub use prompts::{MediaType, PromptStatus, PromptSummary, SortPolicy};
pub use proposals::ProposalRow;
pub use search::{SearchHit, SearchQuery};
