//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::ArenaError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 3;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), ArenaError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, ArenaError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    ).map_err(|e| ArenaError::Internal(format!("Failed to create schema_version table: {}", e)))?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), ArenaError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| ArenaError::Internal(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| ArenaError::Internal(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<(), ArenaError> {
    conn.execute_batch(ARENA_SCHEMA)
        .map_err(|e| ArenaError::Internal(format!("Failed to create arena tables: {}", e)))?;

    conn.execute_batch(SEARCH_SCHEMA)
        .map_err(|e| ArenaError::Internal(format!("Failed to create search tables: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| ArenaError::Internal(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Migrate schema from older version
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<(), ArenaError> {
    if from_version < 2 {
        // v1 had no claim flow and dropped the agent description
        for (column, ddl) in [
            ("claim_token", "ALTER TABLE agents ADD COLUMN claim_token TEXT"),
            ("claim_status", "ALTER TABLE agents ADD COLUMN claim_status TEXT NOT NULL DEFAULT 'pending_claim'"),
            ("description", "ALTER TABLE agents ADD COLUMN description TEXT"),
        ] {
            if !has_column(conn, "agents", column)? {
                conn.execute(ddl, [])
                    .map_err(|e| ArenaError::Internal(format!("Failed to add agents.{}: {}", column, e)))?;
            }
        }

        conn.execute_batch(INDEXES_SCHEMA)
            .map_err(|e| ArenaError::Internal(format!("Failed to create indexes: {}", e)))?;
    }

    if from_version < 3 {
        // v2 index had no folded columns; the index is derived, so recreate it
        conn.execute_batch("DROP TABLE IF EXISTS search_index;")
            .map_err(|e| ArenaError::Internal(format!("Failed to drop search index: {}", e)))?;
        conn.execute_batch(SEARCH_SCHEMA)
            .map_err(|e| ArenaError::Internal(format!("Failed to create search tables: {}", e)))?;
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, ArenaError> {
    let found: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(found > 0)
}

/// Core arena tables
const ARENA_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS agents (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT UNIQUE NOT NULL,
    description TEXT,
    api_key TEXT UNIQUE NOT NULL,
    claim_token TEXT UNIQUE,
    claim_status TEXT NOT NULL DEFAULT 'pending_claim',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS prompts (
    id TEXT PRIMARY KEY NOT NULL,
    created_by TEXT,
    title TEXT NOT NULL,
    context_text TEXT NOT NULL,
    media_type TEXT NOT NULL DEFAULT 'text',
    media_url TEXT,
    status TEXT NOT NULL DEFAULT 'open',
    created_at TEXT NOT NULL,
    FOREIGN KEY (created_by) REFERENCES agents(id)
);

CREATE TABLE IF NOT EXISTS proposals (
    id TEXT PRIMARY KEY NOT NULL,
    prompt_id TEXT NOT NULL,
    agent_id TEXT NOT NULL,
    emoji_string TEXT NOT NULL,
    rationale TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (prompt_id) REFERENCES prompts(id),
    FOREIGN KEY (agent_id) REFERENCES agents(id)
);

-- One row per (proposal, voter); re-votes overwrite value
CREATE TABLE IF NOT EXISTS votes (
    id TEXT PRIMARY KEY NOT NULL,
    proposal_id TEXT NOT NULL,
    user_fingerprint TEXT NOT NULL,
    value INTEGER NOT NULL CHECK (value IN (-1, 1)),
    created_at TEXT NOT NULL,
    UNIQUE (proposal_id, user_fingerprint),
    FOREIGN KEY (proposal_id) REFERENCES proposals(id)
);

CREATE TABLE IF NOT EXISTS emoji_chat_messages (
    id TEXT PRIMARY KEY NOT NULL,
    room TEXT NOT NULL DEFAULT 'global',
    agent_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (agent_id) REFERENCES agents(id)
);
"#;

/// Search index (derived data, safe to drop and rebuild)
const SEARCH_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS search_index (
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL DEFAULT '',
    title_folded TEXT NOT NULL,
    body_folded TEXT NOT NULL DEFAULT '',
    prompt_id TEXT,
    PRIMARY KEY (entity_type, entity_id)
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_prompts_status ON prompts(status);
CREATE INDEX IF NOT EXISTS idx_prompts_created ON prompts(created_at);
CREATE INDEX IF NOT EXISTS idx_proposals_prompt ON proposals(prompt_id);
CREATE INDEX IF NOT EXISTS idx_proposals_agent ON proposals(agent_id);
CREATE INDEX IF NOT EXISTS idx_votes_proposal ON votes(proposal_id);
CREATE INDEX IF NOT EXISTS idx_chat_room_created ON emoji_chat_messages(room, created_at);
"#;
