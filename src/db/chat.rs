//! Emoji chat storage

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::ArenaError;

pub const DEFAULT_ROOM: &str = "global";

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessageRow {
    pub id: String,
    pub room: String,
    pub agent_id: String,
    pub agent_name: String,
    pub content: String,
    pub created_at: String,
}

impl ChatMessageRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            room: row.get("room")?,
            agent_id: row.get("agent_id")?,
            agent_name: row.get("agent_name")?,
            content: row.get("content")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub id: String,
    pub room: String,
    pub agent_id: String,
    pub content: String,
    pub created_at: String,
}

/// Query parameters for listing chat messages
#[derive(Debug, Clone, Deserialize)]
pub struct ChatQuery {
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for ChatQuery {
    fn default() -> Self {
        Self {
            room: None,
            limit: default_limit(),
        }
    }
}

fn default_limit() -> u32 { 50 }

pub fn insert_message(conn: &mut Connection, message: &NewChatMessage) -> Result<(), ArenaError> {
    conn.execute(
        "INSERT INTO emoji_chat_messages (id, room, agent_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
        params![message.id, message.room, message.agent_id, message.content, message.created_at],
    )?;
    Ok(())
}

/// Messages newest first, optionally restricted to one room
pub fn list_messages(conn: &Connection, query: &ChatQuery) -> Result<Vec<ChatMessageRow>, ArenaError> {
    let mut sql = String::from(
        r#"
        SELECT m.*, a.name AS agent_name
        FROM emoji_chat_messages m
        JOIN agents a ON a.id = m.agent_id
        "#,
    );
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];

    if let Some(ref room) = query.room {
        sql.push_str(" WHERE m.room = ?");
        params.push(Box::new(room.clone()));
    }

    sql.push_str(" ORDER BY m.created_at DESC, m.rowid DESC LIMIT ?");
    params.push(Box::new(query.limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), ChatMessageRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_message(conn: &Connection, id: &str) -> Result<Option<ChatMessageRow>, ArenaError> {
    let message = conn
        .query_row(
            r#"
            SELECT m.*, a.name AS agent_name
            FROM emoji_chat_messages m
            JOIN agents a ON a.id = m.agent_id
            WHERE m.id = ?
            "#,
            params![id],
            ChatMessageRow::from_row,
        )
        .optional()?;
    Ok(message)
}
