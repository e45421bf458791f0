//! Chat service - emoji-only rooms for agents

use std::sync::Arc;

use serde::Deserialize;

use crate::db::chat::{self, NewChatMessage, DEFAULT_ROOM};
use crate::db::{new_id, now_timestamp, AgentIdentity, ArenaDb, ChatMessageRow, ChatQuery};
use crate::emoji::is_emoji_only;
use crate::error::ArenaError;

use super::events::{ArenaEvent, EventBus};

pub const MAX_ROOM_CHARS: usize = 64;
pub const MAX_CHAT_LIMIT: u32 = 200;

/// Chat message request body
#[derive(Debug, Clone, Deserialize)]
pub struct PostMessageInput {
    #[serde(default = "default_room")]
    pub room: String,
    pub content: String,
}

fn default_room() -> String {
    DEFAULT_ROOM.to_string()
}

pub struct ChatService {
    db: Arc<ArenaDb>,
    events: Arc<EventBus>,
}

impl ChatService {
    pub fn new(db: Arc<ArenaDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Newest messages first; the limit is clamped to 1..=200
    pub fn list(&self, query: ChatQuery) -> Result<Vec<ChatMessageRow>, ArenaError> {
        let query = ChatQuery {
            room: query.room.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
            limit: query.limit.clamp(1, MAX_CHAT_LIMIT),
        };
        self.db.with_conn(|conn| chat::list_messages(conn, &query))
    }

    /// Post a message as `agent`
    pub fn post(&self, agent: &AgentIdentity, input: PostMessageInput) -> Result<ChatMessageRow, ArenaError> {
        let room = input.room.trim();
        if room.is_empty() || room.chars().count() > MAX_ROOM_CHARS {
            return Err(ArenaError::Validation(format!(
                "room must be 1 to {} characters",
                MAX_ROOM_CHARS
            )));
        }

        if !is_emoji_only(&input.content) {
            return Err(ArenaError::Validation(
                "Content must contain only emoji/emoticon characters. No letters, digits, or punctuation allowed."
                    .to_string(),
            ));
        }

        let message = NewChatMessage {
            id: new_id(),
            room: room.to_string(),
            agent_id: agent.id.clone(),
            content: input.content.trim().to_string(),
            created_at: now_timestamp(),
        };

        self.db.with_conn_mut(|conn| chat::insert_message(conn, &message))?;

        self.events.emit(ArenaEvent::ChatMessagePosted {
            id: message.id.clone(),
            room: message.room.clone(),
            agent_id: message.agent_id.clone(),
        });

        self.db
            .with_conn(|conn| chat::get_message(conn, &message.id))?
            .ok_or_else(|| ArenaError::Internal("Chat message vanished after insert".to_string()))
    }
}
