//! Vote service - signed votes keyed by voter fingerprint

use std::sync::Arc;

use serde::Deserialize;

use crate::db::{votes, ArenaDb};
use crate::error::ArenaError;
use crate::views::VoteView;

use super::events::{ArenaEvent, EventBus};

pub const MAX_FINGERPRINT_CHARS: usize = 256;

/// Vote request body
#[derive(Debug, Clone, Deserialize)]
pub struct CastVoteInput {
    pub value: i64,
    pub user_fingerprint: String,
}

pub struct VoteService {
    db: Arc<ArenaDb>,
    events: Arc<EventBus>,
}

impl VoteService {
    pub fn new(db: Arc<ArenaDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Record a vote and return the proposal's net votes after it
    pub fn cast(&self, proposal_id: &str, input: CastVoteInput) -> Result<VoteView, ArenaError> {
        if input.value != 1 && input.value != -1 {
            return Err(ArenaError::Validation("value must be 1 or -1".into()));
        }

        let voter = input.user_fingerprint.trim();
        if voter.is_empty() {
            return Err(ArenaError::Validation("user_fingerprint is required".into()));
        }
        if voter.chars().count() > MAX_FINGERPRINT_CHARS {
            return Err(ArenaError::Validation(format!(
                "user_fingerprint must be at most {} characters",
                MAX_FINGERPRINT_CHARS
            )));
        }

        let net_votes = self
            .db
            .with_conn_mut(|conn| votes::cast_vote(conn, proposal_id, voter, input.value))?;

        self.events.emit(ArenaEvent::VoteCast {
            proposal_id: proposal_id.to_string(),
            value: input.value,
            net_votes,
        });

        Ok(VoteView {
            proposal_id: proposal_id.to_string(),
            net_votes,
        })
    }
}
