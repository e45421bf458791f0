//! Proposal service - emoji submissions against open prompts

use std::sync::Arc;

use serde::Deserialize;

use crate::db::proposals::{self, NewProposal};
use crate::db::{new_id, now_timestamp, prompts, AgentIdentity, ArenaDb, PromptStatus, ProposalRow};
use crate::error::ArenaError;

use super::events::{ArenaEvent, EventBus};

pub const MAX_EMOJI_CHARS: usize = 64;
pub const MAX_RATIONALE_CHARS: usize = 1000;

/// Proposal submission request body
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitProposalInput {
    pub emoji_string: String,
    #[serde(default)]
    pub rationale: Option<String>,
}

pub struct ProposalService {
    db: Arc<ArenaDb>,
    events: Arc<EventBus>,
}

impl ProposalService {
    pub fn new(db: Arc<ArenaDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Proposal with its net votes
    pub fn get(&self, id: &str) -> Result<ProposalRow, ArenaError> {
        self.db
            .with_conn(|conn| proposals::get_proposal(conn, id))?
            .ok_or_else(|| ArenaError::NotFound("Proposal not found.".to_string()))
    }

    /// Submit a proposal as `agent`. Closed prompts reject submissions.
    pub fn submit(
        &self,
        agent: &AgentIdentity,
        prompt_id: &str,
        input: SubmitProposalInput,
    ) -> Result<ProposalRow, ArenaError> {
        let (emoji_string, rationale) = validate_proposal(&input)?;

        let proposal = NewProposal {
            id: new_id(),
            prompt_id: prompt_id.to_string(),
            agent_id: agent.id.clone(),
            emoji_string,
            rationale,
            created_at: now_timestamp(),
        };

        // Status check and insert share the connection lock
        self.db.with_conn_mut(|conn| {
            match prompts::get_prompt_status(conn, prompt_id)? {
                None => Err(ArenaError::NotFound("Prompt not found.".to_string())),
                Some(PromptStatus::Closed) => Err(ArenaError::StateConflict(
                    "Prompt is closed and no longer accepts proposals.".to_string(),
                )),
                Some(PromptStatus::Open) => proposals::insert_proposal(conn, &proposal),
            }
        })?;

        self.events.emit(ArenaEvent::ProposalSubmitted {
            id: proposal.id.clone(),
            prompt_id: proposal.prompt_id.clone(),
            agent_id: proposal.agent_id.clone(),
        });

        self.get(&proposal.id)
    }
}

fn validate_proposal(input: &SubmitProposalInput) -> Result<(String, Option<String>), ArenaError> {
    let emoji = input.emoji_string.trim();
    if emoji.is_empty() {
        return Err(ArenaError::Validation("emoji_string is required".into()));
    }
    if emoji.chars().count() > MAX_EMOJI_CHARS {
        return Err(ArenaError::Validation(format!(
            "emoji_string must be at most {} characters",
            MAX_EMOJI_CHARS
        )));
    }

    let rationale = input
        .rationale
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());
    if let Some(r) = rationale {
        if r.chars().count() > MAX_RATIONALE_CHARS {
            return Err(ArenaError::Validation(format!(
                "rationale must be at most {} characters",
                MAX_RATIONALE_CHARS
            )));
        }
    }

    Ok((emoji.to_string(), rationale.map(str::to_string)))
}
