//! Prompt service - round creation, listings and the close transition

use std::sync::Arc;

use serde::Deserialize;

use crate::db::prompts::{self, CloseOutcome, NewPrompt};
use crate::db::{new_id, now_timestamp, proposals, AgentIdentity, ArenaDb, MediaType, PromptStatus, PromptSummary, ProposalRow, SortPolicy};
use crate::error::ArenaError;
use crate::views::PromptDetailView;

use super::events::{ArenaEvent, EventBus};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_CONTEXT_CHARS: usize = 5000;
pub const MAX_MEDIA_URL_CHARS: usize = 2048;

/// Prompt creation request body
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePromptInput {
    pub title: String,
    pub context_text: String,
    #[serde(default)]
    pub media_type: MediaType,
    #[serde(default)]
    pub media_url: Option<String>,
}

/// Prompt service for round operations
pub struct PromptService {
    db: Arc<ArenaDb>,
    events: Arc<EventBus>,
}

impl PromptService {
    pub fn new(db: Arc<ArenaDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// List prompts; `status` must be `open` or `closed` when given, unknown
    /// sort names fall back to newest first
    pub fn list(&self, status: Option<&str>, sort: Option<&str>) -> Result<Vec<PromptSummary>, ArenaError> {
        let status = match status.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(PromptStatus::parse(s).ok_or_else(|| {
                ArenaError::Validation(format!("status must be 'open' or 'closed', got '{}'", s))
            })?),
            None => None,
        };
        let sort = SortPolicy::parse(sort);

        self.db.with_conn(|conn| prompts::list_prompts(conn, status, sort))
    }

    pub fn get(&self, id: &str) -> Result<PromptSummary, ArenaError> {
        self.db
            .with_conn(|conn| prompts::get_prompt(conn, id))?
            .ok_or_else(prompt_not_found)
    }

    /// Prompt plus its proposals in ranking order
    pub fn detail(&self, id: &str) -> Result<PromptDetailView, ArenaError> {
        self.db.with_conn(|conn| {
            let prompt = prompts::get_prompt(conn, id)?.ok_or_else(prompt_not_found)?;
            let proposals = proposals::list_for_prompt(conn, id)?;
            Ok(PromptDetailView { prompt, proposals })
        })
    }

    /// Proposals on a prompt, highest net votes first
    pub fn proposals(&self, id: &str) -> Result<Vec<ProposalRow>, ArenaError> {
        self.db.with_conn(|conn| {
            if prompts::get_prompt_status(conn, id)?.is_none() {
                return Err(prompt_not_found());
            }
            proposals::list_for_prompt(conn, id)
        })
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create an open prompt, owned by `owner` when the caller authenticated
    pub fn create(&self, owner: Option<&AgentIdentity>, input: CreatePromptInput) -> Result<PromptSummary, ArenaError> {
        let prompt = validate_prompt(owner, input)?;

        self.db.with_conn_mut(|conn| prompts::insert_prompt(conn, &prompt))?;

        self.events.emit(ArenaEvent::PromptCreated {
            id: prompt.id.clone(),
            title: prompt.title.clone(),
            created_by: prompt.created_by.clone(),
        });

        self.get(&prompt.id)
    }

    /// Close a prompt; closing a closed prompt is a no-op
    pub fn close(&self, id: &str) -> Result<PromptSummary, ArenaError> {
        match self.db.with_conn_mut(|conn| prompts::close_prompt(conn, id))? {
            CloseOutcome::Missing => return Err(prompt_not_found()),
            CloseOutcome::Closed => self.events.emit(ArenaEvent::PromptClosed { id: id.to_string() }),
            CloseOutcome::AlreadyClosed => {}
        }

        self.get(id)
    }
}

fn prompt_not_found() -> ArenaError {
    ArenaError::NotFound("Prompt not found.".to_string())
}

// =========================================================================
// Validation
// =========================================================================

fn validate_prompt(owner: Option<&AgentIdentity>, input: CreatePromptInput) -> Result<NewPrompt, ArenaError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ArenaError::Validation("title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ArenaError::Validation(format!(
            "title must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }

    let context_text = input.context_text.trim();
    if context_text.is_empty() {
        return Err(ArenaError::Validation("context_text is required".into()));
    }
    if context_text.chars().count() > MAX_CONTEXT_CHARS {
        return Err(ArenaError::Validation(format!(
            "context_text must be at most {} characters",
            MAX_CONTEXT_CHARS
        )));
    }

    let media_url = input
        .media_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    if let Some(ref url) = media_url {
        if url.chars().count() > MAX_MEDIA_URL_CHARS {
            return Err(ArenaError::Validation(format!(
                "media_url must be at most {} characters",
                MAX_MEDIA_URL_CHARS
            )));
        }
    }

    Ok(NewPrompt {
        id: new_id(),
        created_by: owner.map(|a| a.id.clone()),
        title: title.to_string(),
        context_text: context_text.to_string(),
        media_type: input.media_type,
        media_url,
        status: PromptStatus::Open,
        created_at: now_timestamp(),
    })
}
