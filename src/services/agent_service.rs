//! Agent service - registration, claiming and API key authentication

use std::sync::Arc;

use rand::RngCore;
use serde::Deserialize;

use crate::db::{agents, new_id, now_timestamp, AgentIdentity, ArenaDb, ClaimStatus, NewAgent};
use crate::error::ArenaError;
use crate::views::{AgentView, ClaimView, RegistrationView};

use super::events::{ArenaEvent, EventBus};

pub const MAX_NAME_CHARS: usize = 64;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

const API_KEY_BYTES: usize = 32;
const CLAIM_TOKEN_BYTES: usize = 24;
const CLAIM_TOKEN_PREFIX: &str = "mojify_claim_";

/// Registration request body
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAgentInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Agent service for identity operations
pub struct AgentService {
    db: Arc<ArenaDb>,
    events: Arc<EventBus>,
    frontend_url: String,
}

impl AgentService {
    pub fn new(db: Arc<ArenaDb>, events: Arc<EventBus>, frontend_url: &str) -> Self {
        Self {
            db,
            events,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// All agents, newest first
    pub fn list(&self) -> Result<Vec<AgentView>, ArenaError> {
        let rows = self.db.with_conn(agents::list_agents)?;
        Ok(rows.into_iter().map(AgentView::from).collect())
    }

    pub fn get(&self, id: &str) -> Result<AgentView, ArenaError> {
        self.db
            .with_conn(|conn| agents::get_agent(conn, id))?
            .map(AgentView::from)
            .ok_or_else(|| ArenaError::NotFound("Agent not found.".to_string()))
    }

    /// Resolve a presented credential to its agent
    pub fn authenticate(&self, api_key: &str) -> Result<AgentIdentity, ArenaError> {
        self.db
            .with_conn(|conn| agents::find_by_api_key(conn, api_key))?
            .ok_or_else(|| ArenaError::Unauthorized("Invalid API key.".to_string()))
    }

    /// Authenticate when a key is required
    pub fn require(&self, api_key: Option<&str>) -> Result<AgentIdentity, ArenaError> {
        match api_key {
            Some(key) => self.authenticate(key),
            None => Err(ArenaError::Unauthorized(
                "Missing API key. Use X-API-Key or Authorization: Bearer.".to_string(),
            )),
        }
    }

    /// Authenticate when a key is optional; an unknown key means anonymous
    pub fn optional(&self, api_key: Option<&str>) -> Result<Option<AgentIdentity>, ArenaError> {
        match api_key {
            Some(key) => self.db.with_conn(|conn| agents::find_by_api_key(conn, key)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Register a new agent and mint its credentials
    pub fn register(&self, input: RegisterAgentInput) -> Result<RegistrationView, ArenaError> {
        let (name, description) = validate_registration(&input)?;

        let api_key = random_hex(API_KEY_BYTES);
        let claim_token = format!("{}{}", CLAIM_TOKEN_PREFIX, random_hex(CLAIM_TOKEN_BYTES));

        let agent = NewAgent {
            id: new_id(),
            name,
            description,
            api_key,
            claim_token: Some(claim_token.clone()),
            claim_status: ClaimStatus::PendingClaim,
            created_at: now_timestamp(),
        };

        self.db.with_conn_mut(|conn| agents::insert_agent(conn, &agent))?;

        self.events.emit(ArenaEvent::AgentRegistered {
            id: agent.id.clone(),
            name: agent.name.clone(),
        });

        Ok(RegistrationView {
            claim_url: format!("{}/claim/{}", self.frontend_url, claim_token),
            id: agent.id,
            name: agent.name,
            api_key: agent.api_key,
            claim_token,
            created_at: agent.created_at,
            skill_md: None,
        })
    }

    /// Consume a claim token
    pub fn claim(&self, claim_token: &str) -> Result<ClaimView, ArenaError> {
        let identity = self
            .db
            .with_conn_mut(|conn| agents::claim_agent(conn, claim_token))?
            .ok_or_else(|| ArenaError::NotFound("Invalid or expired claim link.".to_string()))?;

        self.events.emit(ArenaEvent::AgentClaimed {
            id: identity.id.clone(),
            name: identity.name.clone(),
        });

        Ok(ClaimView {
            success: true,
            agent_name: identity.name,
            message: "Agent claimed successfully.".to_string(),
        })
    }
}

// =========================================================================
// Validation
// =========================================================================

fn validate_registration(input: &RegisterAgentInput) -> Result<(String, Option<String>), ArenaError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ArenaError::Validation("name is required".into()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ArenaError::Validation(format!(
            "name must be at most {} characters",
            MAX_NAME_CHARS
        )));
    }

    let description = input
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    if let Some(d) = description {
        if d.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(ArenaError::Validation(format!(
                "description must be at most {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }
    }

    Ok((name.to_string(), description.map(str::to_string)))
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
