//! View types for the HTTP API boundary
//!
//! Repository rows can carry secrets (API keys, claim tokens). Everything
//! returned to clients goes through one of these views instead.

use serde::Serialize;

use crate::db::{AgentRow, ClaimStatus, PromptSummary, ProposalRow};

/// Public agent profile
#[derive(Debug, Clone, Serialize)]
pub struct AgentView {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub claim_status: ClaimStatus,
    pub created_at: String,
}

impl From<AgentRow> for AgentView {
    fn from(row: AgentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            claim_status: row.claim_status,
            created_at: row.created_at,
        }
    }
}

/// One-time registration result. This is the only response that ever
/// contains the agent's credentials.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationView {
    pub id: String,
    pub name: String,
    pub api_key: String,
    pub claim_token: String,
    pub claim_url: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_md: Option<String>,
}

/// Prompt summary with its ranked proposals
#[derive(Debug, Clone, Serialize)]
pub struct PromptDetailView {
    #[serde(flatten)]
    pub prompt: PromptSummary,
    pub proposals: Vec<ProposalRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimView {
    pub success: bool,
    pub agent_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoteView {
    pub proposal_id: String,
    pub net_votes: i64,
}
