//! Agent identity and claim operations

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{is_constraint_violation, ArenaError};

/// Lifecycle of an agent's ownership claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    PendingClaim,
    Claimed,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::PendingClaim => "pending_claim",
            ClaimStatus::Claimed => "claimed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_claim" => Some(ClaimStatus::PendingClaim),
            "claimed" => Some(ClaimStatus::Claimed),
            _ => None,
        }
    }
}

/// Agent row from database (carries secrets, never serialized to clients)
#[derive(Debug, Clone)]
pub struct AgentRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub api_key: String,
    pub claim_token: Option<String>,
    pub claim_status: ClaimStatus,
    pub created_at: String,
}

impl AgentRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let status: String = row.get("claim_status")?;
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            api_key: row.get("api_key")?,
            claim_token: row.get("claim_token")?,
            claim_status: ClaimStatus::parse(&status).unwrap_or(ClaimStatus::PendingClaim),
            created_at: row.get("created_at")?,
        })
    }
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentIdentity {
    pub id: String,
    pub name: String,
}

/// Fully prepared agent insert (credentials already generated)
#[derive(Debug, Clone)]
pub struct NewAgent {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub api_key: String,
    pub claim_token: Option<String>,
    pub claim_status: ClaimStatus,
    pub created_at: String,
}

#[cfg(test)]
impl NewAgent {
    pub fn for_test(name: &str) -> Self {
        Self {
            id: super::new_id(),
            name: name.to_string(),
            description: None,
            api_key: format!("key-{}", name),
            claim_token: Some(format!("claim-{}", name)),
            claim_status: ClaimStatus::PendingClaim,
            created_at: super::now_timestamp(),
        }
    }
}

/// Insert an agent; a taken name surfaces as Conflict from the UNIQUE constraint
pub fn insert_agent(conn: &mut Connection, agent: &NewAgent) -> Result<(), ArenaError> {
    let result = conn.execute(
        r#"
        INSERT INTO agents (id, name, description, api_key, claim_token, claim_status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            agent.id,
            agent.name,
            agent.description,
            agent.api_key,
            agent.claim_token,
            agent.claim_status.as_str(),
            agent.created_at,
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => {
            if get_agent_by_name(conn, &agent.name)?.is_some() {
                Err(ArenaError::Conflict("Agent name already taken.".to_string()))
            } else {
                Err(ArenaError::Conflict("Agent credentials collided, retry registration.".to_string()))
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Get agent by ID
pub fn get_agent(conn: &Connection, id: &str) -> Result<Option<AgentRow>, ArenaError> {
    let agent = conn
        .query_row("SELECT * FROM agents WHERE id = ?", params![id], AgentRow::from_row)
        .optional()?;
    Ok(agent)
}

/// Get agent by exact name
pub fn get_agent_by_name(conn: &Connection, name: &str) -> Result<Option<AgentRow>, ArenaError> {
    let agent = conn
        .query_row("SELECT * FROM agents WHERE name = ?", params![name], AgentRow::from_row)
        .optional()?;
    Ok(agent)
}

/// Resolve the agent holding exactly this credential
pub fn find_by_api_key(conn: &Connection, api_key: &str) -> Result<Option<AgentIdentity>, ArenaError> {
    let identity = conn
        .query_row(
            "SELECT id, name FROM agents WHERE api_key = ?",
            params![api_key],
            |row| Ok(AgentIdentity { id: row.get(0)?, name: row.get(1)? }),
        )
        .optional()?;
    Ok(identity)
}

/// List agents, newest first
pub fn list_agents(conn: &Connection) -> Result<Vec<AgentRow>, ArenaError> {
    let mut stmt = conn.prepare("SELECT * FROM agents ORDER BY created_at DESC, rowid DESC")?;
    let rows = stmt
        .query_map([], AgentRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Consume a claim token. Returns the claimed agent's identity, or None when
/// the token is unknown or was already consumed.
pub fn claim_agent(conn: &mut Connection, claim_token: &str) -> Result<Option<AgentIdentity>, ArenaError> {
    let tx = conn.transaction()?;

    let identity = tx
        .query_row(
            "SELECT id, name FROM agents WHERE claim_token = ?",
            params![claim_token],
            |row| Ok(AgentIdentity { id: row.get(0)?, name: row.get(1)? }),
        )
        .optional()?;

    let Some(identity) = identity else {
        return Ok(None);
    };

    // Conditional on the token so a concurrent claim can only win once
    let changed = tx.execute(
        "UPDATE agents SET claim_status = ?, claim_token = NULL WHERE id = ? AND claim_token = ?",
        params![ClaimStatus::Claimed.as_str(), identity.id, claim_token],
    )?;

    if changed == 0 {
        return Ok(None);
    }

    tx.commit()?;
    Ok(Some(identity))
}
