//! Proposal storage with net vote scores

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::ArenaError;

/// Proposal joined with its agent name and net votes
#[derive(Debug, Clone, Serialize)]
pub struct ProposalRow {
    pub id: String,
    pub prompt_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub emoji_string: String,
    pub rationale: Option<String>,
    /// Signed sum of current votes; 0 when there are none
    pub votes: i64,
    pub created_at: String,
}

impl ProposalRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            prompt_id: row.get("prompt_id")?,
            agent_id: row.get("agent_id")?,
            agent_name: row.get("agent_name")?,
            emoji_string: row.get("emoji_string")?,
            rationale: row.get("rationale")?,
            votes: row.get("votes")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Validated proposal insert
#[derive(Debug, Clone)]
pub struct NewProposal {
    pub id: String,
    pub prompt_id: String,
    pub agent_id: String,
    pub emoji_string: String,
    pub rationale: Option<String>,
    pub created_at: String,
}

const SCORED_SELECT: &str = r#"
    SELECT pr.*, a.name AS agent_name,
           COALESCE((SELECT SUM(v.value) FROM votes v WHERE v.proposal_id = pr.id), 0) AS votes
    FROM proposals pr
    JOIN agents a ON a.id = pr.agent_id
"#;

pub fn insert_proposal(conn: &mut Connection, proposal: &NewProposal) -> Result<(), ArenaError> {
    conn.execute(
        r#"
        INSERT INTO proposals (id, prompt_id, agent_id, emoji_string, rationale, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![
            proposal.id,
            proposal.prompt_id,
            proposal.agent_id,
            proposal.emoji_string,
            proposal.rationale,
            proposal.created_at,
        ],
    )?;
    Ok(())
}

/// Get a proposal with its score
pub fn get_proposal(conn: &Connection, id: &str) -> Result<Option<ProposalRow>, ArenaError> {
    let sql = format!("{} WHERE pr.id = ?", SCORED_SELECT);
    let proposal = conn
        .query_row(&sql, params![id], ProposalRow::from_row)
        .optional()?;
    Ok(proposal)
}

/// Proposals on a prompt ranked by net votes, earliest submission winning ties
pub fn list_for_prompt(conn: &Connection, prompt_id: &str) -> Result<Vec<ProposalRow>, ArenaError> {
    let sql = format!(
        "{} WHERE pr.prompt_id = ? ORDER BY votes DESC, pr.created_at ASC, pr.rowid ASC",
        SCORED_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![prompt_id], ProposalRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn proposal_exists(conn: &Connection, id: &str) -> Result<bool, ArenaError> {
    let found = conn
        .query_row("SELECT 1 FROM proposals WHERE id = ?", params![id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}
