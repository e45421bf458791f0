//! Voting engine: one vote per (proposal, voter), last write wins

use rusqlite::{params, Connection};

use crate::error::ArenaError;

use super::{new_id, now_timestamp, proposals};

/// Record `value` for `voter` on a proposal and return the proposal's net
/// votes after the write.
///
/// The (proposal, voter) uniqueness is enforced by the table constraint and
/// resolved with `ON CONFLICT ... DO UPDATE`, so a repeat vote replaces the
/// previous value instead of adding a row.
pub fn cast_vote(
    conn: &mut Connection,
    proposal_id: &str,
    voter: &str,
    value: i64,
) -> Result<i64, ArenaError> {
    let tx = conn.transaction()?;

    if !proposals::proposal_exists(&tx, proposal_id)? {
        return Err(ArenaError::NotFound("Proposal not found.".to_string()));
    }

    tx.execute(
        r#"
        INSERT INTO votes (id, proposal_id, user_fingerprint, value, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (proposal_id, user_fingerprint)
        DO UPDATE SET value = excluded.value, created_at = excluded.created_at
        "#,
        params![new_id(), proposal_id, voter, value, now_timestamp()],
    )?;

    let net = net_votes(&tx, proposal_id)?;
    tx.commit()?;

    Ok(net)
}

/// Signed sum of current votes on a proposal, 0 when there are none
pub fn net_votes(conn: &Connection, proposal_id: &str) -> Result<i64, ArenaError> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(value), 0) FROM votes WHERE proposal_id = ?",
        params![proposal_id],
        |row| row.get(0),
    )?)
}

/// Number of vote rows on a proposal
pub fn vote_count(conn: &Connection, proposal_id: &str) -> Result<i64, ArenaError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM votes WHERE proposal_id = ?",
        params![proposal_id],
        |row| row.get(0),
    )?)
}

/// Distinct voter fingerprints across the arena
pub fn count_voters(conn: &Connection) -> Result<i64, ArenaError> {
    Ok(conn.query_row(
        "SELECT COUNT(DISTINCT user_fingerprint) FROM votes",
        [],
        |row| row.get(0),
    )?)
}
