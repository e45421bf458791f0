//! Prompt storage and activity-sorted listings

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ArenaError;

/// Listing cap for every sort policy
pub const PROMPT_LIST_LIMIT: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Text,
    Image,
    Audio,
    Video,
    Url,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Text => "text",
            MediaType::Image => "image",
            MediaType::Audio => "audio",
            MediaType::Video => "video",
            MediaType::Url => "url",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MediaType::Text),
            "image" => Some(MediaType::Image),
            "audio" => Some(MediaType::Audio),
            "video" => Some(MediaType::Video),
            "url" => Some(MediaType::Url),
            _ => None,
        }
    }
}

/// Prompt lifecycle; `Open -> Closed` is the only transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStatus {
    Open,
    Closed,
}

impl PromptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptStatus::Open => "open",
            PromptStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(PromptStatus::Open),
            "closed" => Some(PromptStatus::Closed),
            _ => None,
        }
    }
}

/// Ordering applied to prompt listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortPolicy {
    #[default]
    New,
    Hot,
    Trending,
}

impl SortPolicy {
    /// Unknown or missing names fall back to `New`
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(str::trim) {
            Some("hot") => SortPolicy::Hot,
            Some("trending") => SortPolicy::Trending,
            _ => SortPolicy::New,
        }
    }

    // Prompts without proposals go last under the activity sorts, even
    // below prompts whose net total is negative.
    fn order_by(&self) -> &'static str {
        match self {
            SortPolicy::New => "p.created_at DESC, p.rowid DESC",
            SortPolicy::Hot => {
                "(proposal_count = 0) ASC, total_votes DESC, proposal_count DESC, p.created_at DESC, p.rowid DESC"
            }
            SortPolicy::Trending => {
                "(proposal_count = 0) ASC, total_votes DESC, p.created_at DESC, p.rowid DESC"
            }
        }
    }
}

/// Prompt with its activity aggregates
#[derive(Debug, Clone, Serialize)]
pub struct PromptSummary {
    pub id: String,
    pub created_by: Option<String>,
    pub title: String,
    pub context_text: String,
    pub media_type: String,
    pub media_url: Option<String>,
    pub status: String,
    pub proposal_count: i64,
    pub total_votes: i64,
    pub created_at: String,
}

impl PromptSummary {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            created_by: row.get("created_by")?,
            title: row.get("title")?,
            context_text: row.get("context_text")?,
            media_type: row.get("media_type")?,
            media_url: row.get("media_url")?,
            status: row.get("status")?,
            proposal_count: row.get("proposal_count")?,
            total_votes: row.get("total_votes")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn is_open(&self) -> bool {
        self.status == PromptStatus::Open.as_str()
    }
}

/// Validated prompt insert
#[derive(Debug, Clone)]
pub struct NewPrompt {
    pub id: String,
    pub created_by: Option<String>,
    pub title: String,
    pub context_text: String,
    pub media_type: MediaType,
    pub media_url: Option<String>,
    pub status: PromptStatus,
    pub created_at: String,
}

// Aggregates are scalar subqueries so that joining votes never inflates the
// proposal count.
const SUMMARY_SELECT: &str = r#"
    SELECT p.*,
           (SELECT COUNT(*) FROM proposals pr WHERE pr.prompt_id = p.id) AS proposal_count,
           (SELECT COALESCE(SUM(v.value), 0)
              FROM votes v
              JOIN proposals pr ON pr.id = v.proposal_id
             WHERE pr.prompt_id = p.id) AS total_votes
    FROM prompts p
"#;

pub fn insert_prompt(conn: &mut Connection, prompt: &NewPrompt) -> Result<(), ArenaError> {
    conn.execute(
        r#"
        INSERT INTO prompts (id, created_by, title, context_text, media_type, media_url, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            prompt.id,
            prompt.created_by,
            prompt.title,
            prompt.context_text,
            prompt.media_type.as_str(),
            prompt.media_url,
            prompt.status.as_str(),
            prompt.created_at,
        ],
    )?;
    Ok(())
}

/// Get a prompt with aggregates
pub fn get_prompt(conn: &Connection, id: &str) -> Result<Option<PromptSummary>, ArenaError> {
    let sql = format!("{} WHERE p.id = ?", SUMMARY_SELECT);
    let prompt = conn
        .query_row(&sql, params![id], PromptSummary::from_row)
        .optional()?;
    Ok(prompt)
}

/// Current status of a prompt, None if it does not exist
pub fn get_prompt_status(conn: &Connection, id: &str) -> Result<Option<PromptStatus>, ArenaError> {
    let status: Option<String> = conn
        .query_row("SELECT status FROM prompts WHERE id = ?", params![id], |row| row.get(0))
        .optional()?;
    Ok(status.as_deref().and_then(PromptStatus::parse))
}

/// List prompts under a sort policy, optionally filtered by status
pub fn list_prompts(
    conn: &Connection,
    status: Option<PromptStatus>,
    sort: SortPolicy,
) -> Result<Vec<PromptSummary>, ArenaError> {
    let mut sql = String::from(SUMMARY_SELECT);
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];

    if let Some(status) = status {
        sql.push_str(" WHERE p.status = ?");
        params.push(Box::new(status.as_str()));
    }

    sql.push_str(&format!(" ORDER BY {} LIMIT ?", sort.order_by()));
    params.push(Box::new(PROMPT_LIST_LIMIT));

    debug!("Executing query: {}", sql);

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), PromptSummary::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Result of a close request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// This call moved the prompt from open to closed
    Closed,
    AlreadyClosed,
    Missing,
}

/// Close a prompt. Only the call whose UPDATE flips `open` to `closed`
/// reports `Closed`; concurrent or repeated closes see `AlreadyClosed`.
pub fn close_prompt(conn: &mut Connection, id: &str) -> Result<CloseOutcome, ArenaError> {
    let tx = conn.transaction()?;

    let changed = tx.execute(
        "UPDATE prompts SET status = ?1 WHERE id = ?2 AND status = ?3",
        params![PromptStatus::Closed.as_str(), id, PromptStatus::Open.as_str()],
    )?;

    let outcome = if changed > 0 {
        CloseOutcome::Closed
    } else {
        let exists = tx
            .query_row("SELECT 1 FROM prompts WHERE id = ?", params![id], |_| Ok(()))
            .optional()?
            .is_some();
        if exists {
            CloseOutcome::AlreadyClosed
        } else {
            CloseOutcome::Missing
        }
    };

    tx.commit()?;
    Ok(outcome)
}

/// Number of prompts ("rounds") ever created
pub fn count_prompts(conn: &Connection) -> Result<i64, ArenaError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM prompts", [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{agents, new_id, now_timestamp, proposals, votes, ArenaDb, NewAgent};

    fn prompt(title: &str) -> NewPrompt {
        NewPrompt {
            id: new_id(),
            created_by: None,
            title: title.to_string(),
            context_text: "context".to_string(),
            media_type: MediaType::Text,
            media_url: None,
            status: PromptStatus::Open,
            created_at: now_timestamp(),
        }
    }

    fn seed_prompt_with_votes(db: &ArenaDb, title: &str, agent_id: &str, proposals_votes: &[i64]) -> String {
        let p = prompt(title);
        db.with_conn_mut(|conn| insert_prompt(conn, &p)).unwrap();
        for (i, &net) in proposals_votes.iter().enumerate() {
            let proposal = proposals::NewProposal {
                id: new_id(),
                prompt_id: p.id.clone(),
                agent_id: agent_id.to_string(),
                emoji_string: "🔥".to_string(),
                rationale: None,
                created_at: now_timestamp(),
            };
            db.with_conn_mut(|conn| proposals::insert_proposal(conn, &proposal)).unwrap();
            let value = if net >= 0 { 1 } else { -1 };
            for v in 0..net.abs() {
                let voter = format!("{}-{}-{}", title, i, v);
                db.with_conn_mut(|conn| votes::cast_vote(conn, &proposal.id, &voter, value)).unwrap();
            }
        }
        p.id
    }

    fn setup() -> (ArenaDb, String) {
        let db = ArenaDb::open_in_memory().unwrap();
        let agent = NewAgent::for_test("Lister");
        db.with_conn_mut(|conn| agents::insert_agent(conn, &agent)).unwrap();
        (db, agent.id)
    }

    #[test]
    fn test_sort_policy_falls_back_to_new() {
        assert_eq!(SortPolicy::parse(Some("hot")), SortPolicy::Hot);
        assert_eq!(SortPolicy::parse(Some("trending")), SortPolicy::Trending);
        assert_eq!(SortPolicy::parse(Some("bogus")), SortPolicy::New);
        assert_eq!(SortPolicy::parse(None), SortPolicy::New);
    }

    #[test]
    fn test_new_orders_by_creation_desc() {
        let (db, agent) = setup();
        let first = seed_prompt_with_votes(&db, "first", &agent, &[]);
        let second = seed_prompt_with_votes(&db, "second", &agent, &[]);

        let listed = db.with_conn(|conn| list_prompts(conn, None, SortPolicy::New)).unwrap();
        let ids: Vec<_> = listed.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn test_hot_breaks_vote_ties_by_proposal_count() {
        let (db, agent) = setup();
        let one_proposal = seed_prompt_with_votes(&db, "one", &agent, &[2]);
        let two_proposals = seed_prompt_with_votes(&db, "two", &agent, &[1, 1]);
        let empty = seed_prompt_with_votes(&db, "empty", &agent, &[]);

        let hot = db.with_conn(|conn| list_prompts(conn, None, SortPolicy::Hot)).unwrap();
        let ids: Vec<_> = hot.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec![two_proposals.clone(), one_proposal.clone(), empty.clone()]);

        // trending ignores proposal count: equal votes fall back to recency
        let trending = db.with_conn(|conn| list_prompts(conn, None, SortPolicy::Trending)).unwrap();
        let ids: Vec<_> = trending.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec![two_proposals, one_proposal, empty]);
    }

    #[test]
    fn test_empty_prompt_sorts_below_negative_total() {
        let (db, agent) = setup();
        let disliked = seed_prompt_with_votes(&db, "disliked", &agent, &[-1]);
        let empty = seed_prompt_with_votes(&db, "empty", &agent, &[]);

        for sort in [SortPolicy::Hot, SortPolicy::Trending] {
            let listed = db.with_conn(|conn| list_prompts(conn, None, sort)).unwrap();
            let ids: Vec<_> = listed.iter().map(|p| p.id.clone()).collect();
            assert_eq!(ids, vec![disliked.clone(), empty.clone()], "{:?}", sort);
            assert_eq!(listed[0].total_votes, -1);
        }
    }

    #[test]
    fn test_aggregates_do_not_multiply() {
        let (db, agent) = setup();
        let id = seed_prompt_with_votes(&db, "agg", &agent, &[3, 2]);

        let summary = db.with_conn(|conn| get_prompt(conn, &id)).unwrap().unwrap();
        assert_eq!(summary.proposal_count, 2);
        assert_eq!(summary.total_votes, 5);
    }

    #[test]
    fn test_empty_prompt_has_zero_aggregates() {
        let (db, agent) = setup();
        let id = seed_prompt_with_votes(&db, "none", &agent, &[]);
        let summary = db.with_conn(|conn| get_prompt(conn, &id)).unwrap().unwrap();
        assert_eq!(summary.proposal_count, 0);
        assert_eq!(summary.total_votes, 0);
    }

    #[test]
    fn test_status_filter_and_close() {
        let (db, agent) = setup();
        let open = seed_prompt_with_votes(&db, "open", &agent, &[]);
        let closing = seed_prompt_with_votes(&db, "closing", &agent, &[]);

        assert_eq!(db.with_conn_mut(|conn| close_prompt(conn, &closing)).unwrap(), CloseOutcome::Closed);
        assert_eq!(
            db.with_conn_mut(|conn| close_prompt(conn, &closing)).unwrap(),
            CloseOutcome::AlreadyClosed
        );
        assert_eq!(db.with_conn_mut(|conn| close_prompt(conn, "missing")).unwrap(), CloseOutcome::Missing);

        let open_only = db
            .with_conn(|conn| list_prompts(conn, Some(PromptStatus::Open), SortPolicy::New))
            .unwrap();
        assert_eq!(open_only.len(), 1);
        assert_eq!(open_only[0].id, open);

        let status = db.with_conn(|conn| get_prompt_status(conn, &closing)).unwrap();
        assert_eq!(status, Some(PromptStatus::Closed));
    }

    #[test]
    fn test_listing_is_capped() {
        let (db, agent) = setup();
        for i in 0..(PROMPT_LIST_LIMIT + 5) {
            seed_prompt_with_votes(&db, &format!("p{}", i), &agent, &[]);
        }
        let listed = db.with_conn(|conn| list_prompts(conn, None, SortPolicy::Hot)).unwrap();
        assert_eq!(listed.len() as i64, PROMPT_LIST_LIMIT);
    }
}
