//! Denormalized text index over agents, prompts and proposals
//!
//! The index is derived data: it is rebuilt wholesale from the primary
//! tables by the background indexer and never consulted by the primary
//! read paths.

use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::error::ArenaError;

pub const DEFAULT_SEARCH_LIMIT: u32 = 20;
pub const MAX_SEARCH_LIMIT: u32 = 100;

/// Entity kinds carried by the index
pub const ENTITY_TYPES: &[&str] = &["agent", "prompt", "proposal"];

/// One search result
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub entity_type: String,
    pub entity_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
}

impl SearchHit {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let body: String = row.get("body")?;
        Ok(Self {
            entity_type: row.get("entity_type")?,
            entity_id: row.get("entity_id")?,
            title: row.get("title")?,
            snippet: if body.is_empty() { None } else { Some(snippet(&body)) },
            score: row.get("score")?,
            prompt_id: row.get("prompt_id")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub q: String,
    pub entity_type: Option<String>,
    pub limit: u32,
}

const SNIPPET_CHARS: usize = 160;

fn snippet(body: &str) -> String {
    if body.chars().count() <= SNIPPET_CHARS {
        return body.to_string();
    }
    let mut out: String = body.chars().take(SNIPPET_CHARS).collect();
    out.push('…');
    out
}

/// Source rows for the index, one SELECT per entity kind
const INDEX_SOURCES: &[&str] = &[
    "SELECT 'agent', id, name, COALESCE(description, ''), NULL FROM agents",
    "SELECT 'prompt', id, title, context_text, id FROM prompts",
    r#"SELECT 'proposal', pr.id, pr.emoji_string,
              COALESCE(pr.rationale, '') || ' ' || a.name,
              pr.prompt_id
       FROM proposals pr
       JOIN agents a ON a.id = pr.agent_id"#,
];

/// Unicode case folding applied to both indexed text and queries.
/// SQLite's `lower()` only folds ASCII, so folding happens here.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Replace every index row from the primary tables in one transaction.
/// Returns the number of indexed entities.
pub fn rebuild_search_index(conn: &mut Connection) -> Result<usize, ArenaError> {
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM search_index", [])?;

    let mut indexed = 0;
    {
        let mut insert = tx.prepare(
            r#"
            INSERT INTO search_index
                (entity_type, entity_id, title, body, title_folded, body_folded, prompt_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )?;

        for source in INDEX_SOURCES {
            let mut select = tx.prepare(source)?;
            let rows = select
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            for (entity_type, entity_id, title, body, prompt_id) in rows {
                insert.execute(params![
                    entity_type,
                    entity_id,
                    title,
                    body,
                    fold_case(&title),
                    fold_case(&body),
                    prompt_id,
                ])?;
                indexed += 1;
            }
        }
    }

    tx.commit()?;
    Ok(indexed)
}

/// Case-insensitive substring search. Title hits score 2, body hits 1.
pub fn search(conn: &Connection, query: &SearchQuery) -> Result<Vec<SearchHit>, ArenaError> {
    let pattern = format!("%{}%", escape_like(&fold_case(&query.q)));

    let mut sql = String::from(
        r#"
        SELECT * FROM (
            SELECT entity_type, entity_id, title, body, prompt_id,
                   (CASE WHEN title_folded LIKE ?1 ESCAPE '\' THEN 2 ELSE 0 END) +
                   (CASE WHEN body_folded LIKE ?1 ESCAPE '\' THEN 1 ELSE 0 END) AS score
            FROM search_index
        )
        WHERE score > 0
        "#,
    );
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(pattern)];

    if let Some(ref entity_type) = query.entity_type {
        sql.push_str(" AND entity_type = ?2");
        params.push(Box::new(entity_type.clone()));
        sql.push_str(" ORDER BY score DESC, title ASC LIMIT ?3");
    } else {
        sql.push_str(" ORDER BY score DESC, title ASC LIMIT ?2");
    }
    params.push(Box::new(query.limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let hits = stmt
        .query_map(param_refs.as_slice(), SearchHit::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(hits)
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Rows currently in the index
pub fn index_size(conn: &Connection) -> Result<i64, ArenaError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM search_index", [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::prompts::{self, MediaType, NewPrompt, PromptStatus};
    use crate::db::{agents, new_id, now_timestamp, ArenaDb, NewAgent};

    fn setup() -> ArenaDb {
        let db = ArenaDb::open_in_memory().unwrap();
        let mut agent = NewAgent::for_test("SearchBot");
        agent.description = Some("Finds the perfect party emoji".into());
        db.with_conn_mut(|conn| agents::insert_agent(conn, &agent)).unwrap();
        let prompt = NewPrompt {
            id: new_id(),
            created_by: None,
            title: "Party time".into(),
            context_text: "Friday night plans 100% confirmed".into(),
            media_type: MediaType::Text,
            media_url: None,
            status: PromptStatus::Open,
            created_at: now_timestamp(),
        };
        db.with_conn_mut(|conn| prompts::insert_prompt(conn, &prompt)).unwrap();
        db
    }

    fn query(q: &str, entity_type: Option<&str>) -> SearchQuery {
        SearchQuery {
            q: q.into(),
            entity_type: entity_type.map(String::from),
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    #[test]
    fn test_index_is_empty_until_rebuilt() {
        let db = setup();
        assert_eq!(db.with_conn(index_size).unwrap(), 0);
        let indexed = db.with_conn_mut(rebuild_search_index).unwrap();
        assert_eq!(indexed, 2);
        assert_eq!(db.with_conn_mut(rebuild_search_index).unwrap(), 2);
    }

    #[test]
    fn test_title_hits_outrank_body_hits() {
        let db = setup();
        db.with_conn_mut(rebuild_search_index).unwrap();

        let hits = db.with_conn(|conn| search(conn, &query("PARTY", None))).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entity_type, "prompt");
        assert_eq!(hits[0].score, 2);
        assert_eq!(hits[1].entity_type, "agent");
        assert_eq!(hits[1].score, 1);
    }

    #[test]
    fn test_type_filter_and_like_escaping() {
        let db = setup();
        db.with_conn_mut(rebuild_search_index).unwrap();

        let agents_only = db.with_conn(|conn| search(conn, &query("party", Some("agent")))).unwrap();
        assert_eq!(agents_only.len(), 1);

        let percent = db.with_conn(|conn| search(conn, &query("100%", None))).unwrap();
        assert_eq!(percent.len(), 1);
        let literal = db.with_conn(|conn| search(conn, &query("%", Some("agent")))).unwrap();
        assert!(literal.is_empty());
    }

    #[test]
    fn test_non_ascii_capitals_fold() {
        let db = setup();
        let prompt = NewPrompt {
            id: new_id(),
            created_by: None,
            title: "Élan Vital".into(),
            context_text: "ÜBER energy".into(),
            media_type: MediaType::Text,
            media_url: None,
            status: PromptStatus::Open,
            created_at: now_timestamp(),
        };
        db.with_conn_mut(|conn| prompts::insert_prompt(conn, &prompt)).unwrap();
        db.with_conn_mut(rebuild_search_index).unwrap();

        for q in ["Élan", "élan", "ÉLAN VITAL"] {
            let hits = db.with_conn(|conn| search(conn, &query(q, Some("prompt")))).unwrap();
            assert_eq!(hits.len(), 1, "query {:?}", q);
            assert_eq!(hits[0].title, "Élan Vital");
            assert_eq!(hits[0].score, 2);
        }

        let body = db.with_conn(|conn| search(conn, &query("über", None))).unwrap();
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].score, 1);
    }
}
