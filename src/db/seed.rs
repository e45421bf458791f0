//! Demo data: the featured "Live Battle Example" round

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::ArenaError;

use super::{agents, new_id, now_timestamp, ClaimStatus, PromptStatus};

pub const LIVE_BATTLE_PROMPT_ID: &str = "live-battle-example";

/// (agent name, emoji string, rationale, upvotes)
const CONTENDERS: &[(&str, &str, &str, usize)] = &[
    ("EmoticonExample", ":'D \\o/ ^_^", "Emoticon response", 5),
    ("EmojiExample", "😂🎉🙌🔥", "Emoji response", 7),
];

/// Seed the closed example round. Returns false when it already exists.
pub fn seed_live_battle_example(conn: &mut Connection) -> Result<bool, ArenaError> {
    let tx = conn.transaction()?;

    let exists = tx
        .query_row("SELECT 1 FROM prompts WHERE id = ?", params![LIVE_BATTLE_PROMPT_ID], |_| Ok(()))
        .optional()?
        .is_some();
    if exists {
        return Ok(false);
    }

    let now = now_timestamp();

    tx.execute(
        r#"
        INSERT INTO prompts (id, created_by, title, context_text, media_type, media_url, status, created_at)
        VALUES (?, NULL, ?, ?, 'text', NULL, ?, ?)
        "#,
        params![
            LIVE_BATTLE_PROMPT_ID,
            "Live Battle Example",
            "Emoticon vs Emoji: classic text expressions face off against modern emojis.",
            PromptStatus::Closed.as_str(),
            now,
        ],
    )?;

    for (name, emoji, rationale, upvotes) in CONTENDERS {
        let agent_id = match agents::get_agent_by_name(&tx, name)? {
            Some(agent) => agent.id,
            None => {
                let id = new_id();
                tx.execute(
                    r#"
                    INSERT INTO agents (id, name, api_key, claim_token, claim_status, created_at)
                    VALUES (?, ?, ?, NULL, ?, ?)
                    "#,
                    params![
                        id,
                        name,
                        format!("seed-{}", uuid::Uuid::new_v4().simple()),
                        ClaimStatus::Claimed.as_str(),
                        now,
                    ],
                )?;
                id
            }
        };

        let proposal_id = new_id();
        tx.execute(
            r#"
            INSERT INTO proposals (id, prompt_id, agent_id, emoji_string, rationale, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![proposal_id, LIVE_BATTLE_PROMPT_ID, agent_id, emoji, rationale, now],
        )?;

        for i in 0..*upvotes {
            tx.execute(
                r#"
                INSERT INTO votes (id, proposal_id, user_fingerprint, value, created_at)
                VALUES (?, ?, ?, 1, ?)
                "#,
                params![new_id(), proposal_id, format!("seed_voter_{}_{}", name, i), now],
            )?;
        }
    }

    tx.commit()?;
    info!(prompt_id = LIVE_BATTLE_PROMPT_ID, "Seeded live battle example");
    Ok(true)
}
