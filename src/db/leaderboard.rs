//! Scoring and ranking: proposal scores rolled up into the agent leaderboard
//!
//! A proposal "wins" when its net votes equal the highest net votes among the
//! proposals on its prompt, so every tied top scorer counts as a winner.
//! Agents are ordered by total score, then wins, then registration order.

use rusqlite::{Connection, Row};
use serde::Serialize;

use crate::error::ArenaError;

/// One ranked agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position, no gaps
    pub rank: u32,
    pub agent_id: String,
    pub agent_name: String,
    pub wins: i64,
    pub proposals: i64,
    pub total_score: i64,
    pub win_rate: String,
}

struct AgentTotals {
    agent_id: String,
    agent_name: String,
    wins: i64,
    proposals: i64,
    total_score: i64,
}

impl AgentTotals {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            agent_id: row.get("agent_id")?,
            agent_name: row.get("agent_name")?,
            wins: row.get("wins")?,
            proposals: row.get("proposals")?,
            total_score: row.get("total_score")?,
        })
    }
}

const LEADERBOARD_SQL: &str = r#"
    WITH proposal_scores AS (
        SELECT pr.id, pr.prompt_id, pr.agent_id,
               COALESCE(SUM(v.value), 0) AS score
        FROM proposals pr
        LEFT JOIN votes v ON v.proposal_id = pr.id
        GROUP BY pr.id
    ),
    prompt_best AS (
        SELECT prompt_id, MAX(score) AS best
        FROM proposal_scores
        GROUP BY prompt_id
    )
    SELECT a.id AS agent_id,
           a.name AS agent_name,
           COUNT(ps.id) AS proposals,
           COALESCE(SUM(ps.score), 0) AS total_score,
           SUM(CASE WHEN ps.score = pb.best THEN 1 ELSE 0 END) AS wins
    FROM agents a
    JOIN proposal_scores ps ON ps.agent_id = a.id
    JOIN prompt_best pb ON pb.prompt_id = ps.prompt_id
    GROUP BY a.id
    ORDER BY total_score DESC, wins DESC, a.created_at ASC, a.rowid ASC
"#;

/// Compute the leaderboard from current store state
pub fn leaderboard(conn: &Connection) -> Result<Vec<LeaderboardEntry>, ArenaError> {
    let mut stmt = conn.prepare(LEADERBOARD_SQL)?;
    let totals = stmt
        .query_map([], AgentTotals::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(totals
        .into_iter()
        .enumerate()
        .map(|(i, t)| LeaderboardEntry {
            rank: i as u32 + 1,
            win_rate: format_win_rate(t.wins, t.proposals),
            agent_id: t.agent_id,
            agent_name: t.agent_name,
            wins: t.wins,
            proposals: t.proposals,
            total_score: t.total_score,
        })
        .collect())
}

/// Wins over proposals as a whole percentage, e.g. `"67%"`
pub fn format_win_rate(wins: i64, proposals: i64) -> String {
    if proposals <= 0 {
        return "0%".to_string();
    }
    let pct = (wins as f64 / proposals as f64) * 100.0;
    format!("{}%", pct.round() as i64)
}

/// Dashboard counters
#[derive(Debug, Clone, Serialize)]
pub struct ArenaStats {
    pub rounds: i64,
    pub agents: i64,
    pub voters: i64,
}

pub fn arena_stats(conn: &Connection) -> Result<ArenaStats, ArenaError> {
    let agents: i64 = conn.query_row("SELECT COUNT(*) FROM agents", [], |row| row.get(0))?;
    Ok(ArenaStats {
        rounds: super::prompts::count_prompts(conn)?,
        agents,
        voters: super::votes::count_voters(conn)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::prompts::{self, MediaType, NewPrompt, PromptStatus};
    use crate::db::proposals::{self, NewProposal};
    use crate::db::{agents, new_id, now_timestamp, votes, ArenaDb, NewAgent};

    struct Arena {
        db: ArenaDb,
    }

    impl Arena {
        fn new() -> Self {
            Self { db: ArenaDb::open_in_memory().unwrap() }
        }

        fn agent(&self, name: &str) -> String {
            let agent = NewAgent::for_test(name);
            self.db.with_conn_mut(|conn| agents::insert_agent(conn, &agent)).unwrap();
            agent.id
        }

        fn prompt(&self) -> String {
            let prompt = NewPrompt {
                id: new_id(),
                created_by: None,
                title: "Round".into(),
                context_text: "ctx".into(),
                media_type: MediaType::Text,
                media_url: None,
                status: PromptStatus::Open,
                created_at: now_timestamp(),
            };
            self.db.with_conn_mut(|conn| prompts::insert_prompt(conn, &prompt)).unwrap();
            prompt.id
        }

        fn proposal(&self, prompt_id: &str, agent_id: &str, net: i64) -> String {
            let proposal = NewProposal {
                id: new_id(),
                prompt_id: prompt_id.into(),
                agent_id: agent_id.into(),
                emoji_string: "✨".into(),
                rationale: None,
                created_at: now_timestamp(),
            };
            self.db.with_conn_mut(|conn| proposals::insert_proposal(conn, &proposal)).unwrap();
            let value = if net >= 0 { 1 } else { -1 };
            for i in 0..net.abs() {
                let voter = format!("{}-{}", proposal.id, i);
                self.db
                    .with_conn_mut(|conn| votes::cast_vote(conn, &proposal.id, &voter, value))
                    .unwrap();
            }
            proposal.id
        }

        fn board(&self) -> Vec<LeaderboardEntry> {
            self.db.with_conn(leaderboard).unwrap()
        }
    }

    #[test]
    fn test_empty_store_has_empty_leaderboard() {
        let arena = Arena::new();
        arena.agent("Idle");
        assert!(arena.board().is_empty());
    }

    #[test]
    fn test_higher_score_ranks_first_and_wins() {
        let arena = Arena::new();
        let a = arena.agent("A");
        let b = arena.agent("B");
        let p = arena.prompt();
        arena.proposal(&p, &a, 5);
        arena.proposal(&p, &b, 7);

        let board = arena.board();
        assert_eq!(board.len(), 2);

        assert_eq!(board[0].agent_name, "B");
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[0].wins, 1);
        assert_eq!(board[0].total_score, 7);
        assert_eq!(board[0].win_rate, "100%");

        assert_eq!(board[1].agent_name, "A");
        assert_eq!(board[1].rank, 2);
        assert_eq!(board[1].wins, 0);
        assert_eq!(board[1].win_rate, "0%");
    }

    #[test]
    fn test_tied_top_scorers_all_win() {
        let arena = Arena::new();
        let a = arena.agent("A");
        let b = arena.agent("B");
        let p = arena.prompt();
        arena.proposal(&p, &a, 3);
        arena.proposal(&p, &b, 3);

        let board = arena.board();
        assert!(board.iter().all(|e| e.wins == 1));
        // equal score and wins: earlier registration ranks first
        assert_eq!(board[0].agent_name, "A");
    }

    #[test]
    fn test_equal_score_ranks_by_wins_before_registration() {
        let arena = Arena::new();
        let runner_up = arena.agent("RunnerUp");
        let winner = arena.agent("Winner");
        let champion = arena.agent("Champion");

        // RunnerUp scores 3 but loses its round; Winner scores 3 and wins its own
        let p1 = arena.prompt();
        arena.proposal(&p1, &runner_up, 3);
        arena.proposal(&p1, &champion, 5);
        let p2 = arena.prompt();
        arena.proposal(&p2, &winner, 3);

        let board = arena.board();
        let order: Vec<_> = board.iter().map(|e| (e.agent_name.as_str(), e.total_score, e.wins)).collect();
        assert_eq!(
            order,
            vec![("Champion", 5, 1), ("Winner", 3, 1), ("RunnerUp", 3, 0)]
        );
        assert_eq!(board[1].rank, 2);
        assert_eq!(board[2].rank, 3);
    }

    #[test]
    fn test_total_score_sums_across_prompts() {
        let arena = Arena::new();
        let a = arena.agent("A");
        let b = arena.agent("B");
        let p1 = arena.prompt();
        let p2 = arena.prompt();
        let p3 = arena.prompt();
        arena.proposal(&p1, &a, 4);
        arena.proposal(&p1, &b, 1);
        arena.proposal(&p2, &a, -2);
        arena.proposal(&p2, &b, 0);
        arena.proposal(&p3, &a, 1);

        let board = arena.board();
        let a_entry = board.iter().find(|e| e.agent_name == "A").unwrap();
        assert_eq!(a_entry.proposals, 3);
        assert_eq!(a_entry.total_score, 3);
        assert_eq!(a_entry.wins, 2);
        assert_eq!(a_entry.win_rate, "67%");
    }

    #[test]
    fn test_ranks_are_dense_and_scores_non_increasing() {
        let arena = Arena::new();
        let p = arena.prompt();
        for (i, net) in [2, -1, 6, 0, 2].iter().enumerate() {
            let agent = arena.agent(&format!("agent-{}", i));
            arena.proposal(&p, &agent, *net);
        }

        let board = arena.board();
        for (i, entry) in board.iter().enumerate() {
            assert_eq!(entry.rank as usize, i + 1);
        }
        assert!(board.windows(2).all(|w| w[0].total_score >= w[1].total_score));
    }

    #[test]
    fn test_win_rate_formatting() {
        assert_eq!(format_win_rate(0, 0), "0%");
        assert_eq!(format_win_rate(1, 3), "33%");
        assert_eq!(format_win_rate(2, 2), "100%");
    }
}
