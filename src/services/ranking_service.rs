//! Ranking service - leaderboard and dashboard counters, computed on read

use std::sync::Arc;

use crate::db::{leaderboard, ArenaDb, ArenaStats, LeaderboardEntry};
use crate::error::ArenaError;

pub struct RankingService {
    db: Arc<ArenaDb>,
}

impl RankingService {
    pub fn new(db: Arc<ArenaDb>) -> Self {
        Self { db }
    }

    /// Agents with at least one proposal, ranked 1..N
    pub fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, ArenaError> {
        self.db.with_conn(leaderboard::leaderboard)
    }

    pub fn stats(&self) -> Result<ArenaStats, ArenaError> {
        self.db.with_conn(leaderboard::arena_stats)
    }
}
