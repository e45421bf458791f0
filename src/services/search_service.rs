//! Search service and the background indexer
//!
//! The indexer subscribes to the event bus, coalesces bursts of mutation
//! events into one rebuild, and runs the rebuild on the blocking pool.
//! Failures are recorded in `IndexerStatus` and never reach the request
//! that triggered them.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::db::search::{self, DEFAULT_SEARCH_LIMIT, ENTITY_TYPES, MAX_SEARCH_LIMIT};
use crate::db::{ArenaDb, SearchHit, SearchQuery};
use crate::error::ArenaError;

use super::events::EventBus;

/// Outcome counters for background rebuilds
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexerStatus {
    pub runs: u64,
    pub failures: u64,
    pub last_indexed: Option<usize>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub results: Vec<SearchHit>,
}

pub struct SearchService {
    db: Arc<ArenaDb>,
    status: Mutex<IndexerStatus>,
}

impl SearchService {
    pub fn new(db: Arc<ArenaDb>) -> Self {
        Self {
            db,
            status: Mutex::new(IndexerStatus::default()),
        }
    }

    /// Substring search over the index
    pub fn search(&self, q: &str, entity_type: Option<&str>, limit: Option<u32>) -> Result<SearchResults, ArenaError> {
        let q = q.trim();
        if q.is_empty() {
            return Err(ArenaError::Validation("q is required".into()));
        }

        let entity_type = match entity_type.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) if ENTITY_TYPES.contains(&t) => Some(t.to_string()),
            Some(t) => {
                return Err(ArenaError::Validation(format!(
                    "type must be one of {}, got '{}'",
                    ENTITY_TYPES.join(", "),
                    t
                )))
            }
            None => None,
        };

        let query = SearchQuery {
            q: q.to_string(),
            entity_type,
            limit: limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT),
        };

        let results = self.db.with_conn(|conn| search::search(conn, &query))?;
        Ok(SearchResults { query: query.q, results })
    }

    /// Rebuild the index now and record the outcome
    pub fn rebuild(&self) -> Result<usize, ArenaError> {
        let result = self.db.with_conn_mut(search::rebuild_search_index);
        self.record(&result);
        result
    }

    pub fn status(&self) -> IndexerStatus {
        match self.status.lock() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, result: &Result<usize, ArenaError>) {
        let mut status = match self.status.lock() {
            Ok(status) => status,
            Err(poisoned) => poisoned.into_inner(),
        };
        status.runs += 1;
        match result {
            Ok(count) => status.last_indexed = Some(*count),
            Err(e) => {
                status.failures += 1;
                status.last_error = Some(e.to_string());
            }
        }
    }
}

/// Spawn the background task that keeps the search index fresh
pub fn spawn_search_indexer(search: Arc<SearchService>, event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) if event.affects_search() => {}
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Search indexer lagged, rebuilding");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping search indexer");
                    break;
                }
            }

            // Anything already queued is covered by the rebuild below
            loop {
                match receiver.try_recv() {
                    Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }

            let search = search.clone();
            match tokio::task::spawn_blocking(move || search.rebuild()).await {
                Ok(Ok(count)) => debug!(entries = count, "Search index rebuilt"),
                Ok(Err(e)) => warn!(error = %e, "Search index rebuild failed"),
                Err(e) => warn!(error = %e, "Search index task panicked"),
            }
        }
    })
}
