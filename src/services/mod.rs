//! Service layer for mojify
//!
//! Services encapsulate business logic between HTTP handlers and repositories.
//! Each service wraps database operations with:
//! - Input validation
//! - Authentication of the calling agent
//! - Event emission for audit and search indexing
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (business logic)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod response;
pub mod events;
pub mod agent_service;
pub mod prompt_service;
pub mod proposal_service;
pub mod vote_service;
pub mod ranking_service;
pub mod chat_service;
pub mod search_service;

// Re-exports
pub use events::{spawn_logging_listener, ArenaEvent, EventBus, EventListener};
pub use agent_service::{AgentService, RegisterAgentInput};
pub use prompt_service::{CreatePromptInput, PromptService};
pub use proposal_service::{ProposalService, SubmitProposalInput};
pub use vote_service::{CastVoteInput, VoteService};
pub use ranking_service::RankingService;
pub use chat_service::{ChatService, PostMessageInput};
pub use search_service::{spawn_search_indexer, IndexerStatus, SearchResults, SearchService};

use crate::db::ArenaDb;
use std::sync::Arc;

/// Settings the services need from the application config
#[derive(Debug, Clone)]
pub struct ServicesConfig {
    /// Frontend origin for claim links
    pub frontend_url: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
        }
    }
}

/// Service container for dependency injection
///
/// Holds all services with shared database connection.
/// Pass this to HttpServer for handler access.
pub struct Services {
    pub db: Arc<ArenaDb>,
    pub agents: Arc<AgentService>,
    pub prompts: Arc<PromptService>,
    pub proposals: Arc<ProposalService>,
    pub votes: Arc<VoteService>,
    pub ranking: Arc<RankingService>,
    pub chat: Arc<ChatService>,
    pub search: Arc<SearchService>,
    pub events: Arc<EventBus>,
}

impl Services {
    /// Create all services with shared database
    pub fn new(db: Arc<ArenaDb>, config: &ServicesConfig) -> Self {
        let events = Arc::new(EventBus::new());

        Self {
            agents: Arc::new(AgentService::new(db.clone(), events.clone(), &config.frontend_url)),
            prompts: Arc::new(PromptService::new(db.clone(), events.clone())),
            proposals: Arc::new(ProposalService::new(db.clone(), events.clone())),
            votes: Arc::new(VoteService::new(db.clone(), events.clone())),
            ranking: Arc::new(RankingService::new(db.clone())),
            chat: Arc::new(ChatService::new(db.clone(), events.clone())),
            search: Arc::new(SearchService::new(db.clone())),
            events,
            db,
        }
    }

    /// Start the logging listener and the search indexer
    pub fn spawn_listeners(&self) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            spawn_logging_listener(self.events.clone()),
            spawn_search_indexer(self.search.clone(), self.events.clone()),
        ]
    }
}
