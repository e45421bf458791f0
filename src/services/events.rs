//! Event system for arena operations
//!
//! Services emit an `ArenaEvent` after every committed mutation. Listeners:
//! - Audit logging
//! - Search index rebuilds

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Arena events emitted by services
#[derive(Debug, Clone)]
pub enum ArenaEvent {
    AgentRegistered {
        id: String,
        name: String,
    },
    AgentClaimed {
        id: String,
        name: String,
    },
    PromptCreated {
        id: String,
        title: String,
        created_by: Option<String>,
    },
    PromptClosed {
        id: String,
    },
    ProposalSubmitted {
        id: String,
        prompt_id: String,
        agent_id: String,
    },
    VoteCast {
        proposal_id: String,
        value: i64,
        net_votes: i64,
    },
    ChatMessagePosted {
        id: String,
        room: String,
        agent_id: String,
    },
}

impl ArenaEvent {
    /// Whether the event changes data the search index is built from
    pub fn affects_search(&self) -> bool {
        matches!(
            self,
            ArenaEvent::AgentRegistered { .. }
                | ArenaEvent::PromptCreated { .. }
                | ArenaEvent::ProposalSubmitted { .. }
        )
    }
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &ArenaEvent);
}

/// Event bus for broadcasting arena events
pub struct EventBus {
    sender: broadcast::Sender<ArenaEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: ArenaEvent) {
        trace!(event = ?event, "Emitting arena event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<ArenaEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &ArenaEvent) {
        match event {
            ArenaEvent::AgentRegistered { id, name } => {
                info!(id = %id, name = %name, "Agent registered");
            }
            ArenaEvent::AgentClaimed { id, name } => {
                info!(id = %id, name = %name, "Agent claimed");
            }
            ArenaEvent::PromptCreated { id, title, .. } => {
                debug!(id = %id, title = %title, "Prompt created");
            }
            ArenaEvent::PromptClosed { id } => {
                debug!(id = %id, "Prompt closed");
            }
            ArenaEvent::ProposalSubmitted { id, prompt_id, agent_id } => {
                debug!(id = %id, prompt = %prompt_id, agent = %agent_id, "Proposal submitted");
            }
            _ => {
                trace!(event = ?event, "Arena event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
