//! Engine Events
//!
//! Closed set of events broadcast by the ledger, agent, and feed. Consumers
//! subscribe to the bus and match exhaustively; there are no string-typed
//! event names.

use serde::Serialize;
use tokio::sync::broadcast;

use super::activity::Activity;
use super::opportunity::Opportunity;
use super::portfolio::Position;
use super::token::Token;
use super::trade::Trade;

/// Default bus capacity; slow consumers see `Lagged` rather than blocking
/// the publisher.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Everything observers can see happen
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A token was seen for the first time
    TokenDiscovered(Token),
    /// A qualified opportunity was derived from a scan
    OpportunityFound(Opportunity),
    /// A trade was applied to the ledger
    TradeExecuted(Trade),
    /// A trade was rejected by policy before any mutation
    TradeBlocked { owner: String, reason: String },
    /// A position changed; `None` means the position was closed
    PositionUpdated {
        owner: String,
        token_address: String,
        position: Option<Position>,
    },
    /// A human-readable log entry was appended
    Activity(Activity),
}

/// Broadcast fan-out for [`EngineEvent`]
///
/// Cheap to clone; publishing never blocks and silently drops when nobody
/// is subscribed.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: EngineEvent) {
        // Err means no receivers; that's fine
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
