//! Activity Log
//!
//! Append-only human-readable event log tied optionally to a portfolio.
//! Observability and replay only; nothing reads it for control flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Activity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Trade,
    Scan,
    Blocked,
    Alert,
    Snipe,
    Exit,
    Rug,
}

/// One log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: u64,
    /// Portfolio this entry belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_id: Option<u64>,
    pub kind: ActivityKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
