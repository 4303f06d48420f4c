//! Trading Engine Layer
//!
//! The paper trading ledger and its snapshot persistence. The ledger is the
//! single writer for portfolio, position, trade, policy, and activity state.

pub mod ledger;
pub mod snapshot;

pub use ledger::{LedgerState, PaperLedger, PortfolioStats, TradeError};
pub use snapshot::SnapshotError;
