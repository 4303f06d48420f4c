//! Trade Records
//!
//! Immutable append-only records of every executed buy/sell. The historical
//! ledger for audit and replay; never mutated after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    /// Spend base currency to acquire the asset
    Buy,
    /// Liquidate asset quantity for base currency
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// What initiated a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TradeSource {
    /// Explicit user request
    Manual,
    /// Autonomous agent entry
    Auto,
    /// Dollar-cost-average schedule
    Dca,
    /// Profit-taking ladder exit
    ProfitTake,
    /// Stop-loss or dead-position exit
    StopLoss,
}

impl std::fmt::Display for TradeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSource::Manual => write!(f, "manual"),
            TradeSource::Auto => write!(f, "auto"),
            TradeSource::Dca => write!(f, "dca"),
            TradeSource::ProfitTake => write!(f, "profit-take"),
            TradeSource::StopLoss => write!(f, "stop-loss"),
        }
    }
}

/// A single executed paper trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Unique trade id
    pub id: u64,
    /// Owning portfolio id
    pub portfolio_id: u64,
    /// Traded token address
    pub token_address: String,
    /// Traded token symbol
    pub token_symbol: String,
    /// Direction
    pub side: TradeSide,
    /// Asset quantity moved
    pub quantity: f64,
    /// Execution price in base currency per token
    pub price: f64,
    /// Base-currency value (spend for buys, proceeds for sells)
    pub value: f64,
    /// Realized profit/loss in base currency (sells only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    /// Proceeds-to-cost-basis ratio (sells only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    /// What initiated this trade
    pub source: TradeSource,
    /// Free-text rationale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Execution timestamp
    pub executed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_display() {
        assert_eq!(TradeSide::Buy.to_string(), "BUY");
        assert_eq!(TradeSide::Sell.to_string(), "SELL");
    }

    #[test]
    fn test_source_serde_kebab_case() {
        let json = serde_json::to_string(&TradeSource::ProfitTake).unwrap();
        assert_eq!(json, "\"profit-take\"");
        let back: TradeSource = serde_json::from_str("\"stop-loss\"").unwrap();
        assert_eq!(back, TradeSource::StopLoss);
    }
}
