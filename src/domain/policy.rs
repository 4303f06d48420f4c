//! Risk Policy
//!
//! One policy per account identity. Read on every trade attempt, mutated
//! only through explicit updates with partial-update semantics: fields left
//! out of an update keep their stored values.

use serde::{Deserialize, Serialize};

use super::token::RiskLevel;

/// Trading style selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Conservative,
    Moderate,
    Aggressive,
    Degen,
}

/// Fractions of a position to liquidate at each multiplier threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitLadder {
    /// Fraction sold when the position reaches 2x
    pub at_2x: f64,
    /// Fraction sold when the position reaches 5x
    pub at_5x: f64,
    /// Fraction sold when the position reaches 10x
    pub at_10x: f64,
}

impl Default for ProfitLadder {
    fn default() -> Self {
        Self {
            at_2x: 0.25,
            at_5x: 0.5,
            at_10x: 1.0,
        }
    }
}

/// Risk policy for one identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePolicy {
    /// Owning identity
    pub owner: String,
    /// Maximum base-currency spend per trade
    pub max_trade_size: f64,
    /// Maximum base-currency spend per rolling 24h window
    pub daily_limit: f64,
    /// Maximum tolerated slippage, percent
    pub slippage_cap: f64,
    /// Allowed token symbols ("ALL" or specific)
    pub allowed_tokens: Vec<String>,
    /// Allowed venues
    pub allowed_dexes: Vec<String>,
    /// Trading style
    pub autonomous_mode: TradingMode,
    /// Optional profit-taking ladder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_taking: Option<ProfitLadder>,
    /// Minimum liquidity filter for candidates
    pub min_liquidity: f64,
    /// Minimum holder-count filter for candidates
    pub min_holders: u64,
    /// Strictest acceptable risk tier
    pub max_risk: RiskLevel,
    /// When paused, no policy checks run and the agent stands down
    pub is_paused: bool,
}

impl TradePolicy {
    /// Documented defaults applied on first write for an identity
    pub fn defaults(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            max_trade_size: 0.5,
            daily_limit: 2.0,
            slippage_cap: 1.0,
            allowed_tokens: vec!["SOL".to_string(), "USDC".to_string()],
            allowed_dexes: vec!["jupiter".to_string(), "raydium".to_string()],
            autonomous_mode: TradingMode::Moderate,
            profit_taking: None,
            min_liquidity: 10.0,
            min_holders: 50,
            max_risk: RiskLevel::Risky,
            is_paused: false,
        }
    }

    /// Merge a partial update into this policy. Omitted fields keep their
    /// stored values.
    pub fn apply(&mut self, update: PolicyUpdate) {
        if let Some(v) = update.max_trade_size {
            self.max_trade_size = v;
        }
        if let Some(v) = update.daily_limit {
            self.daily_limit = v;
        }
        if let Some(v) = update.slippage_cap {
            self.slippage_cap = v;
        }
        if let Some(v) = update.allowed_tokens {
            self.allowed_tokens = v;
        }
        if let Some(v) = update.allowed_dexes {
            self.allowed_dexes = v;
        }
        if let Some(v) = update.autonomous_mode {
            self.autonomous_mode = v;
        }
        if let Some(v) = update.profit_taking {
            self.profit_taking = Some(v);
        }
        if let Some(v) = update.min_liquidity {
            self.min_liquidity = v;
        }
        if let Some(v) = update.min_holders {
            self.min_holders = v;
        }
        if let Some(v) = update.max_risk {
            self.max_risk = v;
        }
        if let Some(v) = update.is_paused {
            self.is_paused = v;
        }
    }
}

/// Partial policy update; `None` means "leave unchanged"
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyUpdate {
    pub max_trade_size: Option<f64>,
    pub daily_limit: Option<f64>,
    pub slippage_cap: Option<f64>,
    pub allowed_tokens: Option<Vec<String>>,
    pub allowed_dexes: Option<Vec<String>>,
    pub autonomous_mode: Option<TradingMode>,
    pub profit_taking: Option<ProfitLadder>,
    pub min_liquidity: Option<f64>,
    pub min_holders: Option<u64>,
    pub max_risk: Option<RiskLevel>,
    pub is_paused: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = TradePolicy::defaults("owner1");
        assert_eq!(policy.max_trade_size, 0.5);
        assert_eq!(policy.daily_limit, 2.0);
        assert_eq!(policy.slippage_cap, 1.0);
        assert_eq!(policy.autonomous_mode, TradingMode::Moderate);
        assert!(!policy.is_paused);
    }

    #[test]
    fn test_partial_update_leaves_omitted_fields() {
        let mut policy = TradePolicy::defaults("owner1");
        policy.apply(PolicyUpdate {
            daily_limit: Some(5.0),
            is_paused: Some(true),
            ..Default::default()
        });

        assert_eq!(policy.daily_limit, 5.0);
        assert!(policy.is_paused);
        // Untouched fields keep their defaults
        assert_eq!(policy.max_trade_size, 0.5);
        assert_eq!(policy.allowed_tokens, vec!["SOL", "USDC"]);
    }

    #[test]
    fn test_ladder_update() {
        let mut policy = TradePolicy::defaults("owner1");
        assert!(policy.profit_taking.is_none());

        policy.apply(PolicyUpdate {
            profit_taking: Some(ProfitLadder {
                at_2x: 0.1,
                at_5x: 0.3,
                at_10x: 1.0,
            }),
            ..Default::default()
        });

        let ladder = policy.profit_taking.unwrap();
        assert_eq!(ladder.at_2x, 0.1);
    }
}
