//! Decision Strategies
//!
//! The agent delegates per-token buy/watch/skip decisions to a pluggable
//! strategy. The rule-based implementation is always available and serves as
//! the fallback for the advisory strategy; the agent's liveness never
//! depends on a remote service.

use async_trait::async_trait;

use crate::domain::{RiskLevel, Token};

/// What to do about a candidate token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionAction {
    Buy,
    Watch,
    Skip,
}

/// A strategy's verdict on one token
#[derive(Debug, Clone)]
pub struct TradeDecision {
    pub action: DecisionAction,
    /// Confidence, 0-100
    pub confidence: u8,
    /// One-line rationale
    pub reasoning: String,
    /// Base-currency size for buys
    pub size: Option<f64>,
}

impl TradeDecision {
    pub fn skip(reasoning: impl Into<String>) -> Self {
        Self {
            action: DecisionAction::Skip,
            confidence: 0,
            reasoning: reasoning.into(),
            size: None,
        }
    }
}

/// Pluggable decision seam between the agent and its brains
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionStrategy: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &str;

    /// Decide what to do about a newly discovered token
    async fn decide(&self, token: &Token) -> TradeDecision;
}

/// Additive-scoring strategy tuned for brand-new launches.
///
/// Very fresh tokens score stronger than moderately fresh ones; zero
/// liquidity and zero holders carry no penalty because every launch starts
/// there. A small random bonus keeps exploration in the mix.
#[derive(Debug, Clone)]
pub struct RuleBasedStrategy {
    max_trade_size: f64,
    exploration_chance: f64,
}

impl RuleBasedStrategy {
    pub fn new(max_trade_size: f64) -> Self {
        Self {
            max_trade_size,
            exploration_chance: 0.10,
        }
    }

    /// Override the random exploration chance (0 disables it)
    pub fn with_exploration_chance(mut self, chance: f64) -> Self {
        self.exploration_chance = chance;
        self
    }

    pub fn max_trade_size(&self) -> f64 {
        self.max_trade_size
    }

    fn score(&self, token: &Token) -> (i32, Vec<&'static str>) {
        let mut score = 50i32;
        let mut reasons = Vec::new();

        let age_minutes = token.age_minutes(chrono::Utc::now());
        if age_minutes < 1.0 {
            score += 25;
            reasons.push("just launched");
        } else if age_minutes <= 3.0 {
            score += 20;
            reasons.push("very fresh");
        } else if age_minutes <= 10.0 {
            score += 10;
            reasons.push("still early");
        } else if age_minutes > 60.0 {
            score -= 30;
            reasons.push("too old");
        }

        if token.liquidity >= 20.0 {
            score += 20;
            reasons.push("strong liq");
        } else if token.liquidity >= 5.0 {
            score += 10;
            reasons.push("has liquidity");
        } else if token.liquidity > 0.0 {
            score += 5;
        }

        if token.holders >= 50 {
            score += 15;
            reasons.push("growing community");
        } else if token.holders >= 10 {
            score += 5;
        }

        if token.risk == RiskLevel::Safe {
            score += 10;
        }

        if token.price_change_24h > 100.0 {
            score += 15;
            reasons.push("pumping");
        } else if token.price_change_24h > 20.0 {
            score += 5;
        }

        if rand::random::<f64>() < self.exploration_chance {
            score += 20;
            reasons.push("YOLO");
        }

        (score, reasons)
    }
}

#[async_trait]
impl DecisionStrategy for RuleBasedStrategy {
    fn name(&self) -> &str {
        "rule-based"
    }

    async fn decide(&self, token: &Token) -> TradeDecision {
        let (score, reasons) = self.score(token);
        let reasoning = |fallback: &str| {
            if reasons.is_empty() {
                fallback.to_string()
            } else {
                reasons
                    .iter()
                    .take(3)
                    .copied()
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        };

        if score >= 60 {
            let size: f64 = if score >= 80 { 0.15 } else { 0.1 };
            TradeDecision {
                action: DecisionAction::Buy,
                confidence: score.min(95) as u8,
                reasoning: reasoning("looks promising"),
                size: Some(size.min(self.max_trade_size)),
            }
        } else if score >= 40 {
            TradeDecision {
                action: DecisionAction::Watch,
                confidence: score.clamp(0, 100) as u8,
                reasoning: reasoning("monitoring"),
                size: None,
            }
        } else {
            TradeDecision {
                action: DecisionAction::Skip,
                confidence: score.clamp(0, 100) as u8,
                reasoning: reasoning("doesn't meet criteria"),
                size: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TokenSource;
    use chrono::{Duration, Utc};

    fn token(age_minutes: i64, liquidity: f64, holders: u64) -> Token {
        let mut t = Token {
            address: "mint1".to_string(),
            symbol: "$TEST".to_string(),
            name: "Test".to_string(),
            decimals: 6,
            source: TokenSource::PumpFun,
            created_at: Utc::now() - Duration::minutes(age_minutes),
            price: 0.001,
            price_change_24h: 0.0,
            market_cap: 100_000.0,
            volume_24h: 0.0,
            liquidity,
            holders,
            risk: RiskLevel::Unknown,
            risk_reasons: vec![],
            image_url: None,
            website: None,
            twitter: None,
        };
        t.rescore_risk();
        t
    }

    fn strategy() -> RuleBasedStrategy {
        RuleBasedStrategy::new(0.5).with_exploration_chance(0.0)
    }

    #[tokio::test]
    async fn test_fresh_liquid_token_is_buy() {
        // 50 + 25 (age) + 20 (liq) + 15 (holders) + 10 (safe) = 120
        let decision = strategy().decide(&token(0, 100.0, 500)).await;
        assert_eq!(decision.action, DecisionAction::Buy);
        assert_eq!(decision.confidence, 95);
        // High score sizes up, still capped by max trade size
        assert_eq!(decision.size, Some(0.15));
        assert!(decision.reasoning.contains("just launched"));
    }

    #[tokio::test]
    async fn test_size_capped_by_max_trade_size() {
        let strategy = RuleBasedStrategy::new(0.05).with_exploration_chance(0.0);
        let decision = strategy.decide(&token(0, 100.0, 500)).await;
        assert_eq!(decision.size, Some(0.05));
    }

    #[tokio::test]
    async fn test_moderate_token_is_watch() {
        // 50 + 0 (30m old) + 5 (tiny liq) = 55 -> watch
        let mut t = token(30, 0.5, 0);
        t.risk = RiskLevel::Risky;
        let decision = strategy().decide(&t).await;
        assert_eq!(decision.action, DecisionAction::Watch);
    }

    #[tokio::test]
    async fn test_old_empty_token_is_skip() {
        // 50 - 30 (too old) = 20 -> skip
        let mut t = token(120, 0.0, 0);
        t.risk = RiskLevel::Danger;
        let decision = strategy().decide(&t).await;
        assert_eq!(decision.action, DecisionAction::Skip);
        assert!(decision.reasoning.contains("too old"));
    }

    #[tokio::test]
    async fn test_momentum_bonus() {
        // 50 - 30 (old) + 20 (liq) + 15 (holders) + 10 (safe) + 15 (pump) = 80
        let mut t = token(120, 100.0, 500);
        t.price_change_24h = 150.0;
        let decision = strategy().decide(&t).await;
        assert_eq!(decision.action, DecisionAction::Buy);
        assert!(decision.reasoning.contains("pumping"));
    }

    #[tokio::test]
    async fn test_exploration_bonus_forced() {
        // With the chance pinned to 1.0 the bonus always lands:
        // 50 + 20 (YOLO) = 70 for a token that would otherwise sit at 50
        let strategy = RuleBasedStrategy::new(0.5).with_exploration_chance(1.0);
        let mut t = token(30, 0.0, 0);
        t.risk = RiskLevel::Risky;
        let decision = strategy.decide(&t).await;
        assert_eq!(decision.action, DecisionAction::Buy);
        assert!(decision.reasoning.contains("YOLO"));
    }
}
