//! Opportunity Derivation
//!
//! A scored, time-boxed suggestion derived from a freshly scanned token.
//! Opportunities are never updated after creation and are garbage-collected
//! once expired.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::token::{RiskLevel, Token};

/// How long an opportunity stays actionable
pub const OPPORTUNITY_TTL_SECS: i64 = 5 * 60;

/// Classification of a detected opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    NewLaunch,
    PriceDip,
    VolumeSpike,
    Breakout,
    Arbitrage,
}

/// Suggested response to an opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestedAction {
    Buy,
    Watch,
    Avoid,
}

/// A scored, expiring suggestion to act on a discovered asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    /// Unique id
    pub id: u64,
    /// The token this opportunity refers to
    pub token: Token,
    /// Classification
    pub kind: OpportunityKind,
    /// Score, 0-100
    pub score: u8,
    /// Human-readable rationale
    pub reason: String,
    /// Suggested response
    pub suggested_action: SuggestedAction,
    /// Suggested base-currency size (0 when not buy-suggested)
    pub suggested_size: f64,
    /// When this opportunity stops being actionable
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Opportunity {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Derive an opportunity from a scanned token, if it qualifies.
///
/// Danger-tier tokens and tokens with liquidity below 5 never qualify.
/// Scoring starts at 50 with bonuses for freshness, liquidity, and momentum;
/// a strong 24h move reclassifies the kind to breakout.
pub fn evaluate_opportunity(id: u64, token: &Token, now: DateTime<Utc>) -> Option<Opportunity> {
    if token.risk == RiskLevel::Danger || token.liquidity < 5.0 {
        return None;
    }

    let mut score: u32 = 50;
    let mut kind = OpportunityKind::NewLaunch;
    let mut reason = String::new();

    let age_minutes = token.age_minutes(now);
    if age_minutes < 30.0 {
        score += 20;
        reason = format!("New ({}m ago)", age_minutes.round() as i64);
    }

    if token.liquidity > 50.0 {
        score += 15;
        if reason.is_empty() {
            reason.push_str("Good liquidity");
        } else {
            reason.push_str(" | Good liq");
        }
    }

    if token.price_change_24h > 20.0 {
        score += 15;
        kind = OpportunityKind::Breakout;
        if reason.is_empty() {
            reason = format!("+{:.0}%", token.price_change_24h);
        } else {
            reason.push_str(&format!(" | +{:.0}%", token.price_change_24h));
        }
    }

    if score < 50 {
        return None;
    }

    let buy_grade = score >= 70 && token.risk == RiskLevel::Safe;
    Some(Opportunity {
        id,
        token: token.clone(),
        kind,
        score: score.min(100) as u8,
        reason: if reason.is_empty() {
            "Meets criteria".to_string()
        } else {
            reason
        },
        suggested_action: if buy_grade {
            SuggestedAction::Buy
        } else {
            SuggestedAction::Watch
        },
        suggested_size: if score >= 70 { 0.1 } else { 0.0 },
        expires_at: now + Duration::seconds(OPPORTUNITY_TTL_SECS),
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::token::TokenSource;

    fn token(liquidity: f64, holders: u64, market_cap: f64, age_minutes: i64) -> Token {
        let now = Utc::now();
        let mut t = Token {
            address: "mint1".to_string(),
            symbol: "$TEST".to_string(),
            name: "Test".to_string(),
            decimals: 6,
            source: TokenSource::PumpFun,
            created_at: now - Duration::minutes(age_minutes),
            price: 0.0001,
            price_change_24h: 0.0,
            market_cap,
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

    #[test]
    fn test_danger_never_qualifies() {
        let t = token(1.0, 500, 1_000_000.0, 5);
        assert!(evaluate_opportunity(1, &t, Utc::now()).is_none());
    }

    #[test]
    fn test_low_liquidity_never_qualifies() {
        let mut t = token(100.0, 500, 1_000_000.0, 5);
        t.liquidity = 4.0;
        // Keep the safe tier from construction to isolate the liquidity gate
        t.risk = RiskLevel::Safe;
        assert!(evaluate_opportunity(1, &t, Utc::now()).is_none());
    }

    #[test]
    fn test_fresh_liquid_safe_token_is_buy_grade() {
        let t = token(100.0, 500, 1_000_000.0, 5);
        let opp = evaluate_opportunity(1, &t, Utc::now()).unwrap();
        // 50 + 20 (fresh) + 15 (liquidity)
        assert_eq!(opp.score, 85);
        assert_eq!(opp.suggested_action, SuggestedAction::Buy);
        assert_eq!(opp.suggested_size, 0.1);
        assert_eq!(opp.kind, OpportunityKind::NewLaunch);
    }

    #[test]
    fn test_breakout_reclassification() {
        let mut t = token(100.0, 500, 1_000_000.0, 120);
        t.price_change_24h = 45.0;
        let opp = evaluate_opportunity(1, &t, Utc::now()).unwrap();
        assert_eq!(opp.kind, OpportunityKind::Breakout);
        // 50 + 15 (liquidity) + 15 (momentum)
        assert_eq!(opp.score, 80);
        assert!(opp.reason.contains("+45%"));
    }

    #[test]
    fn test_risky_token_is_watch_even_at_high_score() {
        // Risky tier (low-ish liquidity), fresh: scores 70 but must not be buy
        let t = token(10.0, 500, 1_000_000.0, 5);
        assert_eq!(t.risk, RiskLevel::Risky);
        let opp = evaluate_opportunity(1, &t, Utc::now()).unwrap();
        assert_eq!(opp.suggested_action, SuggestedAction::Watch);
    }

    #[test]
    fn test_stale_quiet_token_is_watch_with_zero_size() {
        // No bonuses at all: base score 50, watch, no size
        let t = token(30.0, 500, 1_000_000.0, 120);
        let opp = evaluate_opportunity(1, &t, Utc::now()).unwrap();
        assert_eq!(opp.score, 50);
        assert_eq!(opp.suggested_action, SuggestedAction::Watch);
        assert_eq!(opp.suggested_size, 0.0);
        assert_eq!(opp.reason, "Meets criteria");
    }

    #[test]
    fn test_expiry() {
        let t = token(100.0, 500, 1_000_000.0, 5);
        let now = Utc::now();
        let opp = evaluate_opportunity(1, &t, now).unwrap();
        assert!(!opp.is_expired(now));
        assert!(opp.is_expired(now + Duration::seconds(OPPORTUNITY_TTL_SECS + 1)));
    }
}
