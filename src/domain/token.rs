//! Canonical Token Record
//!
//! Every discovery source (push feed, HTTP aggregators) is normalized into
//! this shape before anything downstream sees it. Risk tiering is a pure
//! function of the market snapshot so it can be re-scored on every refresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse risk classification for a discovered token
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Risky,
    Danger,
    Unknown,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Safe => write!(f, "safe"),
            RiskLevel::Risky => write!(f, "risky"),
            RiskLevel::Danger => write!(f, "danger"),
            RiskLevel::Unknown => write!(f, "unknown"),
        }
    }
}

/// Which feed produced a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSource {
    /// Real-time launch stream
    PumpFun,
    /// HTTP aggregator scan
    Raydium,
    /// Unknown origin
    Unknown,
}

/// A discovered asset, keyed by address
///
/// Identity fields (address, symbol, name, decimals, source, created_at) are
/// set once on first discovery. Market-snapshot fields are refreshed in place
/// by later scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Mint address, the unique key
    pub address: String,
    /// Display symbol (normalized with a leading `$`)
    pub symbol: String,
    /// Full token name
    pub name: String,
    /// Token decimals
    pub decimals: u8,
    /// Feed that discovered this token
    pub source: TokenSource,
    /// First-seen / launch timestamp
    pub created_at: DateTime<Utc>,
    // Market snapshot
    /// Last reported price in SOL
    pub price: f64,
    /// 24h price change percentage
    pub price_change_24h: f64,
    /// Market capitalization in USD
    pub market_cap: f64,
    /// 24h volume
    pub volume_24h: f64,
    /// Liquidity proxy in SOL
    pub liquidity: f64,
    /// Holder count (0 = unknown)
    pub holders: u64,
    /// Current risk tier
    pub risk: RiskLevel,
    /// Human-readable reasons for the tier
    pub risk_reasons: Vec<String>,
    // Metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

impl Token {
    /// Token age in whole minutes relative to `now`
    pub fn age_minutes(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_milliseconds() as f64 / 60_000.0
    }

    /// Re-score risk from the current market snapshot
    pub fn rescore_risk(&mut self) {
        self.risk = assess_risk(self.liquidity, self.holders, self.market_cap);
        self.risk_reasons = risk_reasons(self.liquidity, self.holders, self.market_cap);
    }
}

/// Tiered risk assessment from the market snapshot.
///
/// Evaluated liquidity-first, then holders, then market cap; any single
/// breach downgrades the tier. A zero holder count or market cap means
/// "unknown" - brand-new assets legitimately start at zero - and never by
/// itself forces a tier.
pub fn assess_risk(liquidity: f64, holders: u64, market_cap: f64) -> RiskLevel {
    if liquidity < 5.0 {
        return RiskLevel::Danger;
    }
    if holders > 0 && holders < 30 {
        return RiskLevel::Danger;
    }
    if market_cap > 0.0 && market_cap < 10_000.0 {
        return RiskLevel::Danger;
    }

    if liquidity < 20.0 {
        return RiskLevel::Risky;
    }
    if holders > 0 && holders < 100 {
        return RiskLevel::Risky;
    }
    if market_cap > 0.0 && market_cap < 50_000.0 {
        return RiskLevel::Risky;
    }

    RiskLevel::Safe
}

/// Human-readable reasons matching [`assess_risk`]
pub fn risk_reasons(liquidity: f64, holders: u64, market_cap: f64) -> Vec<String> {
    let mut reasons = Vec::new();
    if liquidity < 5.0 {
        reasons.push("Very low liquidity".to_string());
    } else if liquidity < 20.0 {
        reasons.push("Low liquidity".to_string());
    }
    if holders > 0 && holders < 30 {
        reasons.push("Very few holders".to_string());
    } else if holders > 0 && holders < 100 {
        reasons.push("Few holders".to_string());
    }
    if market_cap > 0.0 && market_cap < 10_000.0 {
        reasons.push("Micro cap".to_string());
    } else if market_cap > 0.0 && market_cap < 50_000.0 {
        reasons.push("Low cap".to_string());
    }
    reasons
}
