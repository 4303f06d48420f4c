//! Token Registry
//!
//! The deduplication and lookup surface for discovered tokens plus the
//! store of active opportunities. Upserts are keyed by address: a new token
//! keeps its identity fields forever; later scans only refresh the market
//! snapshot. Expired opportunities are swept every scan cycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{Opportunity, Token};

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First sighting; identity fields recorded
    Discovered,
    /// Known token; market snapshot refreshed in place
    Refreshed,
}

/// In-memory registry of discovered tokens and active opportunities
#[derive(Debug, Default)]
pub struct TokenRegistry {
    tokens: RwLock<HashMap<String, Token>>,
    opportunities: RwLock<Vec<Opportunity>>,
    next_opportunity_id: AtomicU64,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            opportunities: RwLock::new(Vec::new()),
            next_opportunity_id: AtomicU64::new(1),
        }
    }

    /// Insert a new token or refresh a known one's market snapshot.
    ///
    /// Identity fields (symbol, name, decimals, source, created_at) of a
    /// known token are never touched.
    pub async fn upsert(&self, incoming: Token) -> UpsertOutcome {
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(&incoming.address) {
            Some(existing) => {
                existing.price = incoming.price;
                existing.price_change_24h = incoming.price_change_24h;
                existing.market_cap = incoming.market_cap;
                existing.volume_24h = incoming.volume_24h;
                existing.liquidity = incoming.liquidity;
                if incoming.holders > 0 {
                    existing.holders = incoming.holders;
                }
                existing.rescore_risk();
                UpsertOutcome::Refreshed
            }
            None => {
                tokens.insert(incoming.address.clone(), incoming);
                UpsertOutcome::Discovered
            }
        }
    }

    /// Refresh just the last-seen price of a known token (push trade stream)
    pub async fn update_price(&self, address: &str, price: f64) -> bool {
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(address) {
            Some(token) if price > 0.0 => {
                token.price = price;
                true
            }
            _ => false,
        }
    }

    pub async fn get(&self, address: &str) -> Option<Token> {
        self.tokens.read().await.get(address).cloned()
    }

    pub async fn contains(&self, address: &str) -> bool {
        self.tokens.read().await.contains_key(address)
    }

    pub async fn token_count(&self) -> usize {
        self.tokens.read().await.len()
    }

    /// Most recently discovered tokens first
    pub async fn recent(&self, limit: usize) -> Vec<Token> {
        let tokens = self.tokens.read().await;
        let mut all: Vec<Token> = tokens.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        all
    }

    /// Allocate an id for a new opportunity
    pub fn next_opportunity_id(&self) -> u64 {
        self.next_opportunity_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn add_opportunity(&self, opportunity: Opportunity) {
        self.opportunities.write().await.push(opportunity);
    }

    /// Unexpired opportunities, best score first
    pub async fn active_opportunities(&self, now: DateTime<Utc>) -> Vec<Opportunity> {
        let opportunities = self.opportunities.read().await;
        let mut active: Vec<Opportunity> = opportunities
            .iter()
            .filter(|o| !o.is_expired(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.score.cmp(&a.score));
        active
    }

    /// Drop expired opportunities, returning how many were removed
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut opportunities = self.opportunities.write().await;
        let before = opportunities.len();
        opportunities.retain(|o| !o.is_expired(now));
        before - opportunities.len()
    }
}
