//! Paper Trading Ledger
//!
//! The accounting engine. Owns all portfolio, position, trade, policy, and
//! activity state; validates and applies trades; computes aggregate
//! statistics. Trade application is serialized behind a single lock so a
//! trade is atomic from the caller's point of view: either every mutation
//! lands (including the snapshot write) or none do.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::{
    Activity, ActivityKind, EngineEvent, EventBus, Network, PolicyUpdate, Portfolio, Position,
    Trade, TradePolicy, TradeSide, TradeSource,
};
use super::snapshot::{self, SnapshotError};

/// Errors returned to trade callers. Policy and balance rejections are
/// recoverable and reported with a human-readable reason; persistence
/// failures abort the trade without applying it.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("{0}")]
    PolicyViolation(String),

    #[error("Insufficient SOL balance: have {have:.4}, need {need:.4}")]
    InsufficientFunds { have: f64, need: f64 },

    #[error("No position found for token: {0}")]
    NoPosition(String),

    #[error("Insufficient token balance: have {have:.4}, need {need:.4}")]
    InsufficientPosition { have: f64, need: f64 },

    #[error("Trade amount must be positive, got {0}")]
    InvalidAmount(f64),

    #[error("Trade price must be positive, got {0}")]
    InvalidPrice(f64),

    #[error("Persistence failure: {0}")]
    Persistence(String),
}

/// Aggregate read-model for one portfolio
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioStats {
    pub total_value: f64,
    pub sol_balance: f64,
    pub positions_value: f64,
    /// Realized plus unrealized profit/loss
    pub total_pnl: f64,
    pub total_pnl_percent: f64,
    /// Unrealized profit/loss across open positions
    pub daily_pnl: f64,
    pub daily_spent: f64,
    pub daily_remaining: f64,
    pub position_count: usize,
    /// Live win rate recomputed from open positions' pnl sign. Distinct
    /// from the running trade-level figure stored on the portfolio.
    pub win_rate: f64,
    pub best_trade: f64,
    pub rugs_avoided: u64,
}

/// Full persistable ledger state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerState {
    /// Portfolios keyed by "{owner}:{network}"
    pub portfolios: HashMap<String, Portfolio>,
    /// Policies keyed by owner
    pub policies: HashMap<String, TradePolicy>,
    pub trades: Vec<Trade>,
    pub activities: Vec<Activity>,
    pub next_portfolio_id: u64,
    pub next_trade_id: u64,
    pub next_activity_id: u64,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            portfolios: HashMap::new(),
            policies: HashMap::new(),
            trades: Vec::new(),
            activities: Vec::new(),
            next_portfolio_id: 1,
            next_trade_id: 1,
            next_activity_id: 1,
        }
    }
}

fn portfolio_key(owner: &str, network: Network) -> String {
    format!("{}:{}", owner, network)
}

/// Paper trading ledger
///
/// All mutation goes through `&self` methods that take the state lock, so
/// no two trades for the same portfolio (or any portfolio) interleave.
pub struct PaperLedger {
    state: Mutex<LedgerState>,
    events: EventBus,
    snapshot_path: Option<PathBuf>,
}

impl PaperLedger {
    /// Create an in-memory ledger (no snapshot file)
    pub fn new(events: EventBus) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            events,
            snapshot_path: None,
        }
    }

    /// Create a ledger backed by a JSON snapshot file, resuming from an
    /// existing snapshot when present.
    pub fn with_snapshot(events: EventBus, path: PathBuf) -> Result<Self, SnapshotError> {
        let state = snapshot::load(&path)?.unwrap_or_default();
        if !state.portfolios.is_empty() {
            info!(
                "Resumed ledger snapshot: {} portfolios, {} trades",
                state.portfolios.len(),
                state.trades.len()
            );
        }
        Ok(Self {
            state: Mutex::new(state),
            events,
            snapshot_path: Some(path),
        })
    }

    /// Fetch a portfolio, creating it lazily with the fixed starting balance
    pub async fn get_or_create_portfolio(&self, owner: &str, network: Network) -> Portfolio {
        let mut events = Vec::new();
        let portfolio = {
            let mut state = self.state.lock().await;
            let p = Self::ensure_portfolio(&mut state, owner, network, &mut events);
            p.clone()
        };
        self.flush(events);
        portfolio
    }

    /// Look up a portfolio without creating it
    pub async fn portfolio(&self, owner: &str, network: Network) -> Option<Portfolio> {
        let state = self.state.lock().await;
        state.portfolios.get(&portfolio_key(owner, network)).cloned()
    }

    /// Open positions for a portfolio
    pub async fn positions(&self, owner: &str, network: Network) -> Vec<Position> {
        let state = self.state.lock().await;
        state
            .portfolios
            .get(&portfolio_key(owner, network))
            .map(|p| p.positions.values().cloned().collect())
            .unwrap_or_default()
    }

    /// One open position by token address
    pub async fn position(&self, owner: &str, network: Network, address: &str) -> Option<Position> {
        let state = self.state.lock().await;
        state
            .portfolios
            .get(&portfolio_key(owner, network))
            .and_then(|p| p.positions.get(address).cloned())
    }

    /// Execute a paper trade. `amount` is the base-currency spend for buys
    /// and the asset quantity for sells.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute_trade(
        &self,
        owner: &str,
        network: Network,
        token_address: &str,
        token_symbol: &str,
        side: TradeSide,
        amount: f64,
        price: f64,
        source: TradeSource,
        reason: Option<&str>,
    ) -> Result<Trade, TradeError> {
        if amount <= 0.0 {
            return Err(TradeError::InvalidAmount(amount));
        }
        if price <= 0.0 {
            return Err(TradeError::InvalidPrice(price));
        }

        let now = Utc::now();
        let mut events = Vec::new();

        let result = {
            let mut state = self.state.lock().await;
            Self::ensure_portfolio(&mut state, owner, network, &mut events);
            let key = portfolio_key(owner, network);

            // Policy gate: buys only, and only when a policy exists and is
            // not paused.
            if side == TradeSide::Buy {
                if let Some(policy) = state.policies.get(owner).cloned() {
                    if !policy.is_paused {
                        let portfolio = state.portfolios.get_mut(&key).unwrap();
                        Self::check_daily_reset(portfolio, now);
                        if let Err(reason) = Self::validate_buy(portfolio, &policy, amount) {
                            let portfolio_id = portfolio.id;
                            Self::push_activity(
                                &mut state,
                                Some(portfolio_id),
                                ActivityKind::Blocked,
                                reason.clone(),
                                now,
                                &mut events,
                            );
                            events.push(EngineEvent::TradeBlocked {
                                owner: owner.to_string(),
                                reason: reason.clone(),
                            });
                            self.save_snapshot_best_effort(&state);
                            drop(state);
                            self.flush(events);
                            return Err(TradeError::PolicyViolation(reason));
                        }
                    }
                }
            }

            match side {
                TradeSide::Buy => self.apply_buy(
                    &mut state,
                    &key,
                    token_address,
                    token_symbol,
                    amount,
                    price,
                    source,
                    reason,
                    now,
                    &mut events,
                ),
                TradeSide::Sell => self.apply_sell(
                    &mut state,
                    &key,
                    token_address,
                    token_symbol,
                    amount,
                    price,
                    source,
                    reason,
                    now,
                    &mut events,
                ),
            }
        };

        self.flush(events);
        result
    }

    /// Derive the aggregate read-model for a portfolio
    pub async fn portfolio_stats(&self, owner: &str, network: Network) -> Option<PortfolioStats> {
        let mut state = self.state.lock().await;
        let daily_limit = state
            .policies
            .get(owner)
            .map(|p| p.daily_limit)
            .unwrap_or(2.0);

        let key = portfolio_key(owner, network);
        let portfolio = state.portfolios.get_mut(&key)?;
        Self::check_daily_reset(portfolio, Utc::now());
        let portfolio = state.portfolios.get(&key)?;

        let positions_value = portfolio.positions_value();
        let total_value = portfolio.sol_balance + positions_value;
        let unrealized = portfolio.unrealized_pnl();
        let total_pnl = unrealized + portfolio.total_pnl;
        let total_pnl_percent = if portfolio.total_deposited > 0.0 {
            (total_value - portfolio.total_deposited) / portfolio.total_deposited * 100.0
        } else {
            0.0
        };

        // Live win rate from currently open positions' pnl sign
        let position_count = portfolio.positions.len();
        let winners = portfolio.positions.values().filter(|p| p.pnl > 0.0).count();
        let win_rate = if position_count > 0 {
            winners as f64 / position_count as f64 * 100.0
        } else {
            0.0
        };

        let seed = if portfolio.best_trade > 0.0 {
            portfolio.best_trade
        } else {
            1.0
        };
        let best_trade = portfolio
            .positions
            .values()
            .map(|p| p.multiplier())
            .fold(seed, f64::max);

        Some(PortfolioStats {
            total_value,
            sol_balance: portfolio.sol_balance,
            positions_value,
            total_pnl,
            total_pnl_percent,
            daily_pnl: unrealized,
            daily_spent: portfolio.daily_spent,
            daily_remaining: (daily_limit - portfolio.daily_spent).max(0.0),
            position_count,
            win_rate,
            best_trade,
            rugs_avoided: portfolio.rugs_avoided,
        })
    }

    /// Refresh one position's mark-to-market snapshot at a new price.
    /// Returns the refreshed position, or `None` when no such position.
    pub async fn mark_position(
        &self,
        owner: &str,
        network: Network,
        address: &str,
        price: f64,
    ) -> Option<Position> {
        let mut events = Vec::new();
        let marked = {
            let mut state = self.state.lock().await;
            let key = portfolio_key(owner, network);
            let portfolio = state.portfolios.get_mut(&key)?;
            let position = portfolio.positions.get_mut(address)?;
            position.mark(price, Utc::now());
            let snapshot = position.clone();
            events.push(EngineEvent::PositionUpdated {
                owner: owner.to_string(),
                token_address: address.to_string(),
                position: Some(snapshot.clone()),
            });
            self.save_snapshot_best_effort(&state);
            Some(snapshot)
        };
        self.flush(events);
        marked
    }

    /// Current policy for an identity
    pub async fn policy(&self, owner: &str) -> Option<TradePolicy> {
        let state = self.state.lock().await;
        state.policies.get(owner).cloned()
    }

    /// Apply a partial policy update, creating the policy with documented
    /// defaults on first write. Omitted fields keep their stored values.
    pub async fn save_policy(&self, owner: &str, update: PolicyUpdate) -> TradePolicy {
        let mut state = self.state.lock().await;
        let policy = state
            .policies
            .entry(owner.to_string())
            .or_insert_with(|| TradePolicy::defaults(owner));
        policy.apply(update);
        let saved = policy.clone();
        self.save_snapshot_best_effort(&state);
        saved
    }

    /// Destructive reset: deletes all positions, trades, and activity for
    /// the portfolio and restores fresh-portfolio defaults.
    pub async fn reset_portfolio(&self, owner: &str, network: Network) {
        let mut events = Vec::new();
        {
            let mut state = self.state.lock().await;
            let key = portfolio_key(owner, network);
            let Some(portfolio) = state.portfolios.get_mut(&key) else {
                return;
            };
            let id = portfolio.id;
            let now = Utc::now();

            portfolio.positions.clear();
            portfolio.sol_balance = crate::domain::INITIAL_SOL_BALANCE;
            portfolio.total_deposited = crate::domain::INITIAL_SOL_BALANCE;
            portfolio.total_pnl = 0.0;
            portfolio.total_trades = 0;
            portfolio.win_rate = 0.0;
            portfolio.best_trade = 0.0;
            portfolio.rugs_avoided = 0;
            portfolio.daily_spent = 0.0;
            portfolio.daily_spent_reset = now;
            portfolio.updated_at = now;

            state.trades.retain(|t| t.portfolio_id != id);
            state.activities.retain(|a| a.portfolio_id != Some(id));
            Self::push_activity(
                &mut state,
                Some(id),
                ActivityKind::Alert,
                format!(
                    "Portfolio reset with {} SOL",
                    crate::domain::INITIAL_SOL_BALANCE
                ),
                now,
                &mut events,
            );
            self.save_snapshot_best_effort(&state);
        }
        self.flush(events);
    }

    /// Recent trades for a portfolio, newest first
    pub async fn trade_history(&self, owner: &str, network: Network, limit: usize) -> Vec<Trade> {
        let state = self.state.lock().await;
        let Some(portfolio) = state.portfolios.get(&portfolio_key(owner, network)) else {
            return Vec::new();
        };
        state
            .trades
            .iter()
            .rev()
            .filter(|t| t.portfolio_id == portfolio.id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Recent activity for a portfolio, newest first
    pub async fn activities(&self, owner: &str, network: Network, limit: usize) -> Vec<Activity> {
        let state = self.state.lock().await;
        let Some(portfolio) = state.portfolios.get(&portfolio_key(owner, network)) else {
            return Vec::new();
        };
        state
            .activities
            .iter()
            .rev()
            .filter(|a| a.portfolio_id == Some(portfolio.id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Append a free-text activity entry and broadcast it
    pub async fn log_activity(
        &self,
        portfolio_id: Option<u64>,
        kind: ActivityKind,
        message: impl Into<String>,
    ) {
        let mut events = Vec::new();
        {
            let mut state = self.state.lock().await;
            Self::push_activity(
                &mut state,
                portfolio_id,
                kind,
                message.into(),
                Utc::now(),
                &mut events,
            );
            self.save_snapshot_best_effort(&state);
        }
        self.flush(events);
    }

    // ---- internals -------------------------------------------------------

    fn ensure_portfolio<'a>(
        state: &'a mut LedgerState,
        owner: &str,
        network: Network,
        events: &mut Vec<EngineEvent>,
    ) -> &'a mut Portfolio {
        let key = portfolio_key(owner, network);
        if !state.portfolios.contains_key(&key) {
            let now = Utc::now();
            let id = state.next_portfolio_id;
            state.next_portfolio_id += 1;
            let portfolio = Portfolio::fresh(id, owner, network, now);
            info!(
                "Created paper portfolio for {} on {} with {} SOL",
                owner,
                network,
                crate::domain::INITIAL_SOL_BALANCE
            );
            state.portfolios.insert(key.clone(), portfolio);
            Self::push_activity(
                state,
                Some(id),
                ActivityKind::Alert,
                format!(
                    "Paper trading portfolio created with {} SOL",
                    crate::domain::INITIAL_SOL_BALANCE
                ),
                now,
                events,
            );
        }
        state.portfolios.get_mut(&key).unwrap()
    }

    /// Zero the daily spend once per rolling 24h window
    fn check_daily_reset(portfolio: &mut Portfolio, now: DateTime<Utc>) {
        if now - portfolio.daily_spent_reset >= Duration::hours(24) {
            portfolio.daily_spent = 0.0;
            portfolio.daily_spent_reset = now;
        }
    }

    fn validate_buy(portfolio: &Portfolio, policy: &TradePolicy, amount: f64) -> Result<(), String> {
        if amount > policy.max_trade_size {
            return Err(format!(
                "Trade exceeds max size ({} > {} SOL)",
                amount, policy.max_trade_size
            ));
        }
        if portfolio.daily_spent + amount > policy.daily_limit {
            return Err(format!(
                "Trade would exceed daily limit ({:.2} > {} SOL)",
                portfolio.daily_spent + amount,
                policy.daily_limit
            ));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_buy(
        &self,
        state: &mut LedgerState,
        key: &str,
        token_address: &str,
        token_symbol: &str,
        sol_amount: f64,
        price: f64,
        source: TradeSource,
        reason: Option<&str>,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<Trade, TradeError> {
        let (next_trade_id, next_activity_id) = (state.next_trade_id, state.next_activity_id);
        let portfolio = state.portfolios.get_mut(key).unwrap();
        if portfolio.sol_balance < sol_amount {
            return Err(TradeError::InsufficientFunds {
                have: portfolio.sol_balance,
                need: sol_amount,
            });
        }

        let backup = portfolio.clone();
        let quantity = sol_amount / price;

        match portfolio.positions.entry(token_address.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().apply_buy(quantity, price, sol_amount, now)
            }
            Entry::Vacant(entry) => {
                entry.insert(Position::open(
                    token_address,
                    token_symbol,
                    quantity,
                    price,
                    sol_amount,
                    now,
                ));
            }
        }

        portfolio.sol_balance -= sol_amount;
        portfolio.daily_spent += sol_amount;
        portfolio.total_trades += 1;
        portfolio.updated_at = now;

        let portfolio_id = portfolio.id;
        let owner = portfolio.owner.clone();
        let position = portfolio.positions.get(token_address).cloned();

        let trade = Trade {
            id: state.next_trade_id,
            portfolio_id,
            token_address: token_address.to_string(),
            token_symbol: token_symbol.to_string(),
            side: TradeSide::Buy,
            quantity,
            price,
            value: sol_amount,
            pnl: None,
            multiplier: None,
            source,
            reason: reason.map(str::to_string),
            executed_at: now,
        };
        state.next_trade_id += 1;
        state.trades.push(trade.clone());

        let kind = if source == TradeSource::Manual {
            ActivityKind::Trade
        } else {
            ActivityKind::Snipe
        };
        Self::push_activity(
            state,
            Some(portfolio_id),
            kind,
            format!(
                "Bought {:.4} {} for {:.4} SOL @ {:.8}",
                quantity, token_symbol, sol_amount, price
            ),
            now,
            events,
        );

        if let Err(e) = self.save_snapshot(state) {
            // Roll back: the trade must not be half-applied
            state.portfolios.insert(key.to_string(), backup);
            state.trades.pop();
            state.activities.pop();
            events.pop();
            state.next_trade_id = next_trade_id;
            state.next_activity_id = next_activity_id;
            return Err(TradeError::Persistence(e.to_string()));
        }

        events.push(EngineEvent::TradeExecuted(trade.clone()));
        events.push(EngineEvent::PositionUpdated {
            owner,
            token_address: token_address.to_string(),
            position,
        });
        Ok(trade)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_sell(
        &self,
        state: &mut LedgerState,
        key: &str,
        token_address: &str,
        token_symbol: &str,
        quantity: f64,
        price: f64,
        source: TradeSource,
        reason: Option<&str>,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<Trade, TradeError> {
        let (next_trade_id, next_activity_id) = (state.next_trade_id, state.next_activity_id);
        let portfolio = state.portfolios.get_mut(key).unwrap();
        let Some(position) = portfolio.positions.get(token_address) else {
            return Err(TradeError::NoPosition(token_address.to_string()));
        };
        if position.quantity < quantity {
            return Err(TradeError::InsufficientPosition {
                have: position.quantity,
                need: quantity,
            });
        }

        let backup = portfolio.clone();

        let proceeds = quantity * price;
        let cost_basis = (quantity / position.quantity) * position.entry_value;
        let pnl = proceeds - cost_basis;
        let multiplier = proceeds / cost_basis;
        let is_win = pnl > 0.0;

        let position = portfolio.positions.get_mut(token_address).unwrap();
        let closed = position.apply_sell(quantity, cost_basis, price, now);
        if closed {
            portfolio.positions.remove(token_address);
        }

        portfolio.sol_balance += proceeds;
        portfolio.total_pnl += pnl;
        portfolio.total_trades += 1;
        portfolio.fold_win_rate(is_win);
        if multiplier > portfolio.best_trade {
            portfolio.best_trade = multiplier;
        }
        portfolio.updated_at = now;

        let portfolio_id = portfolio.id;
        let owner = portfolio.owner.clone();
        let remaining = portfolio.positions.get(token_address).cloned();

        let trade = Trade {
            id: state.next_trade_id,
            portfolio_id,
            token_address: token_address.to_string(),
            token_symbol: token_symbol.to_string(),
            side: TradeSide::Sell,
            quantity,
            price,
            value: proceeds,
            pnl: Some(pnl),
            multiplier: Some(multiplier),
            source,
            reason: reason.map(str::to_string),
            executed_at: now,
        };
        state.next_trade_id += 1;
        state.trades.push(trade.clone());

        let multiplier_str = if multiplier >= 1.0 {
            format!("{:.2}x", multiplier)
        } else {
            format!("{:.1}%", multiplier * 100.0)
        };
        Self::push_activity(
            state,
            Some(portfolio_id),
            ActivityKind::Exit,
            format!(
                "Sold {:.4} {} for {:.4} SOL ({:+.4} SOL, {})",
                quantity, token_symbol, proceeds, pnl, multiplier_str
            ),
            now,
            events,
        );

        if let Err(e) = self.save_snapshot(state) {
            state.portfolios.insert(key.to_string(), backup);
            state.trades.pop();
            state.activities.pop();
            events.pop();
            state.next_trade_id = next_trade_id;
            state.next_activity_id = next_activity_id;
            return Err(TradeError::Persistence(e.to_string()));
        }

        events.push(EngineEvent::TradeExecuted(trade.clone()));
        events.push(EngineEvent::PositionUpdated {
            owner,
            token_address: token_address.to_string(),
            position: remaining,
        });
        Ok(trade)
    }

    fn push_activity(
        state: &mut LedgerState,
        portfolio_id: Option<u64>,
        kind: ActivityKind,
        message: String,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) {
        let activity = Activity {
            id: state.next_activity_id,
            portfolio_id,
            kind,
            message,
            created_at: now,
        };
        state.next_activity_id += 1;
        state.activities.push(activity.clone());
        events.push(EngineEvent::Activity(activity));
    }

    fn save_snapshot(&self, state: &LedgerState) -> Result<(), SnapshotError> {
        match &self.snapshot_path {
            Some(path) => snapshot::save(path, state),
            None => Ok(()),
        }
    }

    /// Snapshot write for non-trade mutations; a failure is logged, not
    /// surfaced, since no money moved.
    fn save_snapshot_best_effort(&self, state: &LedgerState) {
        if let Err(e) = self.save_snapshot(state) {
            warn!("Ledger snapshot write failed: {}", e);
        }
    }

    fn flush(&self, events: Vec<EngineEvent>) {
        for event in events {
            self.events.publish(event);
        }
    }
}
