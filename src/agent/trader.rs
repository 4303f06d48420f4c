//! Autonomous Trading Agent
//!
//! A supervised decision loop: consumes discovery events, scores candidates
//! through a pluggable strategy, executes entries through the ledger, and
//! manages open positions on a fixed tick (profit ladder, stop loss, dead
//! position cleanup).
//!
//! The agent's working set (position cache, seen-token set, daily spend
//! mirror) is a latency cache over ledger truth: it is seeded from the
//! ledger on start and reconciled to the ledger's resulting quantities
//! after every confirmed sell.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{
    ActivityKind, Network, Opportunity, PolicyUpdate, ProfitLadder, SuggestedAction, Token,
    TradeSide, TradeSource,
};
use crate::engine::PaperLedger;
use crate::feed::{PushTokenPayload, TokenRegistry};
use super::strategy::{DecisionAction, DecisionStrategy, TradeDecision};

/// Agent configuration. Durations are injectable so tests can compress the
/// clock.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Identity the agent trades for
    pub owner: String,
    /// Network of the portfolio it manages
    pub network: Network,
    /// Position-management cadence
    pub tick_interval: Duration,
    /// Global (not per-token) cooldown between entries
    pub trade_cooldown: Duration,
    /// How long a token stays in the seen set
    pub seen_ttl: Duration,
    /// Age after which a position with no live price is considered dead
    pub dead_position_age: Duration,
    /// Fraction of entry price used to liquidate a dead position
    pub dead_position_markdown: f64,
    /// Full stop-loss threshold on the price multiplier
    pub stop_loss_multiplier: f64,
    /// Minimum score to act on a pre-scored opportunity
    pub opportunity_min_score: u8,
    /// Entry price substitute when the feed has no price yet
    pub fallback_entry_price: f64,
}

impl AgentConfig {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            network: Network::Devnet,
            tick_interval: Duration::from_secs(10),
            trade_cooldown: Duration::from_secs(15),
            seen_ttl: Duration::from_secs(10 * 60),
            dead_position_age: Duration::from_secs(5 * 60),
            dead_position_markdown: 0.5,
            stop_loss_multiplier: 0.5,
            opportunity_min_score: 60,
            fallback_entry_price: 0.00001,
        }
    }
}

/// Cached view of one open position
#[derive(Debug, Clone)]
struct CachedPosition {
    token_address: String,
    token_symbol: String,
    entry_price: f64,
    quantity: f64,
    entry_time: DateTime<Utc>,
}

/// Why a candidate was short-circuited before the strategy ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotRunning,
    DailyBudgetExhausted,
    AlreadyHolding,
    InvalidSymbol,
    Cooldown,
}

impl SkipReason {
    /// Silent skips produce no user-visible noise
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            SkipReason::DailyBudgetExhausted | SkipReason::InvalidSymbol | SkipReason::Cooldown
        )
    }
}

/// Outcome of candidate evaluation
#[derive(Debug, Clone)]
pub enum Verdict {
    Skip(SkipReason),
    Decision(TradeDecision),
}

/// Agent status surface for the CLI
#[derive(Debug, Clone)]
pub struct AgentStats {
    pub running: bool,
    pub daily_spent: f64,
    pub daily_limit: f64,
    pub position_count: usize,
}

/// The autonomous agent
pub struct AutoTrader {
    config: AgentConfig,
    ledger: Arc<PaperLedger>,
    registry: Arc<TokenRegistry>,
    strategy: Arc<dyn DecisionStrategy>,
    /// Bridge to the push feed's per-token trade subscriptions
    subscribe_tx: Option<mpsc::Sender<Vec<String>>>,
    running: AtomicBool,
    positions: RwLock<HashMap<String, CachedPosition>>,
    seen: RwLock<HashMap<String, Instant>>,
    daily_spent: RwLock<f64>,
    daily_limit: RwLock<f64>,
    max_trade_size: RwLock<f64>,
    ladder: RwLock<ProfitLadder>,
    last_trade: RwLock<Option<Instant>>,
    tick_handle: Mutex<Option<JoinHandle<()>>>,
}

impl AutoTrader {
    pub fn new(
        config: AgentConfig,
        ledger: Arc<PaperLedger>,
        registry: Arc<TokenRegistry>,
        strategy: Arc<dyn DecisionStrategy>,
    ) -> Self {
        Self {
            config,
            ledger,
            registry,
            strategy,
            subscribe_tx: None,
            running: AtomicBool::new(false),
            positions: RwLock::new(HashMap::new()),
            seen: RwLock::new(HashMap::new()),
            daily_spent: RwLock::new(0.0),
            daily_limit: RwLock::new(2.0),
            max_trade_size: RwLock::new(0.5),
            ladder: RwLock::new(ProfitLadder::default()),
            last_trade: RwLock::new(None),
            tick_handle: Mutex::new(None),
        }
    }

    /// Wire a channel whose messages request push-feed trade subscriptions
    pub fn with_trade_subscriptions(mut self, tx: mpsc::Sender<Vec<String>>) -> Self {
        self.subscribe_tx = Some(tx);
        self
    }

    /// `stopped -> running`: load policy and open positions from the
    /// ledger, then begin the position-management tick.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("Agent already running");
            return;
        }
        self.load_state().await;

        let daily_spent = *self.daily_spent.read().await;
        let daily_limit = *self.daily_limit.read().await;
        info!("====== STARTING AUTONOMOUS TRADING ======");
        info!("Identity: {}", self.config.owner);
        info!("Daily limit: {} SOL", daily_limit);
        info!("Daily spent: {} SOL", daily_spent);
        info!("Remaining allowance: {} SOL", daily_limit - daily_spent);
        info!(
            "Active positions: {}",
            self.positions.read().await.len()
        );
        info!("=========================================");

        let trader = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(trader.config.tick_interval);
            ticker.tick().await;
            while trader.running.load(Ordering::SeqCst) {
                ticker.tick().await;
                trader.run_management_pass().await;
            }
        });
        *self.tick_handle.lock().await = Some(handle);

        self.ledger
            .log_activity(
                None,
                ActivityKind::Scan,
                "AI trader activated - scanning for opportunities...",
            )
            .await;
    }

    /// `running -> stopped`: cancel the tick
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.tick_handle.lock().await.take() {
            handle.abort();
        }
        info!("Agent stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear spend counters and working caches without stopping the loop.
    /// Used after an external portfolio reset.
    pub async fn reset_daily(&self) {
        *self.daily_spent.write().await = 0.0;
        self.positions.write().await.clear();
        self.seen.write().await.clear();
        let limit = *self.daily_limit.read().await;
        info!("Daily state reset - {} SOL allowance available", limit);
    }

    pub async fn stats(&self) -> AgentStats {
        AgentStats {
            running: self.is_running(),
            daily_spent: *self.daily_spent.read().await,
            daily_limit: *self.daily_limit.read().await,
            position_count: self.positions.read().await.len(),
        }
    }

    /// Seed the working caches from ledger truth
    async fn load_state(&self) {
        // First start for this identity creates the policy with defaults
        let policy = match self.ledger.policy(&self.config.owner).await {
            Some(policy) => policy,
            None => {
                self.ledger
                    .save_policy(&self.config.owner, PolicyUpdate::default())
                    .await
            }
        };
        *self.daily_limit.write().await = policy.daily_limit;
        *self.max_trade_size.write().await = policy.max_trade_size;
        *self.ladder.write().await = policy.profit_taking.unwrap_or_default();

        let portfolio = self
            .ledger
            .get_or_create_portfolio(&self.config.owner, self.config.network)
            .await;
        *self.daily_spent.write().await = portfolio.daily_spent;

        let mut positions = self.positions.write().await;
        positions.clear();
        for position in portfolio.positions.values() {
            positions.insert(
                position.token_address.clone(),
                CachedPosition {
                    token_address: position.token_address.clone(),
                    token_symbol: position.token_symbol.clone(),
                    entry_price: position.avg_entry_price,
                    quantity: position.quantity,
                    entry_time: position.opened_at,
                },
            );
        }
        info!("Loaded {} existing positions", positions.len());
    }

    /// React to a newly discovered token
    pub async fn handle_new_token(&self, token: &Token) {
        if !self.is_running() {
            return;
        }

        // Dedup on the time-bounded seen set, purging stale entries
        {
            let mut seen = self.seen.write().await;
            let now = Instant::now();
            seen.retain(|_, first_seen| now.duration_since(*first_seen) < self.config.seen_ttl);
            if seen.contains_key(&token.address) {
                return;
            }
            seen.insert(token.address.clone(), now);
        }

        match self.evaluate_token(token).await {
            Verdict::Skip(reason) => {
                if !reason.is_silent() {
                    debug!("{}: skipped ({:?})", token.symbol, reason);
                }
            }
            Verdict::Decision(decision) => {
                info!(
                    "{}: {:?} ({}%) - {}",
                    token.symbol, decision.action, decision.confidence, decision.reasoning
                );
                match decision.action {
                    DecisionAction::Buy if decision.size.is_some() => {
                        self.execute_buy(token, &decision).await;
                    }
                    DecisionAction::Watch if decision.confidence >= 40 => {
                        self.ledger
                            .log_activity(
                                None,
                                ActivityKind::Alert,
                                format!("Watching {} - {}", token.symbol, decision.reasoning),
                            )
                            .await;
                    }
                    _ => {}
                }
            }
        }
    }

    /// Short-circuit checks, then the strategy decision
    pub async fn evaluate_token(&self, token: &Token) -> Verdict {
        if !self.is_running() {
            return Verdict::Skip(SkipReason::NotRunning);
        }
        if *self.daily_spent.read().await >= *self.daily_limit.read().await {
            return Verdict::Skip(SkipReason::DailyBudgetExhausted);
        }
        if self.positions.read().await.contains_key(&token.address) {
            return Verdict::Skip(SkipReason::AlreadyHolding);
        }
        if !Self::symbol_is_sane(&token.symbol) {
            return Verdict::Skip(SkipReason::InvalidSymbol);
        }
        if let Some(last) = *self.last_trade.read().await {
            if last.elapsed() < self.config.trade_cooldown {
                return Verdict::Skip(SkipReason::Cooldown);
            }
        }

        Verdict::Decision(self.strategy.decide(token).await)
    }

    /// Strip marker characters; what remains must be alphanumeric and at
    /// least two characters.
    fn symbol_is_sane(symbol: &str) -> bool {
        let cleaned: String = symbol
            .chars()
            .filter(|c| *c != '$' && !c.is_whitespace())
            .collect();
        cleaned.len() >= 2 && cleaned.chars().all(|c| c.is_ascii_alphanumeric())
    }

    /// Act on a pre-scored opportunity, bypassing candidate evaluation
    pub async fn handle_opportunity(&self, opportunity: &Opportunity) {
        if !self.is_running() {
            return;
        }
        if opportunity.suggested_action != SuggestedAction::Buy
            || opportunity.score < self.config.opportunity_min_score
        {
            return;
        }

        let max_trade_size = *self.max_trade_size.read().await;
        let suggested = if opportunity.suggested_size > 0.0 {
            opportunity.suggested_size
        } else {
            0.1
        };
        let decision = TradeDecision {
            action: DecisionAction::Buy,
            confidence: opportunity.score,
            reasoning: opportunity.reason.clone(),
            size: Some(suggested.min(max_trade_size)),
        };
        self.execute_buy(&opportunity.token, &decision).await;
    }

    /// Entry path: route the buy through the ledger, then update caches and
    /// subscribe to the asset's trade stream.
    async fn execute_buy(&self, token: &Token, decision: &TradeDecision) {
        let Some(size) = decision.size else {
            return;
        };

        {
            let daily_spent = *self.daily_spent.read().await;
            let daily_limit = *self.daily_limit.read().await;
            if daily_spent + size > daily_limit {
                debug!(
                    "Daily limit would be exceeded ({} + {} > {})",
                    daily_spent, size, daily_limit
                );
                return;
            }
        }

        let price = if token.price > 0.0 {
            token.price
        } else {
            self.config.fallback_entry_price
        };
        let reason = format!("AI: {}", decision.reasoning);

        match self
            .ledger
            .execute_trade(
                &self.config.owner,
                self.config.network,
                &token.address,
                &token.symbol,
                TradeSide::Buy,
                size,
                price,
                TradeSource::Auto,
                Some(&reason),
            )
            .await
        {
            Ok(trade) => {
                *self.daily_spent.write().await += size;
                *self.last_trade.write().await = Some(Instant::now());
                self.positions.write().await.insert(
                    token.address.clone(),
                    CachedPosition {
                        token_address: token.address.clone(),
                        token_symbol: token.symbol.clone(),
                        entry_price: price,
                        quantity: trade.quantity,
                        entry_time: Utc::now(),
                    },
                );
                if let Some(tx) = &self.subscribe_tx {
                    let _ = tx.send(vec![token.address.clone()]).await;
                }
                info!(
                    "Bought {} for {} SOL ({}% confidence)",
                    token.symbol, size, decision.confidence
                );
            }
            // Rejections are already evented by the ledger
            Err(e) => warn!("Buy failed for {}: {}", token.symbol, e),
        }
    }

    /// Log live multiplier moves for held tokens (price itself is refreshed
    /// in the registry by the feed path).
    pub async fn handle_price_update(&self, payload: &PushTokenPayload) {
        if payload.price <= 0.0 {
            return;
        }
        let positions = self.positions.read().await;
        if let Some(position) = positions.get(&payload.mint) {
            let multiplier = payload.price / position.entry_price;
            debug!(
                "Price update: {} now at {:.2}x",
                position.token_symbol, multiplier
            );
        }
    }

    /// One position-management pass over all cached open positions.
    ///
    /// Public so the scheduler and tests can drive it directly; the
    /// internal tick calls this on every interval.
    pub async fn run_management_pass(&self) {
        let cached: Vec<CachedPosition> =
            self.positions.read().await.values().cloned().collect();
        if cached.is_empty() {
            return;
        }
        debug!("Checking {} positions...", cached.len());

        let portfolio_id = self
            .ledger
            .portfolio(&self.config.owner, self.config.network)
            .await
            .map(|p| p.id);

        for position in cached {
            let token = self.registry.get(&position.token_address).await;
            let live_price = token.as_ref().map(|t| t.price).unwrap_or(0.0);

            // Dead position rule: no live price ever recorded and the
            // position has aged past the threshold. A price exactly equal
            // to entry is treated as "no data", which can misfire on a
            // genuinely flat price.
            let age = (Utc::now() - position.entry_time)
                .to_std()
                .unwrap_or_default();
            let has_no_price_data = live_price <= 0.0 || live_price == position.entry_price;
            if age >= self.config.dead_position_age && has_no_price_data {
                info!(
                    "Dead token: {} ({:.0}m old, no price data)",
                    position.token_symbol,
                    age.as_secs_f64() / 60.0
                );
                let markdown_price = position.entry_price * self.config.dead_position_markdown;
                self.execute_exit(
                    &position.token_address,
                    1.0,
                    markdown_price,
                    self.config.dead_position_markdown,
                    true,
                )
                .await;
                self.ledger
                    .log_activity(
                        portfolio_id,
                        ActivityKind::Rug,
                        format!(
                            "Dumped dead token {} (-50% assumed loss)",
                            position.token_symbol
                        ),
                    )
                    .await;
                continue;
            }

            let current_price = if live_price > 0.0 {
                live_price
            } else {
                position.entry_price
            };
            let multiplier = current_price / position.entry_price;

            // Persist the refreshed snapshot; the ledger emits the
            // position-updated event.
            self.ledger
                .mark_position(
                    &self.config.owner,
                    self.config.network,
                    &position.token_address,
                    current_price,
                )
                .await;

            // Profit ladder, highest threshold first, one exit per tick
            let ladder = *self.ladder.read().await;
            if multiplier >= 10.0 && ladder.at_10x > 0.0 {
                self.execute_exit(
                    &position.token_address,
                    ladder.at_10x,
                    current_price,
                    multiplier,
                    false,
                )
                .await;
            } else if multiplier >= 5.0 && ladder.at_5x > 0.0 {
                self.execute_exit(
                    &position.token_address,
                    ladder.at_5x,
                    current_price,
                    multiplier,
                    false,
                )
                .await;
            } else if multiplier >= 2.0 && ladder.at_2x > 0.0 {
                self.execute_exit(
                    &position.token_address,
                    ladder.at_2x,
                    current_price,
                    multiplier,
                    false,
                )
                .await;
            }

            // Independent full stop loss
            if multiplier <= self.config.stop_loss_multiplier {
                self.execute_exit(
                    &position.token_address,
                    1.0,
                    current_price,
                    multiplier,
                    true,
                )
                .await;
            }
        }
    }

    /// Exit path: sell a fraction of the cached position through the
    /// ledger, then reconcile the cache to the ledger's resulting quantity.
    async fn execute_exit(
        &self,
        address: &str,
        fraction: f64,
        price: f64,
        multiplier: f64,
        stop_loss: bool,
    ) {
        let Some(position) = self.positions.read().await.get(address).cloned() else {
            return;
        };
        let quantity = position.quantity * fraction;
        if quantity <= 0.0 {
            return;
        }

        let source = if stop_loss {
            TradeSource::StopLoss
        } else {
            TradeSource::ProfitTake
        };
        let reason = format!("{:.1}x exit", multiplier);

        match self
            .ledger
            .execute_trade(
                &self.config.owner,
                self.config.network,
                address,
                &position.token_symbol,
                TradeSide::Sell,
                quantity,
                price,
                source,
                Some(&reason),
            )
            .await
        {
            Ok(_) => {
                // The ledger is the source of truth for what remains
                let remaining = self
                    .ledger
                    .position(&self.config.owner, self.config.network, address)
                    .await;
                let mut positions = self.positions.write().await;
                match remaining {
                    Some(ledger_position) => {
                        if let Some(cached) = positions.get_mut(address) {
                            cached.quantity = ledger_position.quantity;
                        }
                    }
                    None => {
                        positions.remove(address);
                    }
                }

                let action = if stop_loss {
                    "Stop loss".to_string()
                } else {
                    format!("Sold {}%", (fraction * 100.0).round())
                };
                info!("{} {} at {:.1}x", action, position.token_symbol, multiplier);
            }
            Err(e) => warn!("Sell failed for {}: {}", position.token_symbol, e),
        }
    }
}
