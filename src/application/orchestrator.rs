//! Trading Orchestrator
//!
//! Wires the triad together: the discovery feed produces candidates, the
//! agent decides, the ledger enforces and records. Every component is an
//! explicitly constructed instance - nothing global - so tests can build
//! the same graph with fakes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::agent::{
    AdvisorConfig, AdvisoryStrategy, AgentConfig, AgentStats, AutoTrader, DecisionStrategy,
    RuleBasedStrategy,
};
use crate::config::Config;
use crate::domain::{EngineEvent, EventBus, Network};
use crate::engine::PaperLedger;
use crate::feed::{FeedEvent, FeedScanner, FeedScannerConfig, PushFeed, PushFeedConfig, TokenRegistry};
use crate::util::RetryPolicy;

/// Owns the component graph and the run loop
pub struct Orchestrator {
    events: EventBus,
    ledger: Arc<PaperLedger>,
    registry: Arc<TokenRegistry>,
    scanner: Arc<FeedScanner>,
    push_feed: Arc<PushFeed>,
    trader: Arc<AutoTrader>,
    feed_rx: Option<mpsc::Receiver<FeedEvent>>,
    subscribe_rx: Option<mpsc::Receiver<Vec<String>>>,
}

impl Orchestrator {
    /// Build the full component graph from configuration
    pub async fn new(config: &Config) -> Result<Self> {
        let events = EventBus::default();

        let ledger = match &config.engine.snapshot_path {
            Some(path) => Arc::new(
                PaperLedger::with_snapshot(events.clone(), path.into())
                    .context("Failed to load ledger snapshot")?,
            ),
            None => Arc::new(PaperLedger::new(events.clone())),
        };

        let registry = Arc::new(TokenRegistry::new());
        let scanner = Arc::new(
            FeedScanner::new(
                FeedScannerConfig {
                    profiles_url: config.feed.profiles_url.clone(),
                    pairs_url: config.feed.pairs_url.clone(),
                    chain_id: config.feed.chain_id.clone(),
                    scan_interval: config.scan_interval(),
                    request_timeout: config.request_timeout(),
                    profile_batch: config.feed.profile_batch,
                    retry: RetryPolicy::default(),
                },
                Arc::clone(&registry),
                events.clone(),
            )
            .context("Failed to create feed scanner")?,
        );

        let (push_feed, feed_rx) = PushFeed::new(PushFeedConfig {
            ws_url: config.feed.ws_url.clone(),
            max_reconnect_attempts: config.feed.max_reconnect_attempts,
            ..PushFeedConfig::default()
        });
        let push_feed = Arc::new(push_feed);

        // The strategy caps entries by the policy's max trade size
        let max_trade_size = ledger
            .policy(&config.agent.owner)
            .await
            .map(|p| p.max_trade_size)
            .unwrap_or(0.5);
        let rule_based = RuleBasedStrategy::new(max_trade_size);
        let strategy: Arc<dyn DecisionStrategy> = match config
            .advisor
            .enabled
            .then(|| config.advisor.resolve_api_key())
            .flatten()
        {
            Some(api_key) => {
                info!("Advisory strategy enabled ({})", config.advisor.model);
                let advisor_config = AdvisorConfig {
                    api_url: config.advisor.api_url.clone(),
                    api_key,
                    model: config.advisor.model.clone(),
                    timeout: Duration::from_secs(config.advisor.timeout_secs),
                };
                Arc::new(
                    AdvisoryStrategy::new(advisor_config, rule_based)
                        .context("Failed to create advisory strategy")?,
                )
            }
            None => {
                info!("No advisory credentials - using rule-based strategy");
                Arc::new(rule_based)
            }
        };

        let (subscribe_tx, subscribe_rx) = mpsc::channel(100);
        let agent_config = AgentConfig {
            network: Network::Devnet,
            tick_interval: Duration::from_secs(config.agent.tick_interval_secs),
            trade_cooldown: Duration::from_secs(config.agent.trade_cooldown_secs),
            seen_ttl: Duration::from_secs(config.agent.seen_ttl_secs),
            dead_position_age: Duration::from_secs(config.agent.dead_position_secs),
            ..AgentConfig::new(config.agent.owner.clone())
        };
        let trader = Arc::new(
            AutoTrader::new(
                agent_config,
                Arc::clone(&ledger),
                Arc::clone(&registry),
                strategy,
            )
            .with_trade_subscriptions(subscribe_tx),
        );

        Ok(Self {
            events,
            ledger,
            registry,
            scanner,
            push_feed,
            trader,
            feed_rx: Some(feed_rx),
            subscribe_rx: Some(subscribe_rx),
        })
    }

    pub fn ledger(&self) -> &Arc<PaperLedger> {
        &self.ledger
    }

    pub fn registry(&self) -> &Arc<TokenRegistry> {
        &self.registry
    }

    pub async fn agent_stats(&self) -> AgentStats {
        self.trader.stats().await
    }

    /// Run until a shutdown signal arrives
    pub async fn run(mut self) -> Result<()> {
        let mut feed_rx = self.feed_rx.take().context("Orchestrator already ran")?;
        let mut subscribe_rx = self.subscribe_rx.take().context("Orchestrator already ran")?;

        // Push feed connection loop; its loss degrades to HTTP-poll-only
        let push_feed = Arc::clone(&self.push_feed);
        tokio::spawn(async move {
            if let Err(e) = push_feed.run().await {
                warn!("Push feed terminated: {}", e);
            }
        });
        self.push_feed
            .subscribe_new_tokens()
            .await
            .context("Failed to subscribe to launch stream")?;

        // Agent buy -> per-token trade stream subscription
        let push_feed = Arc::clone(&self.push_feed);
        tokio::spawn(async move {
            while let Some(mints) = subscribe_rx.recv().await {
                if let Err(e) = push_feed.subscribe_token_trades(mints).await {
                    debug!("Trade subscription failed: {}", e);
                }
            }
        });

        // Push feed events -> normalizer + live price logging
        let scanner = Arc::clone(&self.scanner);
        let trader = Arc::clone(&self.trader);
        tokio::spawn(async move {
            while let Some(event) = feed_rx.recv().await {
                match event {
                    FeedEvent::TokenData(payload) => {
                        trader.handle_price_update(&payload).await;
                        scanner.handle_push_token(payload).await;
                    }
                    FeedEvent::ConnectionState {
                        connected,
                        reconnects,
                    } => {
                        debug!(
                            "Push feed connection: connected={} reconnects={}",
                            connected, reconnects
                        );
                    }
                }
            }
        });

        // Discovery events -> agent
        let trader = Arc::clone(&self.trader);
        let mut bus_rx = self.events.subscribe();
        tokio::spawn(async move {
            loop {
                match bus_rx.recv().await {
                    Ok(EngineEvent::TokenDiscovered(token)) => {
                        trader.handle_new_token(&token).await;
                    }
                    Ok(EngineEvent::OpportunityFound(opportunity)) => {
                        trader.handle_opportunity(&opportunity).await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Event consumer lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.trader.start().await;

        let scanner = Arc::clone(&self.scanner);
        let scan_task = tokio::spawn(async move {
            scanner.run().await;
        });

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        info!("Shutdown signal received");

        self.stop().await;
        scan_task.abort();
        Ok(())
    }

    /// Stop every component
    pub async fn stop(&self) {
        self.trader.stop().await;
        self.scanner.stop();
        if let Err(e) = self.push_feed.shutdown().await {
            debug!("Push feed shutdown: {}", e);
        }
    }
}
