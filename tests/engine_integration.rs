//! Engine Integration Tests
//!
//! End-to-end scenarios across the triad: the feed normalizer produces
//! candidates, the agent decides, the ledger enforces and records.
//!
//! All tests are deterministic (no real network calls): push-feed payloads
//! are injected directly into the scanner, and the agent's management pass
//! is driven by hand with compressed timeouts.

use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;

use aegis_trader::agent::{AgentConfig, AutoTrader, DecisionStrategy, RuleBasedStrategy};
use aegis_trader::domain::{
    EngineEvent, EventBus, Network, PolicyUpdate, TradeSide, TradeSource,
};
use aegis_trader::engine::{PaperLedger, TradeError};
use aegis_trader::feed::{FeedScanner, FeedScannerConfig, PushTokenPayload, TokenRegistry};

const OWNER: &str = "integration-account";
const NET: Network = Network::Devnet;

// ============================================================================
// Test Fixtures
// ============================================================================

/// A fresh, liquid, safe launch payload as the push feed would deliver it
fn launch_payload(mint: &str, price: f64) -> PushTokenPayload {
    serde_json::from_value(serde_json::json!({
        "mint": mint,
        "name": "Integration Token",
        "symbol": "ITG",
        "price": price,
        "usd_market_cap": 250_000.0,
        "virtual_sol_reserves": 80.0,
        "txType": "create",
    }))
    .unwrap()
}

fn scanner_with(registry: Arc<TokenRegistry>, events: EventBus) -> FeedScanner {
    FeedScanner::new(FeedScannerConfig::default(), registry, events).unwrap()
}

/// Agent wired for tests: deterministic strategy, no background interference
async fn start_agent(
    ledger: Arc<PaperLedger>,
    registry: Arc<TokenRegistry>,
    dead_position_age: Duration,
) -> Arc<AutoTrader> {
    let mut config = AgentConfig::new(OWNER);
    config.tick_interval = Duration::from_secs(3600);
    config.trade_cooldown = Duration::ZERO;
    config.dead_position_age = dead_position_age;

    let strategy: Arc<dyn DecisionStrategy> =
        Arc::new(RuleBasedStrategy::new(0.5).with_exploration_chance(0.0));
    let trader = Arc::new(AutoTrader::new(config, ledger, registry, strategy));
    trader.start().await;
    trader
}

// ============================================================================
// Ledger arithmetic scenarios
// ============================================================================

#[tokio::test]
async fn test_buy_sell_round_trip_arithmetic() {
    // Portfolio starts at 10.0; buy 0.5 @ 0.001 -> quantity 500,
    // entry value 0.5, balance 9.5; sell 250 @ 0.002 -> proceeds 0.5,
    // cost basis 0.25, pnl +0.25, multiplier 2.0, balance 10.0
    let ledger = PaperLedger::new(EventBus::default());

    ledger
        .execute_trade(
            OWNER, NET, "mint1", "$ITG", TradeSide::Buy, 0.5, 0.001,
            TradeSource::Manual, None,
        )
        .await
        .unwrap();

    let portfolio = ledger.portfolio(OWNER, NET).await.unwrap();
    assert_relative_eq!(portfolio.sol_balance, 9.5);
    assert_relative_eq!(portfolio.positions["mint1"].quantity, 500.0);
    assert_relative_eq!(portfolio.positions["mint1"].entry_value, 0.5);

    let sell = ledger
        .execute_trade(
            OWNER, NET, "mint1", "$ITG", TradeSide::Sell, 250.0, 0.002,
            TradeSource::Manual, None,
        )
        .await
        .unwrap();

    assert_relative_eq!(sell.value, 0.5);
    assert_relative_eq!(sell.pnl.unwrap(), 0.25);
    assert_relative_eq!(sell.multiplier.unwrap(), 2.0);

    let portfolio = ledger.portfolio(OWNER, NET).await.unwrap();
    assert_relative_eq!(portfolio.sol_balance, 10.0);
    assert_relative_eq!(portfolio.positions["mint1"].quantity, 250.0);
}

#[tokio::test]
async fn test_avg_entry_is_weighted_across_all_buys() {
    let ledger = PaperLedger::new(EventBus::default());

    // Three buys at increasing prices
    for (amount, price) in [(0.5, 0.001), (0.5, 0.002), (0.25, 0.004)] {
        ledger
            .execute_trade(
                OWNER, NET, "mint1", "$ITG", TradeSide::Buy, amount, price,
                TradeSource::Manual, None,
            )
            .await
            .unwrap();
    }

    let position = ledger.position(OWNER, NET, "mint1").await.unwrap();
    let quantity = 500.0 + 250.0 + 62.5;
    assert_relative_eq!(position.quantity, quantity, max_relative = 1e-12);
    // entryValue is the sum of all buy amounts
    assert_relative_eq!(position.entry_value, 1.25, max_relative = 1e-12);
    // avgEntryPrice is the cost-basis-weighted average
    assert_relative_eq!(
        position.avg_entry_price,
        1.25 / quantity,
        max_relative = 1e-12
    );
}

#[tokio::test]
async fn test_balance_never_goes_negative() {
    let ledger = PaperLedger::new(EventBus::default());

    // Nine buys of 1.0 drain the balance to 1.0; the overdraft attempt
    // is rejected and mutates nothing
    for _ in 0..9 {
        ledger
            .execute_trade(
                OWNER, NET, "mint1", "$ITG", TradeSide::Buy, 1.0, 0.001,
                TradeSource::Manual, None,
            )
            .await
            .unwrap();
    }
    let err = ledger
        .execute_trade(
            OWNER, NET, "mint1", "$ITG", TradeSide::Buy, 1.5, 0.001,
            TradeSource::Manual, None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TradeError::InsufficientFunds { .. }));

    let portfolio = ledger.portfolio(OWNER, NET).await.unwrap();
    assert!(portfolio.sol_balance >= 0.0);
    assert_relative_eq!(portfolio.sol_balance, 1.0, max_relative = 1e-9);
    assert_eq!(portfolio.total_trades, 9);
}

#[tokio::test]
async fn test_daily_limit_scenario_leaves_state_untouched() {
    // Policy dailyLimit = 2.0, dailySpent = 1.8: a 0.5 buy is rejected
    // with a policy-violation reason and nothing moves
    let ledger = PaperLedger::new(EventBus::default());
    ledger.save_policy(OWNER, PolicyUpdate::default()).await;

    for _ in 0..4 {
        ledger
            .execute_trade(
                OWNER, NET, "mint1", "$ITG", TradeSide::Buy, 0.45, 0.001,
                TradeSource::Manual, None,
            )
            .await
            .unwrap();
    }
    let before = ledger.portfolio(OWNER, NET).await.unwrap();
    assert_relative_eq!(before.daily_spent, 1.8, max_relative = 1e-9);

    let err = ledger
        .execute_trade(
            OWNER, NET, "mint1", "$ITG", TradeSide::Buy, 0.5, 0.001,
            TradeSource::Manual, None,
        )
        .await
        .unwrap_err();
    match err {
        TradeError::PolicyViolation(reason) => {
            assert!(reason.contains("daily limit"), "reason: {}", reason)
        }
        other => panic!("expected PolicyViolation, got {:?}", other),
    }

    let after = ledger.portfolio(OWNER, NET).await.unwrap();
    assert_relative_eq!(after.sol_balance, before.sol_balance);
    assert_relative_eq!(after.positions["mint1"].quantity, before.positions["mint1"].quantity);
    assert_eq!(after.total_trades, before.total_trades);
}

// ============================================================================
// Feed -> Agent -> Ledger pipeline
// ============================================================================

#[tokio::test]
async fn test_discovery_pipeline_executes_entry() {
    let events = EventBus::default();
    let mut bus_rx = events.subscribe();
    let ledger = Arc::new(PaperLedger::new(events.clone()));
    let registry = Arc::new(TokenRegistry::new());
    let scanner = scanner_with(Arc::clone(&registry), events);
    let trader = start_agent(
        Arc::clone(&ledger),
        Arc::clone(&registry),
        Duration::from_secs(300),
    )
    .await;

    // The push feed delivers a fresh launch; the scanner normalizes it
    scanner.handle_push_token(launch_payload("mint1", 0.001)).await;

    // Route the discovery event to the agent the way the orchestrator does
    let mut discovered = None;
    while let Ok(event) = bus_rx.try_recv() {
        if let EngineEvent::TokenDiscovered(token) = event {
            discovered = Some(token);
        }
    }
    let token = discovered.expect("scanner should emit discovery");
    assert_eq!(token.symbol, "$ITG");

    trader.handle_new_token(&token).await;

    // Fresh + liquid + safe scores past the buy threshold; the rule
    // strategy sizes up and the ledger records the entry
    let position = ledger.position(OWNER, NET, "mint1").await.unwrap();
    assert_relative_eq!(position.entry_value, 0.15);
    assert_relative_eq!(position.avg_entry_price, 0.001);

    let stats = trader.stats().await;
    assert_eq!(stats.position_count, 1);
    assert_relative_eq!(stats.daily_spent, 0.15);
}

#[tokio::test]
async fn test_profit_ladder_and_stop_loss_cycle() {
    let events = EventBus::default();
    let ledger = Arc::new(PaperLedger::new(events.clone()));
    let registry = Arc::new(TokenRegistry::new());
    let scanner = scanner_with(Arc::clone(&registry), events);
    let trader = start_agent(
        Arc::clone(&ledger),
        Arc::clone(&registry),
        Duration::from_secs(300),
    )
    .await;

    scanner.handle_push_token(launch_payload("mint1", 0.001)).await;
    let token = registry.get("mint1").await.unwrap();
    trader.handle_new_token(&token).await;
    let entry = ledger.position(OWNER, NET, "mint1").await.unwrap();

    // 2x: the default ladder sells a quarter
    registry.update_price("mint1", 0.002).await;
    trader.run_management_pass().await;
    let position = ledger.position(OWNER, NET, "mint1").await.unwrap();
    assert_relative_eq!(position.quantity, entry.quantity * 0.75, max_relative = 1e-9);

    // Collapse to 0.4x: the stop loss drains the rest
    registry.update_price("mint1", 0.0004).await;
    trader.run_management_pass().await;
    assert!(ledger.position(OWNER, NET, "mint1").await.is_none());
    assert_eq!(trader.stats().await.position_count, 0);

    let trades = ledger.trade_history(OWNER, NET, 10).await;
    assert_eq!(trades[0].source, TradeSource::StopLoss);
    assert_eq!(trades[1].source, TradeSource::ProfitTake);
}

#[tokio::test]
async fn test_dead_position_liquidated_at_half_entry() {
    // A position with no live price after the threshold is force-
    // liquidated at 50% of entry, realizing exactly -0.5 x entry value
    let events = EventBus::default();
    let ledger = Arc::new(PaperLedger::new(events.clone()));
    let registry = Arc::new(TokenRegistry::new());
    let scanner = scanner_with(Arc::clone(&registry), events);
    let trader = start_agent(
        Arc::clone(&ledger),
        Arc::clone(&registry),
        Duration::from_millis(50),
    )
    .await;

    scanner.handle_push_token(launch_payload("mint1", 0.001)).await;
    let token = registry.get("mint1").await.unwrap();
    trader.handle_new_token(&token).await;
    let entry = ledger.position(OWNER, NET, "mint1").await.unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    trader.run_management_pass().await;

    assert!(ledger.position(OWNER, NET, "mint1").await.is_none());
    let trade = ledger.trade_history(OWNER, NET, 1).await.remove(0);
    assert_eq!(trade.source, TradeSource::StopLoss);
    assert_relative_eq!(
        trade.pnl.unwrap(),
        -0.5 * entry.entry_value,
        max_relative = 1e-9
    );

    let portfolio = ledger.portfolio(OWNER, NET).await.unwrap();
    assert!(portfolio.total_pnl < 0.0);
}

#[tokio::test]
async fn test_portfolio_reset_then_agent_reset_daily() {
    let events = EventBus::default();
    let ledger = Arc::new(PaperLedger::new(events.clone()));
    let registry = Arc::new(TokenRegistry::new());
    let scanner = scanner_with(Arc::clone(&registry), events);
    let trader = start_agent(
        Arc::clone(&ledger),
        Arc::clone(&registry),
        Duration::from_secs(300),
    )
    .await;

    scanner.handle_push_token(launch_payload("mint1", 0.001)).await;
    let token = registry.get("mint1").await.unwrap();
    trader.handle_new_token(&token).await;
    assert_eq!(trader.stats().await.position_count, 1);

    // External administrative reset, then the agent clears its caches
    // without stopping the loop
    ledger.reset_portfolio(OWNER, NET).await;
    trader.reset_daily().await;

    let stats = trader.stats().await;
    assert!(stats.running);
    assert_eq!(stats.position_count, 0);
    assert_relative_eq!(stats.daily_spent, 0.0);

    let portfolio = ledger.portfolio(OWNER, NET).await.unwrap();
    assert_relative_eq!(portfolio.sol_balance, 10.0);
    assert!(portfolio.positions.is_empty());
}
