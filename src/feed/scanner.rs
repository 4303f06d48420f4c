//! Discovery Feed Scanner
//!
//! Timer-driven HTTP discovery: polls a DexScreener-style aggregator on a
//! fixed cadence, normalizes every raw record into the canonical [`Token`]
//! shape, and routes both scanned and push-fed tokens through the registry
//! upsert. A malformed record is dropped with a log line and never aborts
//! the batch; a fully failed source waits for the next cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{
    assess_risk, evaluate_opportunity, risk_reasons, EngineEvent, EventBus, Token, TokenSource,
};
use crate::util::{with_retry, RetryPolicy, Transient};
use super::payloads::{PairPayload, PairResponse, ProfilePayload, PushTokenPayload};
use super::registry::{TokenRegistry, UpsertOutcome};

/// Default aggregator endpoints
pub const DEFAULT_PROFILES_URL: &str = "https://api.dexscreener.com/token-profiles/latest/v1";
pub const DEFAULT_PAIRS_URL: &str = "https://api.dexscreener.com/latest/dex/tokens";

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned status {0}")]
    Status(u16),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Transient for ScanError {
    fn is_transient(&self) -> bool {
        matches!(self, ScanError::Status(429) | ScanError::Status(500..=599))
    }
}

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct FeedScannerConfig {
    /// Latest token profiles endpoint
    pub profiles_url: String,
    /// Per-address pair detail endpoint (address appended)
    pub pairs_url: String,
    /// Chain to keep from the aggregator's mixed listings
    pub chain_id: String,
    /// Poll cadence
    pub scan_interval: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// How many profiles to expand into pair lookups per cycle
    pub profile_batch: usize,
    /// Retry budget for aggregator calls
    pub retry: RetryPolicy,
}

impl Default for FeedScannerConfig {
    fn default() -> Self {
        Self {
            profiles_url: DEFAULT_PROFILES_URL.to_string(),
            pairs_url: DEFAULT_PAIRS_URL.to_string(),
            chain_id: "solana".to_string(),
            scan_interval: Duration::from_secs(15),
            request_timeout: Duration::from_secs(10),
            profile_batch: 10,
            retry: RetryPolicy::default(),
        }
    }
}

impl FeedScannerConfig {
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.profile_batch == 0 {
            return Err(ScanError::Config("profile_batch must be > 0".into()));
        }
        if self.scan_interval.is_zero() {
            return Err(ScanError::Config("scan_interval must be > 0".into()));
        }
        Ok(())
    }
}

/// HTTP discovery scanner
pub struct FeedScanner {
    config: FeedScannerConfig,
    http: Client,
    registry: Arc<TokenRegistry>,
    events: EventBus,
    running: AtomicBool,
}

impl FeedScanner {
    pub fn new(
        config: FeedScannerConfig,
        registry: Arc<TokenRegistry>,
        events: EventBus,
    ) -> Result<Self, ScanError> {
        config.validate()?;
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            config,
            http,
            registry,
            events,
            running: AtomicBool::new(false),
        })
    }

    /// Run the scan loop until [`FeedScanner::stop`] is called
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!(
            "Feed scanner started (every {:?})",
            self.config.scan_interval
        );
        let mut ticker = tokio::time::interval(self.config.scan_interval);
        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            self.scan().await;
        }
        info!("Feed scanner stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// One scan cycle: poll the aggregator, ingest what came back, sweep
    /// expired opportunities.
    pub async fn scan(&self) {
        match self.scan_aggregator().await {
            Ok(tokens) => {
                let mut discovered = 0usize;
                for token in tokens {
                    if self.ingest(token).await == UpsertOutcome::Discovered {
                        discovered += 1;
                    }
                }
                if discovered > 0 {
                    info!("Found {} new tokens", discovered);
                }
            }
            // Next cycle retries; a dead source must not kill the loop
            Err(e) => warn!("Aggregator scan failed: {}", e),
        }

        let swept = self.registry.sweep_expired(Utc::now()).await;
        if swept > 0 {
            debug!("Swept {} expired opportunities", swept);
        }
    }

    /// Normalize and upsert one token; new tokens fan out discovery and
    /// opportunity events.
    pub async fn ingest(&self, token: Token) -> UpsertOutcome {
        let outcome = self.registry.upsert(token.clone()).await;
        if outcome == UpsertOutcome::Discovered {
            debug!("New token: {} ({})", token.symbol, token.address);
            self.events.publish(EngineEvent::TokenDiscovered(token.clone()));

            let now = Utc::now();
            if let Some(opportunity) =
                evaluate_opportunity(self.registry.next_opportunity_id(), &token, now)
            {
                self.registry.add_opportunity(opportunity.clone()).await;
                self.events
                    .publish(EngineEvent::OpportunityFound(opportunity));
            }
        }
        outcome
    }

    /// Route a push-feed payload: known tokens get a price refresh, new
    /// ones go through the full ingest path.
    pub async fn handle_push_token(&self, payload: PushTokenPayload) {
        if self.registry.contains(&payload.mint).await {
            self.registry.update_price(&payload.mint, payload.price).await;
            return;
        }
        let token = Self::map_push_token(&payload);
        self.ingest(token).await;
    }

    async fn scan_aggregator(&self) -> Result<Vec<Token>, ScanError> {
        let profiles = self.fetch_profiles().await?;
        let mut tokens = Vec::new();

        for profile in profiles
            .into_iter()
            .filter(|p| p.chain_id == self.config.chain_id)
            .take(self.config.profile_batch)
        {
            // One bad address must not sink the batch
            match self.fetch_pair(&profile.token_address).await {
                Ok(Some(pair)) => {
                    if let Some(token) = Self::map_pair(&pair, &profile) {
                        tokens.push(token);
                    } else {
                        debug!("Dropped malformed pair for {}", profile.token_address);
                    }
                }
                Ok(None) => {}
                Err(e) => debug!("Pair lookup failed for {}: {}", profile.token_address, e),
            }
        }

        debug!("Aggregator returned {} tokens", tokens.len());
        Ok(tokens)
    }

    async fn fetch_profiles(&self) -> Result<Vec<ProfilePayload>, ScanError> {
        let url = self.config.profiles_url.clone();
        let response = with_retry("profiles", self.config.retry, || {
            let request = self.http.get(&url);
            async move {
                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ScanError::Status(status.as_u16()));
                }
                Ok(response.json::<Vec<serde_json::Value>>().await?)
            }
        })
        .await?;

        // Decode entry by entry so a single malformed record is dropped
        // instead of failing the whole listing
        let mut profiles = Vec::new();
        for value in response {
            match serde_json::from_value::<ProfilePayload>(value) {
                Ok(profile) => profiles.push(profile),
                Err(e) => debug!("Dropped malformed profile record: {}", e),
            }
        }
        Ok(profiles)
    }

    async fn fetch_pair(&self, address: &str) -> Result<Option<PairPayload>, ScanError> {
        let url = format!("{}/{}", self.config.pairs_url, address);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status(status.as_u16()));
        }
        let body: PairResponse = response.json().await?;
        Ok(body.pairs.and_then(|pairs| pairs.into_iter().next()))
    }

    /// Aggregator pair -> canonical token. Returns None when even the
    /// address is missing.
    fn map_pair(pair: &PairPayload, profile: &ProfilePayload) -> Option<Token> {
        let base = pair.base_token.as_ref();
        let address = base
            .and_then(|b| b.address.clone())
            .unwrap_or_else(|| profile.token_address.clone());
        if address.is_empty() {
            return None;
        }

        let symbol = base
            .and_then(|b| b.symbol.clone())
            .unwrap_or_else(|| "???".to_string());
        let name = base
            .and_then(|b| b.name.clone())
            .or_else(|| profile.name.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        let liquidity = pair.liquidity.as_ref().map(|l| l.usd).unwrap_or(0.0) / 100.0;
        let market_cap = if pair.market_cap > 0.0 {
            pair.market_cap
        } else {
            pair.fdv
        };
        let price = pair
            .price_usd
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .unwrap_or(0.0);
        let created_at = pair
            .pair_created_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        Some(Token {
            address,
            symbol: format!("${}", symbol),
            name,
            decimals: 9,
            source: TokenSource::Raydium,
            created_at,
            price,
            price_change_24h: pair.price_change.as_ref().map(|c| c.h24).unwrap_or(0.0),
            market_cap,
            volume_24h: pair.volume.as_ref().map(|v| v.h24).unwrap_or(0.0),
            liquidity,
            holders: profile.holders,
            risk: assess_risk(liquidity, profile.holders, market_cap),
            risk_reasons: risk_reasons(liquidity, profile.holders, market_cap),
            image_url: profile
                .icon
                .clone()
                .or_else(|| pair.info.as_ref().and_then(|i| i.image_url.clone())),
            website: None,
            twitter: None,
        })
    }

    /// Push-feed payload -> canonical token
    fn map_push_token(payload: &PushTokenPayload) -> Token {
        let liquidity = payload.sol_reserves;
        Token {
            address: payload.mint.clone(),
            symbol: format!("${}", payload.symbol),
            name: payload.name.clone(),
            decimals: 6,
            source: TokenSource::PumpFun,
            created_at: Utc::now(),
            price: payload.price,
            price_change_24h: 0.0,
            market_cap: payload.market_cap,
            volume_24h: 0.0,
            liquidity,
            holders: 0,
            risk: assess_risk(liquidity, 0, payload.market_cap),
            risk_reasons: risk_reasons(liquidity, 0, payload.market_cap),
            image_url: payload.image_url.clone(),
            website: payload.website.clone(),
            twitter: payload.twitter.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RiskLevel;

    fn profile(address: &str) -> ProfilePayload {
        serde_json::from_value(serde_json::json!({
            "chainId": "solana",
            "tokenAddress": address,
            "holders": 250,
        }))
        .unwrap()
    }

    #[test]
    fn test_map_pair_full() {
        let pair: PairPayload = serde_json::from_value(serde_json::json!({
            "baseToken": { "address": "mint1", "symbol": "DOG", "name": "Dog Coin" },
            "priceUsd": "0.005",
            "priceChange": { "h24": 35.0 },
            "liquidity": { "usd": 8000.0 },
            "marketCap": 120000.0,
            "volume": { "h24": 40000.0 },
        }))
        .unwrap();

        let token = FeedScanner::map_pair(&pair, &profile("mint1")).unwrap();
        assert_eq!(token.address, "mint1");
        assert_eq!(token.symbol, "$DOG");
        assert_eq!(token.price, 0.005);
        assert_eq!(token.liquidity, 80.0);
        assert_eq!(token.market_cap, 120_000.0);
        assert_eq!(token.holders, 250);
        assert_eq!(token.source, TokenSource::Raydium);
        assert_eq!(token.risk, RiskLevel::Safe);
    }

    #[test]
    fn test_map_pair_sparse_defaults() {
        // Nothing but the profile address: fields default, tier degrades
        let pair: PairPayload = serde_json::from_value(serde_json::json!({})).unwrap();
        let token = FeedScanner::map_pair(&pair, &profile("mint2")).unwrap();
        assert_eq!(token.address, "mint2");
        assert_eq!(token.symbol, "$???");
        assert_eq!(token.name, "Unknown");
        assert_eq!(token.price, 0.0);
        assert_eq!(token.risk, RiskLevel::Danger);
    }

    #[test]
    fn test_map_pair_fdv_fallback() {
        let pair: PairPayload = serde_json::from_value(serde_json::json!({
            "baseToken": { "address": "mint3", "symbol": "CAT" },
            "fdv": 75000.0,
        }))
        .unwrap();
        let token = FeedScanner::map_pair(&pair, &profile("mint3")).unwrap();
        assert_eq!(token.market_cap, 75_000.0);
    }

    #[test]
    fn test_map_push_token() {
        let payload: PushTokenPayload = serde_json::from_str(
            r#"{"mint":"mint4","name":"Pepe","symbol":"PEPE","price":0.0001,"marketCapSol":60000.0,"vSolInBondingCurve":30.0}"#,
        )
        .unwrap();
        let token = FeedScanner::map_push_token(&payload);
        assert_eq!(token.symbol, "$PEPE");
        assert_eq!(token.decimals, 6);
        assert_eq!(token.source, TokenSource::PumpFun);
        assert_eq!(token.liquidity, 30.0);
        // Holders unknown: only liquidity/mcap can tier it
        assert_eq!(token.risk, RiskLevel::Safe);
    }

    #[tokio::test]
    async fn test_ingest_publishes_discovery_and_opportunity() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let scanner = FeedScanner::new(
            FeedScannerConfig::default(),
            Arc::new(TokenRegistry::new()),
            bus,
        )
        .unwrap();

        let payload: PushTokenPayload = serde_json::from_str(
            r#"{"mint":"mint5","name":"Wif","symbol":"WIF","price":0.001,"marketCapSol":80000.0,"vSolInBondingCurve":60.0}"#,
        )
        .unwrap();
        scanner.handle_push_token(payload.clone()).await;

        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineEvent::TokenDiscovered(_)
        ));
        // Fresh, liquid, safe: qualifies as an opportunity too
        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineEvent::OpportunityFound(_)
        ));

        // Second sighting only refreshes the price, no new events
        let mut repeat = payload;
        repeat.price = 0.002;
        scanner.handle_push_token(repeat).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(
            scanner.registry.get("mint5").await.unwrap().price,
            0.002
        );
    }

    #[tokio::test]
    async fn test_scan_interval_validation() {
        let config = FeedScannerConfig {
            profile_batch: 0,
            ..Default::default()
        };
        assert!(FeedScanner::new(
            config,
            Arc::new(TokenRegistry::new()),
            EventBus::default()
        )
        .is_err());
    }
}
