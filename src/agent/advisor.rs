//! Advisory Strategy
//!
//! Delegates candidate decisions to an external reasoning service with a
//! structured prompt and a strict JSON response contract. Any failure -
//! timeout, transport error, malformed response - falls back to the
//! rule-based strategy instead of failing the evaluation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::Token;
use super::strategy::{DecisionAction, DecisionStrategy, RuleBasedStrategy, TradeDecision};

/// Default chat-completions endpoint
pub const DEFAULT_ADVISOR_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("Advisory request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Advisory service returned status {0}")]
    Status(u16),

    #[error("Malformed advisory response: {0}")]
    Malformed(String),
}

/// Advisory service configuration
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    /// Hard cap on a single advisory round trip
    pub timeout: Duration,
}

impl AdvisorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_ADVISOR_URL.to_string(),
            api_key: api_key.into(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// The JSON contract the service must answer with
#[derive(Debug, Deserialize)]
struct AdvisorDecision {
    #[serde(default)]
    action: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    size: Option<f64>,
}

/// External-reasoning strategy with a rule-based fallback
pub struct AdvisoryStrategy {
    config: AdvisorConfig,
    http: Client,
    fallback: RuleBasedStrategy,
}

impl AdvisoryStrategy {
    pub fn new(config: AdvisorConfig, fallback: RuleBasedStrategy) -> Result<Self, AdvisorError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            http,
            fallback,
        })
    }

    fn build_prompt(token: &Token) -> String {
        let age_seconds = (Utc::now() - token.created_at).num_seconds().max(0);
        format!(
            "You are a DEGEN shitcoin sniper on Solana. Your job is to APE INTO new tokens FAST.\n\n\
             THIS IS MEMECOIN TRADING - tokens launch with 0 holders and 0 liquidity. That's NORMAL. You buy BEFORE others do.\n\n\
             TOKEN:\n\
             - Symbol: {}\n\
             - Name: {}\n\
             - Age: {} seconds old\n\
             - Holders: {}\n\
             - Liquidity: {} SOL\n\n\
             DEGEN RULES:\n\
             1. If token is <60 seconds old with a memeable/funny name -> BUY IT (0.1 SOL)\n\
             2. If token is 1-5 minutes old -> still consider buying\n\
             3. Only skip if: name is boring/scammy OR token is >10 min old\n\
             4. Zero holders/liquidity is EXPECTED for new tokens - don't skip for this reason\n\
             5. We have auto-exits at 2x, 5x, 10x - the goal is to catch pumps early\n\n\
             This is paper trading. Be AGGRESSIVE. We learn by doing.\n\n\
             Respond JSON only:\n\
             {{\n\
               \"action\": \"buy\" | \"skip\",\n\
               \"confidence\": 50-95,\n\
               \"reasoning\": \"one short sentence\",\n\
               \"size\": 0.1\n\
             }}",
            token.symbol, token.name, age_seconds, token.holders, token.liquidity
        )
    }

    /// Map the service's JSON content into a decision, clamping the size to
    /// the configured maximum.
    fn parse_decision(content: &str, max_trade_size: f64) -> Result<TradeDecision, AdvisorError> {
        let decision: AdvisorDecision =
            serde_json::from_str(content).map_err(|e| AdvisorError::Malformed(e.to_string()))?;

        let action = match decision.action.as_str() {
            "buy" => DecisionAction::Buy,
            "watch" => DecisionAction::Watch,
            _ => DecisionAction::Skip,
        };
        let reasoning = if decision.reasoning.is_empty() {
            "No reasoning provided".to_string()
        } else {
            decision.reasoning
        };

        Ok(TradeDecision {
            action,
            confidence: decision.confidence.clamp(0.0, 100.0) as u8,
            reasoning,
            size: decision.size.map(|s| s.min(max_trade_size)),
        })
    }

    async fn request_decision(&self, token: &Token) -> Result<TradeDecision, AdvisorError> {
        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": Self::build_prompt(token) }],
            "response_format": { "type": "json_object" },
            "max_tokens": 200,
        });

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdvisorError::Status(status.as_u16()));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("{}");
        Self::parse_decision(content, self.fallback.max_trade_size())
    }
}

#[async_trait]
impl DecisionStrategy for AdvisoryStrategy {
    fn name(&self) -> &str {
        "advisory"
    }

    async fn decide(&self, token: &Token) -> TradeDecision {
        match self.request_decision(token).await {
            Ok(decision) => {
                debug!(
                    "Advisor on {}: {:?} ({}%)",
                    token.symbol, decision.action, decision.confidence
                );
                decision
            }
            Err(e) => {
                warn!("Advisory decision failed, using rule-based: {}", e);
                self.fallback.decide(token).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RiskLevel, TokenSource};

    fn token() -> Token {
        Token {
            address: "mint1".to_string(),
            symbol: "$TEST".to_string(),
            name: "Test".to_string(),
            decimals: 6,
            source: TokenSource::PumpFun,
            created_at: Utc::now(),
            price: 0.001,
            price_change_24h: 0.0,
            market_cap: 100_000.0,
            volume_24h: 0.0,
            liquidity: 100.0,
            holders: 500,
            risk: RiskLevel::Safe,
            risk_reasons: vec![],
            image_url: None,
            website: None,
            twitter: None,
        }
    }

    #[test]
    fn test_parse_buy_decision_clamps_size() {
        let decision = AdvisoryStrategy::parse_decision(
            r#"{"action":"buy","confidence":88,"reasoning":"memeable name","size":5.0}"#,
            0.5,
        )
        .unwrap();
        assert_eq!(decision.action, DecisionAction::Buy);
        assert_eq!(decision.confidence, 88);
        assert_eq!(decision.size, Some(0.5));
    }

    #[test]
    fn test_parse_unknown_action_is_skip() {
        let decision =
            AdvisoryStrategy::parse_decision(r#"{"action":"hodl","confidence":50}"#, 0.5).unwrap();
        assert_eq!(decision.action, DecisionAction::Skip);
        assert_eq!(decision.reasoning, "No reasoning provided");
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(matches!(
            AdvisoryStrategy::parse_decision("not json", 0.5),
            Err(AdvisorError::Malformed(_))
        ));
    }

    #[test]
    fn test_prompt_carries_token_facts() {
        let prompt = AdvisoryStrategy::build_prompt(&token());
        assert!(prompt.contains("$TEST"));
        assert!(prompt.contains("Holders: 500"));
        assert!(prompt.contains("Liquidity: 100 SOL"));
    }

    #[tokio::test]
    async fn test_unreachable_service_falls_back() {
        let config = AdvisorConfig {
            api_url: "http://127.0.0.1:1/v1/chat/completions".to_string(),
            api_key: "test".to_string(),
            model: "test".to_string(),
            timeout: Duration::from_millis(500),
        };
        let fallback = RuleBasedStrategy::new(0.5).with_exploration_chance(0.0);
        let strategy = AdvisoryStrategy::new(config, fallback).unwrap();

        // Fresh, liquid, safe token: the fallback alone decides buy
        let decision = strategy.decide(&token()).await;
        assert_eq!(decision.action, DecisionAction::Buy);
    }
}
