//! Raw Feed Payloads
//!
//! Wire shapes for the push feed and the HTTP aggregator. Every field that a
//! source may omit carries a serde default so a sparse record degrades to
//! zero/unknown instead of failing the batch; records missing the address
//! are dropped at the normalization boundary.

use serde::Deserialize;

/// One message from the pumpportal-style push feed.
///
/// The feed multiplexes launch events and trade events over the same shape;
/// launches carry name/symbol, trades carry a `txType`.
#[derive(Debug, Clone, Deserialize)]
pub struct PushTokenPayload {
    /// Token mint address
    pub mint: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    /// Last price in SOL per token
    #[serde(default)]
    pub price: f64,
    /// Market cap (USD or SOL depending on source field)
    #[serde(default, alias = "usd_market_cap", alias = "marketCapSol")]
    pub market_cap: f64,
    /// Bonding-curve SOL reserves, our liquidity proxy
    #[serde(default, alias = "virtual_sol_reserves", alias = "vSolInBondingCurve")]
    pub sol_reserves: f64,
    /// "create" for launches, "buy"/"sell" for trades
    #[serde(default, alias = "txType")]
    pub tx_type: Option<String>,
    #[serde(default, alias = "uri")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
}

/// Envelope some feeds wrap payloads in
#[derive(Debug, Deserialize)]
pub struct PushEnvelope {
    pub data: PushTokenPayload,
}

/// Aggregator token profile (latest-listings endpoint)
#[derive(Debug, Clone, Deserialize)]
pub struct ProfilePayload {
    #[serde(default, alias = "chainId")]
    pub chain_id: String,
    #[serde(alias = "tokenAddress")]
    pub token_address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub holders: u64,
}

/// Aggregator per-address pair detail response
#[derive(Debug, Deserialize)]
pub struct PairResponse {
    #[serde(default)]
    pub pairs: Option<Vec<PairPayload>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairPayload {
    #[serde(default, alias = "baseToken")]
    pub base_token: Option<BaseTokenPayload>,
    #[serde(default, alias = "priceUsd")]
    pub price_usd: Option<String>,
    #[serde(default, alias = "priceChange")]
    pub price_change: Option<PriceChangePayload>,
    #[serde(default)]
    pub liquidity: Option<LiquidityPayload>,
    #[serde(default, alias = "marketCap")]
    pub market_cap: f64,
    #[serde(default)]
    pub fdv: f64,
    #[serde(default)]
    pub volume: Option<VolumePayload>,
    /// Pair creation time, epoch milliseconds
    #[serde(default, alias = "pairCreatedAt")]
    pub pair_created_at: Option<i64>,
    #[serde(default)]
    pub info: Option<PairInfoPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaseTokenPayload {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceChangePayload {
    #[serde(default)]
    pub h24: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiquidityPayload {
    #[serde(default)]
    pub usd: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumePayload {
    #[serde(default)]
    pub h24: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairInfoPayload {
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,
}
