//! HTTP market data source.
//!
//! Three independent reads per cycle, issued concurrently:
//!
//! - CoinGecko `simple/price`: spot price and 24h change (percent, scaled
//!   to a fraction here).
//! - alternative.me `/fng/`: fear & greed index, 0–100.
//! - `eth_gasPrice` over JSON-RPC: gas price in wei, reported in gwei.
//!
//! Each read has its own fallback so a single outage never fails the
//! cycle: price → (0, 0), gas → configured gwei, sentiment → neutral 50.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::{MarketDataSource, RawMarketData};
use crate::chain::rpc::JsonRpcClient;
use crate::config::MarketConfig;
use crate::types::VelvetError;

const WEI_PER_GWEI: f64 = 1e9;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CoinGeckoQuote {
    usd: Option<f64>,
    usd_24h_change: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FearGreedResponse {
    #[serde(default)]
    data: Vec<FearGreedEntry>,
}

#[derive(Debug, Deserialize)]
struct FearGreedEntry {
    value: String,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Extract `(price, change_24h)` for `coin_id`; the change is returned as
/// a fraction (2.5% → 0.025).
fn parse_price(body: &Value, coin_id: &str) -> Result<(f64, f64)> {
    let quotes: HashMap<String, CoinGeckoQuote> =
        serde_json::from_value(body.clone()).context("Unexpected CoinGecko response shape")?;
    let quote = quotes
        .get(coin_id)
        .with_context(|| format!("CoinGecko response missing {coin_id}"))?;
    let price = quote.usd.context("CoinGecko quote missing usd price")?;
    let change = quote.usd_24h_change.unwrap_or(0.0) / 100.0;
    Ok((price, change))
}

fn parse_sentiment(body: &Value) -> Result<u8> {
    let resp: FearGreedResponse =
        serde_json::from_value(body.clone()).context("Unexpected fear & greed response shape")?;
    let entry = resp.data.first().context("Fear & greed response has no data")?;
    let score: u32 = entry
        .value
        .trim()
        .parse()
        .with_context(|| format!("Invalid fear & greed value: {}", entry.value))?;
    Ok(score.min(100) as u8)
}

fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / WEI_PER_GWEI
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

pub struct HttpMarketSource {
    http: Client,
    gas_rpc: JsonRpcClient,
    coin_id: String,
    price_api_url: String,
    sentiment_api_url: String,
    fallback_gas_gwei: f64,
    fallback_sentiment_score: u8,
}

impl HttpMarketSource {
    pub fn new(config: &MarketConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent("VELVET-ARC/0.1.0")
            .build()
            .context("Failed to build market data HTTP client")?;
        let gas_rpc = JsonRpcClient::with_client(http.clone(), "gas", &config.gas_rpc_url);

        Ok(Self {
            http,
            gas_rpc,
            coin_id: config.coin_id.clone(),
            price_api_url: config.price_api_url.trim_end_matches('/').to_string(),
            sentiment_api_url: config.sentiment_api_url.clone(),
            fallback_gas_gwei: config.fallback_gas_gwei,
            fallback_sentiment_score: config.fallback_sentiment_score,
        })
    }

    fn price_url(&self) -> String {
        format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_24hr_change=true",
            self.price_api_url,
            urlencoding::encode(&self.coin_id),
        )
    }

    async fn get_json(&self, url: &str, label: &str) -> Result<Value> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("{label} request failed"))?;

        if !resp.status().is_success() {
            return Err(VelvetError::MarketData {
                source_name: label.to_string(),
                message: format!("HTTP {}", resp.status()),
            }
            .into());
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse {label} response"))
    }

    async fn fetch_price(&self) -> Result<(f64, f64)> {
        let body = self.get_json(&self.price_url(), "CoinGecko").await?;
        parse_price(&body, &self.coin_id)
    }

    async fn fetch_sentiment(&self) -> Result<u8> {
        let body = self.get_json(&self.sentiment_api_url, "Fear & greed").await?;
        parse_sentiment(&body)
    }

    async fn fetch_gas(&self) -> Result<f64> {
        let wei = self.gas_rpc.eth_gas_price().await?;
        Ok(wei_to_gwei(wei))
    }
}

#[async_trait]
impl MarketDataSource for HttpMarketSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self) -> RawMarketData {
        let (price, sentiment, gas) =
            tokio::join!(self.fetch_price(), self.fetch_sentiment(), self.fetch_gas());

        let (price, change_24h) = price.unwrap_or_else(|e| {
            warn!(error = %e, "Price fetch failed, using zero price");
            (0.0, 0.0)
        });
        let sentiment_score = sentiment.unwrap_or_else(|e| {
            warn!(error = %e, fallback = self.fallback_sentiment_score, "Sentiment fetch failed");
            self.fallback_sentiment_score
        });
        let gas_price_gwei = gas.unwrap_or_else(|e| {
            warn!(error = %e, fallback = self.fallback_gas_gwei, "Gas price fetch failed");
            self.fallback_gas_gwei
        });

        debug!(price, change_24h, gas_price_gwei, sentiment_score, "Market data fetched");

        RawMarketData {
            price,
            change_24h,
            gas_price_gwei,
            sentiment_score,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
