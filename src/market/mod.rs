//! Market data acquisition and classification.
//!
//! A [`MarketDataSource`] returns raw readings with fallbacks already
//! substituted; the [`MarketScanner`] feeds them through the
//! [`ConditionsModel`] to produce one [`MarketConditions`] per cycle.

pub mod conditions;
pub mod feeds;

use async_trait::async_trait;
use tracing::info;

use crate::types::MarketConditions;
pub use conditions::{ConditionsConfig, ConditionsModel};

/// Raw readings for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMarketData {
    /// Spot price; 0 when the price feed failed.
    pub price: f64,
    /// Fractional 24h change.
    pub change_24h: f64,
    pub gas_price_gwei: f64,
    /// Fear & greed score 0–100.
    pub sentiment_score: u8,
}

/// Abstraction over external market data.
///
/// Implementations never fail: each unavailable reading is replaced by
/// its fallback before returning.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> RawMarketData;
}

/// Owns the data source and the rolling volatility model.
pub struct MarketScanner {
    source: Box<dyn MarketDataSource>,
    model: ConditionsModel,
}

impl MarketScanner {
    pub fn new(source: Box<dyn MarketDataSource>, config: ConditionsConfig) -> Self {
        Self {
            source,
            model: ConditionsModel::new(config),
        }
    }

    pub fn model(&self) -> &ConditionsModel {
        &self.model
    }

    /// Fetch fresh readings and classify them.
    pub async fn scan(&mut self) -> MarketConditions {
        let raw = self.source.fetch().await;
        let conditions = self.model.observe_and_classify(
            raw.price,
            raw.change_24h,
            raw.gas_price_gwei,
            raw.sentiment_score,
        );

        info!(
            source = self.source.name(),
            price = conditions.price,
            volatility = conditions.volatility_index,
            level = %conditions.volatility_level(),
            sentiment = %conditions.sentiment,
            samples = self.model.history().len(),
            "Market scanned"
        );

        conditions
    }
}
