//! Deploy sizing.
//!
//! The deployed share of the home balance starts at a base allocation and
//! is scaled down by volatility level and market sentiment. All scaling is
//! done in basis points over `u128` so the final floor is exact.

use tracing::debug;

use crate::config::EngineConfig;
use crate::types::{Sentiment, VolatilityLevel};

const BPS: u128 = 10_000;

/// MEDIUM volatility keeps 60% of the base allocation.
const MEDIUM_SCALE_BPS: u128 = 6_000;
const FEAR_SCALE_BPS: u128 = 7_000;
const GREED_SCALE_BPS: u128 = 9_000;
const NEUTRAL_SCALE_BPS: u128 = 10_000;

#[derive(Debug, Clone)]
pub struct SizingConfig {
    /// Base share of the home balance (8000 = 80%).
    pub base_allocation_bps: u32,
    /// Floor applied to every deploy amount.
    pub min_deploy_amount: u64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            base_allocation_bps: 8_000,
            min_deploy_amount: 100_000_000,
        }
    }
}

impl From<&EngineConfig> for SizingConfig {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            base_allocation_bps: cfg.base_allocation_bps,
            min_deploy_amount: cfg.min_deploy_amount,
        }
    }
}

fn volatility_scale_bps(level: VolatilityLevel) -> u128 {
    match level {
        VolatilityLevel::Low => BPS,
        // HIGH and EXTREME never reach sizing through the engine; they take
        // the most conservative deployable scale when called directly.
        VolatilityLevel::Medium | VolatilityLevel::High | VolatilityLevel::Extreme => {
            MEDIUM_SCALE_BPS
        }
    }
}

fn sentiment_scale_bps(sentiment: Sentiment) -> u128 {
    match sentiment {
        Sentiment::Fear => FEAR_SCALE_BPS,
        Sentiment::Greed => GREED_SCALE_BPS,
        Sentiment::Neutral => NEUTRAL_SCALE_BPS,
    }
}

pub struct DeploySizer {
    config: SizingConfig,
}

impl DeploySizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    /// Amount to bridge to the yield chain, never below `min_deploy_amount`.
    pub fn deploy_amount(
        &self,
        balance_home: u64,
        level: VolatilityLevel,
        sentiment: Sentiment,
    ) -> u64 {
        let numerator = balance_home as u128
            * self.config.base_allocation_bps as u128
            * volatility_scale_bps(level)
            * sentiment_scale_bps(sentiment);
        let nominal = (numerator / (BPS * BPS * BPS)) as u64;
        let amount = nominal.max(self.config.min_deploy_amount);

        debug!(
            balance_home,
            %level,
            %sentiment,
            nominal,
            amount,
            "Deploy sized"
        );

        amount
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
