//! Market conditions model.
//!
//! Turns a rolling window of observed prices, the latest 24h change and a
//! fear & greed score into a single [`MarketConditions`] snapshot. All
//! functions here are total over finite inputs; upstream sources are
//! responsible for substituting fallbacks before calling in.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use crate::config::MarketConfig;
use crate::types::{MarketConditions, Sentiment, VolatilityThresholds};

/// Hourly samples per year, used to annualise the return deviation.
const HOURS_PER_YEAR: f64 = 8760.0;

/// Divisor mapping annualised volatility onto the [0, 1] index.
const NORMALISATION: f64 = 2.0;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConditionsConfig {
    pub thresholds: VolatilityThresholds,
    pub history_window: usize,
    /// Index used while fewer than two prices have been observed.
    pub cold_start_volatility: f64,
    pub large_move: f64,
    pub extreme_move: f64,
}

impl Default for ConditionsConfig {
    fn default() -> Self {
        Self {
            thresholds: VolatilityThresholds::default(),
            history_window: 24,
            cold_start_volatility: 0.05,
            large_move: 0.05,
            extreme_move: 0.10,
        }
    }
}

impl From<&MarketConfig> for ConditionsConfig {
    fn from(cfg: &MarketConfig) -> Self {
        Self {
            thresholds: cfg.thresholds(),
            history_window: cfg.history_window,
            cold_start_volatility: cfg.cold_start_volatility,
            large_move: cfg.large_move,
            extreme_move: cfg.extreme_move,
        }
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Volatility index from a price series.
///
/// Log-returns between consecutive prices, their standard deviation scaled
/// by √8760 (hourly cadence), halved and capped at 1.0. Fewer than two
/// prices yield `cold_start`.
pub fn volatility_from_history<'a, I>(prices: I, cold_start: f64) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut iter = prices.into_iter();
    let Some(mut prev) = iter.next().copied() else {
        return cold_start;
    };

    let mut returns = Vec::new();
    for &price in iter {
        returns.push((price / prev).ln());
        prev = price;
    }

    if returns.is_empty() {
        return cold_start;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let annualised = variance.sqrt() * HOURS_PER_YEAR.sqrt();

    (annualised / NORMALISATION).min(1.0)
}

/// Raise the estimate when a single daily move is large, so a quiet
/// history window cannot mask it.
pub fn apply_daily_move_floor(volatility: f64, change_24h: f64, config: &ConditionsConfig) -> f64 {
    let magnitude = change_24h.abs();
    if magnitude > config.extreme_move {
        volatility.max(config.thresholds.high)
    } else if magnitude > config.large_move {
        volatility.max(config.thresholds.medium)
    } else {
        volatility
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Stateful classifier owning the rolling price window.
#[derive(Debug, Clone)]
pub struct ConditionsModel {
    config: ConditionsConfig,
    history: VecDeque<f64>,
}

impl ConditionsModel {
    pub fn new(config: ConditionsConfig) -> Self {
        let capacity = config.history_window;
        Self {
            config,
            history: VecDeque::with_capacity(capacity),
        }
    }

    pub fn config(&self) -> &ConditionsConfig {
        &self.config
    }

    /// Prices currently retained, oldest first.
    pub fn history(&self) -> &VecDeque<f64> {
        &self.history
    }

    /// Append a price sample, discarding the oldest beyond the window.
    /// Non-positive or non-finite prices (failed fetches) are ignored.
    pub fn observe_price(&mut self, price: f64) {
        if !(price.is_finite() && price > 0.0) {
            return;
        }
        self.history.push_back(price);
        while self.history.len() > self.config.history_window {
            self.history.pop_front();
        }
    }

    /// Classify the current window plus the latest readings.
    pub fn classify(
        &self,
        price: f64,
        change_24h: f64,
        gas_price_gwei: f64,
        sentiment_score: u8,
        timestamp: DateTime<Utc>,
    ) -> MarketConditions {
        let base = volatility_from_history(&self.history, self.config.cold_start_volatility);
        let volatility_index = apply_daily_move_floor(base, change_24h, &self.config);

        MarketConditions {
            timestamp,
            price,
            change_24h,
            volatility_index,
            gas_price_gwei,
            sentiment: Sentiment::from_score(sentiment_score),
            thresholds: self.config.thresholds,
        }
    }

    /// Record `price` then classify, the per-cycle entry point.
    pub fn observe_and_classify(
        &mut self,
        price: f64,
        change_24h: f64,
        gas_price_gwei: f64,
        sentiment_score: u8,
    ) -> MarketConditions {
        self.observe_price(price);
        self.classify(price, change_24h, gas_price_gwei, sentiment_score, Utc::now())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
