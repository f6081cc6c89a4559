//! Shared types for the VELVET ARC agent.
//!
//! These types form the data model used across all modules: the market
//! snapshot fed to the decision engine, the agent/position state, and the
//! decision value the engine produces. They are kept free of I/O so the
//! market, strategy, chain and engine modules can all depend on them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimals of the stablecoin moved between chains (USDC).
pub const STABLE_DECIMALS: u32 = 6;

/// Convert a smallest-unit stablecoin amount into a human-readable decimal.
pub fn to_stable(amount: u64) -> Decimal {
    Decimal::from_i128_with_scale(amount as i128, STABLE_DECIMALS)
}

// ---------------------------------------------------------------------------
// Volatility & sentiment
// ---------------------------------------------------------------------------

/// Four-band classification of the volatility index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl VolatilityLevel {
    pub const ALL: &'static [VolatilityLevel] = &[
        VolatilityLevel::Low,
        VolatilityLevel::Medium,
        VolatilityLevel::High,
        VolatilityLevel::Extreme,
    ];
}

impl fmt::Display for VolatilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolatilityLevel::Low => write!(f, "LOW"),
            VolatilityLevel::Medium => write!(f, "MEDIUM"),
            VolatilityLevel::High => write!(f, "HIGH"),
            VolatilityLevel::Extreme => write!(f, "EXTREME"),
        }
    }
}

/// Band boundaries of the volatility index. Each boundary belongs to the
/// higher band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityThresholds {
    /// LOW below this.
    pub low: f64,
    /// MEDIUM below this.
    pub medium: f64,
    /// HIGH below this, EXTREME at or above.
    pub high: f64,
}

impl Default for VolatilityThresholds {
    fn default() -> Self {
        Self {
            low: 0.02,
            medium: 0.08,
            high: 0.15,
        }
    }
}

impl VolatilityThresholds {
    pub fn level(&self, volatility_index: f64) -> VolatilityLevel {
        if volatility_index < self.low {
            VolatilityLevel::Low
        } else if volatility_index < self.medium {
            VolatilityLevel::Medium
        } else if volatility_index < self.high {
            VolatilityLevel::High
        } else {
            VolatilityLevel::Extreme
        }
    }
}

/// Market sentiment bucket derived from the fear & greed index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Fear,
    Neutral,
    Greed,
}

impl Sentiment {
    /// Map a 0–100 fear & greed score: below 25 is fear, above 75 is greed.
    pub fn from_score(score: u8) -> Self {
        if score < 25 {
            Sentiment::Fear
        } else if score > 75 {
            Sentiment::Greed
        } else {
            Sentiment::Neutral
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Fear => write!(f, "fear"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Greed => write!(f, "greed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Market conditions
// ---------------------------------------------------------------------------

/// Immutable market snapshot, created once per polling cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    pub timestamp: DateTime<Utc>,
    /// Underlying asset price in quote currency.
    pub price: f64,
    /// Signed fractional 24h change (0.05 = +5%).
    pub change_24h: f64,
    /// Normalised annualised volatility estimate in [0, 1].
    pub volatility_index: f64,
    pub gas_price_gwei: f64,
    pub sentiment: Sentiment,
    /// Band boundaries the derived level is computed against.
    pub thresholds: VolatilityThresholds,
}

impl fmt::Display for MarketConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "price=${:.2} 24h={:+.2}% vol={:.2}% [{}] gas={:.1}gwei sentiment={}",
            self.price,
            self.change_24h * 100.0,
            self.volatility_index * 100.0,
            self.volatility_level(),
            self.gas_price_gwei,
            self.sentiment,
        )
    }
}

impl MarketConditions {
    pub fn volatility_level(&self) -> VolatilityLevel {
        self.thresholds.level(self.volatility_index)
    }

    pub fn is_safe_to_deploy(&self) -> bool {
        matches!(
            self.volatility_level(),
            VolatilityLevel::Low | VolatilityLevel::Medium
        )
    }

    pub fn should_withdraw(&self) -> bool {
        self.volatility_level() == VolatilityLevel::High
    }

    pub fn emergency_exit_needed(&self) -> bool {
        self.volatility_level() == VolatilityLevel::Extreme
    }

    /// Helper to build a snapshot with a given index and sentiment.
    #[cfg(test)]
    pub fn sample(volatility_index: f64, sentiment: Sentiment) -> Self {
        MarketConditions {
            timestamp: Utc::now(),
            price: 3000.0,
            change_24h: 0.01,
            volatility_index,
            gas_price_gwei: 20.0,
            sentiment,
            thresholds: VolatilityThresholds::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Position & agent state
// ---------------------------------------------------------------------------

/// Where the pooled liquidity currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Position {
    Home,
    BridgingToYield,
    Yield,
    BridgingToHome,
}

impl Position {
    pub fn is_bridging(&self) -> bool {
        matches!(self, Position::BridgingToYield | Position::BridgingToHome)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Home => write!(f, "HOME"),
            Position::BridgingToYield => write!(f, "BRIDGING_TO_YIELD"),
            Position::Yield => write!(f, "YIELD"),
            Position::BridgingToHome => write!(f, "BRIDGING_TO_HOME"),
        }
    }
}

/// Agent state handed to the decision engine. Rebuilt every cycle from
/// live balances plus the bookkeeping fields carried by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub position: Position,
    /// Smallest-unit stablecoin balance on the home chain.
    pub balance_home: u64,
    /// Smallest-unit stablecoin balance on the yield chain.
    pub balance_yield: u64,
    pub last_bridge_time: Option<DateTime<Utc>>,
    pub fees_earned: u64,
    pub current_fee_bps: u32,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | home={} | yield={} | fee={}bps | fees_earned={}",
            self.position,
            to_stable(self.balance_home),
            to_stable(self.balance_yield),
            self.current_fee_bps,
            to_stable(self.fees_earned),
        )
    }
}

impl AgentState {
    /// Fresh state with all capital at home.
    pub fn at_home(balance_home: u64, current_fee_bps: u32) -> Self {
        Self {
            position: Position::Home,
            balance_home,
            balance_yield: 0,
            last_bridge_time: None,
            fees_earned: 0,
            current_fee_bps,
        }
    }

    /// Total capital across both chains.
    pub fn total_balance(&self) -> u64 {
        self.balance_home.saturating_add(self.balance_yield)
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Agent action taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Hold,
    Deploy,
    Withdraw,
    EmergencyExit,
    AdjustFee,
}

impl Action {
    /// Actions that move capital between chains.
    pub fn is_bridging(&self) -> bool {
        matches!(self, Action::Deploy | Action::Withdraw | Action::EmergencyExit)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Hold => write!(f, "HOLD"),
            Action::Deploy => write!(f, "DEPLOY"),
            Action::Withdraw => write!(f, "WITHDRAW"),
            Action::EmergencyExit => write!(f, "EMERGENCY_EXIT"),
            Action::AdjustFee => write!(f, "ADJUST_FEE"),
        }
    }
}

/// Action-specific parameters. Serialises as a flat JSON object, e.g.
/// `{"amount": 800000000, "destination": "YIELD"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecisionParams {
    None {},
    EmergencyExit { full_withdrawal: bool },
    Withdraw { amount: u64 },
    Deploy { amount: u64, destination: Position },
    AdjustFee { new_fee_bps: u32 },
}

impl DecisionParams {
    pub fn none() -> Self {
        DecisionParams::None {}
    }

    /// Amount carried by DEPLOY / WITHDRAW parameters.
    pub fn amount(&self) -> Option<u64> {
        match self {
            DecisionParams::Withdraw { amount } | DecisionParams::Deploy { amount, .. } => {
                Some(*amount)
            }
            _ => None,
        }
    }

    pub fn new_fee_bps(&self) -> Option<u32> {
        match self {
            DecisionParams::AdjustFee { new_fee_bps } => Some(*new_fee_bps),
            _ => None,
        }
    }
}

/// One decision per cycle. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub action: Action,
    /// Engine confidence in [0, 1].
    pub confidence: f64,
    /// Human-readable reasoning embedding the numeric drivers.
    pub reasoning: String,
    pub params: DecisionParams,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.0}%): {}",
            self.action,
            self.confidence * 100.0,
            self.reasoning,
        )
    }
}

impl Decision {
    /// Whether two decisions agree on everything except their timestamp.
    pub fn same_outcome(&self, other: &Decision) -> bool {
        self.action == other.action
            && self.confidence == other.confidence
            && self.reasoning == other.reasoning
            && self.params == other.params
    }
}

// ---------------------------------------------------------------------------
// Execution log
// ---------------------------------------------------------------------------

/// Outcome of one agent cycle, kept in a bounded log for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub iteration: u64,
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    pub confidence: f64,
    pub reasoning: String,
    /// Transaction id of a successful dispatch; `None` for HOLD or failure.
    pub tx_hash: Option<String>,
    pub volatility: f64,
    pub price: f64,
    pub position_after: Position,
}

impl fmt::Display for ExecutionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} ({:.0}%) vol={:.2}% tx={} → {}",
            self.iteration,
            self.action,
            self.confidence * 100.0,
            self.volatility * 100.0,
            self.tx_hash.as_deref().unwrap_or("-"),
            self.position_after,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for VELVET ARC.
#[derive(Debug, thiserror::Error)]
pub enum VelvetError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Market data error ({source_name}): {message}")]
    MarketData { source_name: String, message: String },

    #[error("RPC error ({chain}): {message}")]
    Rpc { chain: String, message: String },

    #[error("Dispatch of {action} failed: {message}")]
    Dispatch { action: Action, message: String },

    #[error("State error: {0}")]
    State(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
