//! Decision engine: volatility-driven liquidity routing.
//!
//! Given one [`AgentState`] and one [`MarketConditions`] the engine returns
//! exactly one [`Decision`], evaluating a fixed priority chain:
//!
//! 1. Emergency exit (EXTREME volatility)
//! 2. Withdraw (HIGH volatility, capital on the yield chain)
//! 3. Deploy (LOW/MEDIUM volatility, capital at home, enough balance)
//! 4. Fee adjustment (optimal fee drifted past the threshold)
//! 5. Hold
//!
//! Bridging actions are suppressed while a bridge cooldown is running.
//! The engine never performs I/O; its only state is a bounded log of
//! recorded decisions.

pub mod fees;
pub mod sizing;

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::types::{
    to_stable, Action, AgentState, Decision, DecisionParams, MarketConditions, Position,
    VolatilityLevel,
};
use fees::{fee_percent, FeeSchedule};
use sizing::{DeploySizer, SizingConfig};

const CONFIDENCE_EMERGENCY: f64 = 1.0;
const CONFIDENCE_WITHDRAW: f64 = 0.85;
const CONFIDENCE_DEPLOY_LOW: f64 = 0.9;
const CONFIDENCE_DEPLOY: f64 = 0.7;
const CONFIDENCE_ADJUST_FEE: f64 = 0.75;
const CONFIDENCE_HOLD: f64 = 0.6;

pub struct DecisionEngine {
    sizer: DeploySizer,
    fees: FeeSchedule,
    min_deploy_amount: u64,
    bridge_cooldown: Duration,
    history: VecDeque<Decision>,
    history_capacity: usize,
}

impl DecisionEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            sizer: DeploySizer::new(SizingConfig::from(config)),
            fees: FeeSchedule::from(config),
            min_deploy_amount: config.min_deploy_amount,
            bridge_cooldown: Duration::seconds(config.bridge_cooldown_secs),
            history: VecDeque::with_capacity(config.history_capacity),
            history_capacity: config.history_capacity.max(1),
        }
    }

    pub fn bridge_cooldown(&self) -> Duration {
        self.bridge_cooldown
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Whether a bridge happened less than `bridge_cooldown` before `now`.
    pub fn in_cooldown(&self, state: &AgentState, now: DateTime<Utc>) -> bool {
        match state.last_bridge_time {
            Some(t) => now.signed_duration_since(t) < self.bridge_cooldown,
            None => false,
        }
    }

    /// Decide against the current wall clock.
    pub fn decide(&self, state: &AgentState, conditions: &MarketConditions) -> Decision {
        self.decide_at(state, conditions, Utc::now())
    }

    /// Decide as of `now`. Total over well-formed inputs.
    pub fn decide_at(
        &self,
        state: &AgentState,
        conditions: &MarketConditions,
        now: DateTime<Utc>,
    ) -> Decision {
        let level = conditions.volatility_level();
        let vol_pct = conditions.volatility_index * 100.0;
        let cooldown = self.in_cooldown(state, now);

        debug!(
            %level,
            position = %state.position,
            cooldown,
            balance_home = state.balance_home,
            balance_yield = state.balance_yield,
            "Evaluating decision"
        );

        // 1. Emergency exit
        if conditions.emergency_exit_needed() {
            return if state.position == Position::Yield {
                decision(
                    Action::EmergencyExit,
                    CONFIDENCE_EMERGENCY,
                    format!("CRITICAL: Volatility at {vol_pct:.1}%. Emergency exit triggered."),
                    DecisionParams::EmergencyExit {
                        full_withdrawal: true,
                    },
                    now,
                )
            } else {
                decision(
                    Action::Hold,
                    CONFIDENCE_EMERGENCY,
                    format!(
                        "Emergency conditions (volatility {vol_pct:.1}%) but no capital at risk on the yield chain."
                    ),
                    DecisionParams::none(),
                    now,
                )
            };
        }

        // 2. Withdraw
        if conditions.should_withdraw() && state.position == Position::Yield && !cooldown {
            return decision(
                Action::Withdraw,
                CONFIDENCE_WITHDRAW,
                format!(
                    "High volatility ({vol_pct:.1}%). Withdrawing {} to safety.",
                    to_stable(state.balance_yield)
                ),
                DecisionParams::Withdraw {
                    amount: state.balance_yield,
                },
                now,
            );
        }

        // 3. Deploy
        if conditions.is_safe_to_deploy()
            && state.position == Position::Home
            && !cooldown
            && state.balance_home >= self.min_deploy_amount
        {
            let amount = self
                .sizer
                .deploy_amount(state.balance_home, level, conditions.sentiment);
            let confidence = if level == VolatilityLevel::Low {
                CONFIDENCE_DEPLOY_LOW
            } else {
                CONFIDENCE_DEPLOY
            };
            return decision(
                Action::Deploy,
                confidence,
                format!(
                    "{level} volatility ({vol_pct:.1}%), {} sentiment. Deploying {} for yield.",
                    conditions.sentiment,
                    to_stable(amount)
                ),
                DecisionParams::Deploy {
                    amount,
                    destination: Position::Yield,
                },
                now,
            );
        }

        // 4. Fee adjustment
        let optimal = self.fees.optimal_fee(level);
        if self.fees.needs_adjustment(state.current_fee_bps, optimal) {
            return decision(
                Action::AdjustFee,
                CONFIDENCE_ADJUST_FEE,
                format!(
                    "Adjusting fee from {} to {} for {level} volatility.",
                    fee_percent(state.current_fee_bps),
                    fee_percent(optimal)
                ),
                DecisionParams::AdjustFee {
                    new_fee_bps: optimal,
                },
                now,
            );
        }

        // 5. Hold
        let blocked = conditions.should_withdraw() || conditions.is_safe_to_deploy();
        let reasoning = if cooldown && blocked {
            format!(
                "Market stable. Maintaining current position on {} (bridge cooldown active).",
                state.position
            )
        } else {
            format!("Market stable. Maintaining current position on {}.", state.position)
        };
        decision(Action::Hold, CONFIDENCE_HOLD, reasoning, DecisionParams::none(), now)
    }

    /// Append to the bounded history, evicting the oldest entries.
    pub fn record_decision(&mut self, decision: Decision) {
        info!(
            action = %decision.action,
            confidence = format!("{:.0}%", decision.confidence * 100.0),
            reasoning = %decision.reasoning,
            "Decision recorded"
        );

        self.history.push_back(decision);
        while self.history.len() > self.history_capacity {
            self.history.pop_front();
        }
    }

    /// Recorded decisions, oldest first.
    pub fn history(&self) -> &VecDeque<Decision> {
        &self.history
    }

    pub fn last_decision(&self) -> Option<&Decision> {
        self.history.back()
    }
}

fn decision(
    action: Action,
    confidence: f64,
    reasoning: String,
    params: DecisionParams,
    timestamp: DateTime<Utc>,
) -> Decision {
    Decision {
        action,
        confidence,
        reasoning,
        params,
        timestamp,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
