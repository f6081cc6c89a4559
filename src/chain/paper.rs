//! Paper chain: simulated balances on both chains.
//!
//! Implements both [`ChainReader`] and [`ChainExecutor`] over one shared
//! in-memory ledger, so a dispatched decision is visible in the next read.
//! Bridges settle instantly. Swap fees accrue on every read at the current
//! hook fee over a notional volume proportional to the deployed balance.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::{ChainExecutor, ChainReader, ChainSnapshot};
use crate::config::ExecutorConfig;
use crate::types::{to_stable, Action, Decision, DecisionParams, VelvetError};

/// Hook fees are expressed in millionths (3000 = 0.30%).
const FEE_DENOMINATOR: u128 = 1_000_000;
const BPS: u128 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperLedger {
    pub balance_home: u64,
    pub balance_yield: u64,
    pub fee_bps: u32,
    pub fees_earned: u64,
    /// Share of the yield balance swapped through the pool per read.
    pub turnover_bps: u32,
    pub dispatch_count: u64,
}

impl PaperLedger {
    fn accrue_fees(&mut self) {
        let volume = self.balance_yield as u128 * self.turnover_bps as u128 / BPS;
        let earned = volume * self.fee_bps as u128 / FEE_DENOMINATOR;
        self.fees_earned = self
            .fees_earned
            .saturating_add(u64::try_from(earned).unwrap_or(u64::MAX));
    }

    fn apply(&mut self, decision: &Decision) -> Result<(), VelvetError> {
        let reject = |message: String| VelvetError::Dispatch {
            action: decision.action,
            message,
        };

        match (&decision.action, &decision.params) {
            (Action::Deploy, DecisionParams::Deploy { amount, .. }) => {
                if *amount > self.balance_home {
                    return Err(reject(format!(
                        "deploy of {} exceeds home balance {}",
                        to_stable(*amount),
                        to_stable(self.balance_home)
                    )));
                }
                self.balance_home -= amount;
                self.balance_yield += amount;
            }
            (Action::Withdraw, DecisionParams::Withdraw { amount }) => {
                if *amount > self.balance_yield {
                    return Err(reject(format!(
                        "withdraw of {} exceeds yield balance {}",
                        to_stable(*amount),
                        to_stable(self.balance_yield)
                    )));
                }
                self.balance_yield -= amount;
                self.balance_home += amount;
            }
            (Action::EmergencyExit, DecisionParams::EmergencyExit { .. }) => {
                self.balance_home += self.balance_yield;
                self.balance_yield = 0;
            }
            (Action::AdjustFee, DecisionParams::AdjustFee { new_fee_bps }) => {
                self.fee_bps = *new_fee_bps;
            }
            (Action::Hold, _) => return Err(reject("HOLD is not dispatchable".into())),
            (action, params) => {
                return Err(reject(format!("parameters {params:?} do not match {action}")));
            }
        }

        self.dispatch_count += 1;
        Ok(())
    }
}

/// Cloneable handle; all clones share the same ledger.
#[derive(Debug, Clone)]
pub struct PaperChain {
    ledger: Arc<RwLock<PaperLedger>>,
}

impl PaperChain {
    pub fn new(balance_home: u64, balance_yield: u64, fee_bps: u32, turnover_bps: u32) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(PaperLedger {
                balance_home,
                balance_yield,
                fee_bps,
                fees_earned: 0,
                turnover_bps,
                dispatch_count: 0,
            })),
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(
            config.paper_home_balance,
            config.paper_yield_balance,
            config.paper_fee_bps,
            config.paper_turnover_bps,
        )
    }

    /// Copy of the current ledger, without accruing fees.
    pub async fn ledger(&self) -> PaperLedger {
        self.ledger.read().await.clone()
    }
}

#[async_trait]
impl ChainReader for PaperChain {
    fn name(&self) -> &'static str {
        "paper"
    }

    async fn read(&self) -> ChainSnapshot {
        let mut ledger = self.ledger.write().await;
        ledger.accrue_fees();
        ChainSnapshot {
            balance_home: ledger.balance_home,
            balance_yield: ledger.balance_yield,
            current_fee_bps: ledger.fee_bps,
            fees_earned: ledger.fees_earned,
        }
    }
}

#[async_trait]
impl ChainExecutor for PaperChain {
    fn name(&self) -> &'static str {
        "paper"
    }

    async fn dispatch(&self, decision: &Decision) -> Result<String> {
        let mut ledger = self.ledger.write().await;
        ledger.apply(decision)?;

        let tx_hash = format!("paper-{}", uuid::Uuid::new_v4());
        info!(
            action = %decision.action,
            tx = %tx_hash,
            home_balance = %to_stable(ledger.balance_home),
            yield_balance = %to_stable(ledger.balance_yield),
            fee_bps = ledger.fee_bps,
            "[PAPER] Decision applied"
        );
        Ok(tx_hash)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
