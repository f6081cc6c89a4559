//! Chain collaborators.
//!
//! The agent touches the two chains only through these traits:
//!
//! - [`ChainReader`]: balances on both chains plus the pool hook's fee state.
//! - [`ChainExecutor`]: turns a [`Decision`] into a transaction.
//! - [`BridgeMonitor`]: decides whether an in-flight bridge has landed.
//!
//! Implementations: [`paper::PaperChain`] (simulated, reader + executor),
//! [`rpc::RpcChainReader`] (live JSON-RPC reads) and
//! [`dry_run::DryRunExecutor`] (logs, never broadcasts).

pub mod dry_run;
pub mod paper;
pub mod rpc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Decision, Position};

/// On-chain view used to build the agent state each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub balance_home: u64,
    pub balance_yield: u64,
    pub current_fee_bps: u32,
    pub fees_earned: u64,
}

/// Reads balances and hook state. Never fails: unreadable values are
/// replaced by fallbacks and logged.
#[async_trait]
pub trait ChainReader: Send + Sync {
    fn name(&self) -> &'static str;

    async fn read(&self) -> ChainSnapshot;
}

/// Dispatches decisions on-chain.
///
/// Returns the transaction id on success. An empty id is treated as a
/// failure by the orchestrator. The orchestrator never retries within a
/// cycle; any retry policy belongs to the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn dispatch(&self, decision: &Decision) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Bridge confirmation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeDirection {
    ToYield,
    ToHome,
}

impl BridgeDirection {
    /// Position a bridge in this direction departs from.
    pub fn origin(&self) -> Position {
        match self {
            BridgeDirection::ToYield => Position::Home,
            BridgeDirection::ToHome => Position::Yield,
        }
    }

    /// Position held while the bridge is in flight.
    pub fn in_flight(&self) -> Position {
        match self {
            BridgeDirection::ToYield => Position::BridgingToYield,
            BridgeDirection::ToHome => Position::BridgingToHome,
        }
    }

    /// Position once the bridge has landed.
    pub fn landed(&self) -> Position {
        match self {
            BridgeDirection::ToYield => Position::Yield,
            BridgeDirection::ToHome => Position::Home,
        }
    }

    /// Balance on the destination chain.
    pub fn destination_balance(&self, snapshot: &ChainSnapshot) -> u64 {
        match self {
            BridgeDirection::ToYield => snapshot.balance_yield,
            BridgeDirection::ToHome => snapshot.balance_home,
        }
    }
}

impl fmt::Display for BridgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeDirection::ToYield => write!(f, "to_yield"),
            BridgeDirection::ToHome => write!(f, "to_home"),
        }
    }
}

/// A dispatched bridge awaiting confirmation on the destination chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBridge {
    pub direction: BridgeDirection,
    pub amount: u64,
    /// Destination balance observed just before dispatch.
    pub baseline: u64,
    pub tx_hash: String,
    pub dispatched_at: DateTime<Utc>,
}

pub trait BridgeMonitor: Send + Sync {
    fn has_landed(&self, pending: &PendingBridge, snapshot: &ChainSnapshot) -> bool;
}

/// Confirms a bridge once the destination balance rises above the
/// baseline recorded at dispatch. A zero-amount bridge lands immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceBridgeMonitor;

impl BridgeMonitor for BalanceBridgeMonitor {
    fn has_landed(&self, pending: &PendingBridge, snapshot: &ChainSnapshot) -> bool {
        pending.amount == 0 || pending.direction.destination_balance(snapshot) > pending.baseline
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
