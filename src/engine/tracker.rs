//! Position state machine.
//!
//! ```text
//!   HOME ──DEPLOY ok──▶ BRIDGING_TO_YIELD ──landed──▶ YIELD
//!   YIELD ──WITHDRAW / EMERGENCY_EXIT ok──▶ BRIDGING_TO_HOME ──landed──▶ HOME
//! ```
//!
//! Transitions out of HOME/YIELD happen only on a successful dispatch (a
//! non-empty transaction id) and stamp `last_bridge_time`. Transitions out
//! of the bridging states happen only when the [`BridgeMonitor`] reports the
//! funds have landed; confirmation never touches `last_bridge_time`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chain::{BridgeDirection, BridgeMonitor, ChainSnapshot, PendingBridge};
use crate::types::{Action, AgentState, Decision, Position};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionTracker {
    pub position: Position,
    pub last_bridge_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pending: Option<PendingBridge>,
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self {
            position: Position::Home,
            last_bridge_time: None,
            pending: None,
        }
    }
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an in-flight bridge against fresh balances. Returns the
    /// direction that landed, if any.
    pub fn confirm(
        &mut self,
        monitor: &dyn BridgeMonitor,
        snapshot: &ChainSnapshot,
    ) -> Option<BridgeDirection> {
        let direction = match (&self.pending, self.position) {
            (Some(pending), _) => monitor.has_landed(pending, snapshot).then_some(pending.direction),
            // Bridging with no record of the dispatch (e.g. state written by
            // an older build): fall back to any balance on the destination.
            (None, Position::BridgingToYield) => {
                (snapshot.balance_yield > 0).then_some(BridgeDirection::ToYield)
            }
            (None, Position::BridgingToHome) => {
                (snapshot.balance_home > 0).then_some(BridgeDirection::ToHome)
            }
            (None, _) => None,
        }?;

        let from = self.position;
        self.position = direction.landed();
        self.pending = None;
        info!(%from, to = %self.position, "Bridge confirmed");
        Some(direction)
    }

    /// Build the engine input from carried bookkeeping plus live balances.
    pub fn agent_state(&self, snapshot: &ChainSnapshot) -> AgentState {
        AgentState {
            position: self.position,
            balance_home: snapshot.balance_home,
            balance_yield: snapshot.balance_yield,
            last_bridge_time: self.last_bridge_time,
            fees_earned: snapshot.fees_earned,
            current_fee_bps: snapshot.current_fee_bps,
        }
    }

    /// Apply the outcome of a dispatch. `tx_hash` is `None` when the
    /// dispatch failed, in which case nothing changes.
    pub fn apply_dispatch(
        &mut self,
        decision: &Decision,
        tx_hash: Option<&str>,
        snapshot: &ChainSnapshot,
        now: DateTime<Utc>,
    ) {
        let Some(tx_hash) = tx_hash.filter(|tx| !tx.trim().is_empty()) else {
            return;
        };

        let (direction, amount) = match decision.action {
            Action::Deploy => (
                BridgeDirection::ToYield,
                decision.params.amount().unwrap_or_default(),
            ),
            Action::Withdraw => (
                BridgeDirection::ToHome,
                decision.params.amount().unwrap_or_default(),
            ),
            Action::EmergencyExit => (BridgeDirection::ToHome, snapshot.balance_yield),
            Action::AdjustFee | Action::Hold => return,
        };

        if self.position != direction.origin() {
            warn!(
                action = %decision.action,
                position = %self.position,
                "Dispatch succeeded from an unexpected position, state unchanged"
            );
            return;
        }

        self.position = direction.in_flight();
        self.last_bridge_time = Some(now);
        self.pending = Some(PendingBridge {
            direction,
            amount,
            baseline: direction.destination_balance(snapshot),
            tx_hash: tx_hash.to_string(),
            dispatched_at: now,
        });

        info!(
            action = %decision.action,
            position = %self.position,
            tx = tx_hash,
            amount,
            "Bridge dispatched"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
