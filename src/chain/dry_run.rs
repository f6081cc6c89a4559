//! Dry-run executor: logs each decision and returns a synthetic id.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::ChainExecutor;
use crate::types::{Action, Decision, VelvetError};

#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl ChainExecutor for DryRunExecutor {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn dispatch(&self, decision: &Decision) -> Result<String> {
        if decision.action == Action::Hold {
            return Err(VelvetError::Dispatch {
                action: decision.action,
                message: "HOLD is not dispatchable".into(),
            }
            .into());
        }

        let tx_hash = format!("dry-run-{}", uuid::Uuid::new_v4());
        info!(
            action = %decision.action,
            params = %serde_json::to_string(&decision.params)?,
            tx = %tx_hash,
            "[DRY RUN] Would dispatch"
        );
        Ok(tx_hash)
    }
}
