//! Persistence layer.
//!
//! Saves and loads the carried bookkeeping (position, last bridge time,
//! pending bridge, iteration counter) to/from a JSON file. Balances are
//! never persisted; they are re-read from the chains every iteration.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::engine::PositionTracker;
use crate::types::VelvetError;

/// Default state file path.
const DEFAULT_STATE_FILE: &str = "velvet_state.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub tracker: PositionTracker,
    pub iteration: u64,
    pub saved_at: DateTime<Utc>,
}

impl PersistedState {
    pub fn new(tracker: PositionTracker, iteration: u64) -> Self {
        Self {
            tracker,
            iteration,
            saved_at: Utc::now(),
        }
    }
}

/// Save state to a JSON file.
pub fn save_state(state: &PersistedState, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    let json = serde_json::to_string_pretty(state).context("Failed to serialise agent state")?;

    std::fs::write(path, &json).with_context(|| format!("Failed to write state to {path}"))?;

    debug!(
        path,
        position = %state.tracker.position,
        iteration = state.iteration,
        "State saved"
    );
    Ok(())
}

/// Load state from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_state(path: Option<&str>) -> Result<Option<PersistedState>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved state found, starting fresh");
        return Ok(None);
    }

    let json =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read state from {path}"))?;

    let state: PersistedState =
        serde_json::from_str(&json).with_context(|| format!("Failed to parse state from {path}"))?;
    check_consistent(&state.tracker).with_context(|| format!("Rejected state in {path}"))?;

    info!(
        path,
        position = %state.tracker.position,
        iteration = state.iteration,
        pending_bridge = state.tracker.pending.is_some(),
        saved_at = %state.saved_at,
        "State loaded from disk"
    );

    Ok(Some(state))
}

/// A pending bridge must match the in-flight position it belongs to.
fn check_consistent(tracker: &PositionTracker) -> std::result::Result<(), VelvetError> {
    match &tracker.pending {
        Some(pending) if pending.direction.in_flight() != tracker.position => {
            Err(VelvetError::State(format!(
                "pending {} bridge recorded while position is {}",
                pending.direction, tracker.position
            )))
        }
        _ => Ok(()),
    }
}

/// Delete the state file (for testing or reset).
pub fn delete_state(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path).with_context(|| format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
