//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>` and
//! refreshed by the main loop after every iteration.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chain::PendingBridge;
use crate::engine::Agent;
use crate::types::{to_stable, Decision, ExecutionRecord, MarketConditions, Position};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub started_at: DateTime<Utc>,
    pub status: RwLock<StatusResponse>,
    pub conditions: RwLock<Option<MarketConditions>>,
    pub decisions: RwLock<Vec<Decision>>,
    pub executions: RwLock<Vec<ExecutionRecord>>,
}

impl DashboardState {
    pub fn new(agent_name: &str, executor: &str) -> Self {
        Self {
            started_at: Utc::now(),
            status: RwLock::new(StatusResponse::initial(agent_name, executor)),
            conditions: RwLock::new(None),
            decisions: RwLock::new(Vec::new()),
            executions: RwLock::new(Vec::new()),
        }
    }

    /// Copy the agent's latest view into the shared state.
    pub async fn publish(&self, agent: &Agent) {
        {
            let mut status = self.status.write().await;
            status.position = agent.tracker().position;
            status.iteration = agent.iteration();
            status.last_bridge_time = agent.tracker().last_bridge_time;
            status.pending_bridge = agent.tracker().pending.clone();
            if let Some(state) = agent.last_state() {
                status.balance_home = to_stable(state.balance_home);
                status.balance_yield = to_stable(state.balance_yield);
                status.total_balance = to_stable(state.total_balance());
                status.fees_earned = to_stable(state.fees_earned);
                status.current_fee_bps = state.current_fee_bps;
                status.in_cooldown = agent.engine().in_cooldown(state, Utc::now());
            }
        }

        *self.conditions.write().await = agent.last_conditions().cloned();
        *self.decisions.write().await = agent.engine().history().iter().cloned().collect();
        *self.executions.write().await = agent.executions().iter().cloned().collect();
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub agent_name: String,
    pub executor: String,
    pub position: Position,
    pub balance_home: Decimal,
    pub balance_yield: Decimal,
    pub total_balance: Decimal,
    pub fees_earned: Decimal,
    pub current_fee_bps: u32,
    pub iteration: u64,
    pub last_bridge_time: Option<DateTime<Utc>>,
    pub pending_bridge: Option<PendingBridge>,
    pub in_cooldown: bool,
    pub uptime_secs: i64,
}

impl StatusResponse {
    fn initial(agent_name: &str, executor: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            executor: executor.to_string(),
            position: Position::Home,
            balance_home: Decimal::ZERO,
            balance_yield: Decimal::ZERO,
            total_balance: Decimal::ZERO,
            fees_earned: Decimal::ZERO,
            current_fee_bps: 0,
            iteration: 0,
            last_bridge_time: None,
            pending_bridge: None,
            in_cooldown: false,
            uptime_secs: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub type AppState = Arc<DashboardState>;

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let mut status = state.status.read().await.clone();
    status.uptime_secs = (Utc::now() - state.started_at).num_seconds();
    Json(status)
}

/// GET /api/conditions
pub async fn get_conditions(
    State(state): State<AppState>,
) -> Result<Json<MarketConditions>, StatusCode> {
    state
        .conditions
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or(StatusCode::NO_CONTENT)
}

/// GET /api/decisions
pub async fn get_decisions(State(state): State<AppState>) -> Json<Vec<Decision>> {
    Json(state.decisions.read().await.clone())
}

/// GET /api/executions
pub async fn get_executions(State(state): State<AppState>) -> Json<Vec<ExecutionRecord>> {
    Json(state.executions.read().await.clone())
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
