//! Agent orchestrator.
//!
//! One iteration runs to completion before the next begins:
//!
//! 1. Scan market conditions (price, gas and sentiment fetched concurrently)
//! 2. Read balances and hook state
//! 3. Confirm any in-flight bridge
//! 4. Build the agent state and decide
//! 5. Record the decision
//! 6. Dispatch anything other than HOLD (at most once)
//! 7. Update the position tracker and the execution log

use chrono::Utc;
use std::collections::VecDeque;
use tracing::{error, info};

use crate::chain::{BridgeMonitor, ChainExecutor, ChainReader, ChainSnapshot};
use crate::engine::tracker::PositionTracker;
use crate::market::MarketScanner;
use crate::strategy::DecisionEngine;
use crate::types::{Action, AgentState, Decision, ExecutionRecord, MarketConditions};

pub struct Agent {
    scanner: MarketScanner,
    reader: Box<dyn ChainReader>,
    executor: Box<dyn ChainExecutor>,
    monitor: Box<dyn BridgeMonitor>,
    engine: DecisionEngine,
    tracker: PositionTracker,
    iteration: u64,
    executions: VecDeque<ExecutionRecord>,
    execution_capacity: usize,
    last_conditions: Option<MarketConditions>,
    last_state: Option<AgentState>,
}

impl Agent {
    pub fn new(
        scanner: MarketScanner,
        reader: Box<dyn ChainReader>,
        executor: Box<dyn ChainExecutor>,
        monitor: Box<dyn BridgeMonitor>,
        engine: DecisionEngine,
        execution_capacity: usize,
    ) -> Self {
        Self {
            scanner,
            reader,
            executor,
            monitor,
            engine,
            tracker: PositionTracker::default(),
            iteration: 0,
            executions: VecDeque::with_capacity(execution_capacity),
            execution_capacity: execution_capacity.max(1),
            last_conditions: None,
            last_state: None,
        }
    }

    /// Resume from persisted bookkeeping.
    pub fn with_restored(mut self, tracker: PositionTracker, iteration: u64) -> Self {
        self.tracker = tracker;
        self.iteration = iteration;
        self
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn executions(&self) -> &VecDeque<ExecutionRecord> {
        &self.executions
    }

    pub fn last_conditions(&self) -> Option<&MarketConditions> {
        self.last_conditions.as_ref()
    }

    /// Agent state as seen by the engine in the latest iteration.
    pub fn last_state(&self) -> Option<&AgentState> {
        self.last_state.as_ref()
    }

    pub fn executor_name(&self) -> &'static str {
        self.executor.name()
    }

    /// Run one full iteration. Collaborator failures are absorbed as
    /// fallbacks or a missing transaction id, so this never fails.
    pub async fn run_iteration(&mut self) -> ExecutionRecord {
        self.iteration += 1;
        info!(iteration = self.iteration, "Starting iteration");

        // 1-2. Observe
        let conditions = self.scanner.scan().await;
        let snapshot = self.reader.read().await;

        // 3. Confirm bridges
        self.tracker.confirm(self.monitor.as_ref(), &snapshot);

        // 4-5. Decide and record
        let state = self.tracker.agent_state(&snapshot);
        let decision = self.engine.decide(&state, &conditions);
        self.engine.record_decision(decision.clone());

        // 6-7. Dispatch and update bookkeeping
        let tx_hash = match decision.action {
            Action::Hold => None,
            _ => self.dispatch(&decision).await,
        };
        self.tracker
            .apply_dispatch(&decision, tx_hash.as_deref(), &snapshot, Utc::now());

        let record = ExecutionRecord {
            iteration: self.iteration,
            timestamp: decision.timestamp,
            action: decision.action,
            confidence: decision.confidence,
            reasoning: decision.reasoning.clone(),
            tx_hash,
            volatility: conditions.volatility_index,
            price: conditions.price,
            position_after: self.tracker.position,
        };
        self.push_execution(record.clone());
        self.log_iteration(&record, &snapshot);

        self.last_conditions = Some(conditions);
        self.last_state = Some(state);
        record
    }

    async fn dispatch(&self, decision: &Decision) -> Option<String> {
        match self.executor.dispatch(decision).await {
            Ok(tx) if !tx.trim().is_empty() => Some(tx),
            Ok(_) => {
                error!(
                    action = %decision.action,
                    executor = self.executor.name(),
                    "Dispatch returned an empty transaction id"
                );
                None
            }
            Err(e) => {
                error!(
                    action = %decision.action,
                    executor = self.executor.name(),
                    error = %e,
                    "Dispatch failed, state unchanged"
                );
                None
            }
        }
    }

    fn push_execution(&mut self, record: ExecutionRecord) {
        self.executions.push_back(record);
        while self.executions.len() > self.execution_capacity {
            self.executions.pop_front();
        }
    }

    fn log_iteration(&self, record: &ExecutionRecord, snapshot: &ChainSnapshot) {
        info!(
            iteration = record.iteration,
            action = %record.action,
            tx = record.tx_hash.as_deref().unwrap_or("-"),
            position = %record.position_after,
            balance_home = snapshot.balance_home,
            balance_yield = snapshot.balance_yield,
            fee_bps = snapshot.current_fee_bps,
            "Iteration complete"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::paper::PaperChain;
    use crate::chain::{BalanceBridgeMonitor, MockChainExecutor};
    use crate::config::EngineConfig;
    use crate::market::{ConditionsConfig, MarketDataSource, RawMarketData};
    use crate::types::Position;
    use async_trait::async_trait;

    /// Constant price with a fixed 24h change, so the floor sets the band.
    struct SteadySource {
        change_24h: f64,
    }

    #[async_trait]
    impl MarketDataSource for SteadySource {
        fn name(&self) -> &'static str {
            "steady"
        }

        async fn fetch(&self) -> RawMarketData {
            RawMarketData {
                price: 3000.0,
                change_24h: self.change_24h,
                gas_price_gwei: 20.0,
                sentiment_score: 50,
            }
        }
    }

    fn make_agent(
        change_24h: f64,
        reader: PaperChain,
        executor: Box<dyn ChainExecutor>,
        engine_cfg: &EngineConfig,
    ) -> Agent {
        let scanner = MarketScanner::new(
            Box::new(SteadySource { change_24h }),
            ConditionsConfig::default(),
        );
        Agent::new(
            scanner,
            Box::new(reader),
            executor,
            Box::new(BalanceBridgeMonitor),
            DecisionEngine::new(engine_cfg),
            50,
        )
    }

    #[tokio::test]
    async fn test_failed_dispatch_leaves_state_unchanged() {
        let mut executor = MockChainExecutor::new();
        executor.expect_name().return_const("mock");
        executor
            .expect_dispatch()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("rpc unavailable")));

        let chain = PaperChain::new(1_000_000_000, 0, 3000, 0);
        let mut agent = make_agent(0.0, chain, Box::new(executor), &EngineConfig::default());

        // Cold start → MEDIUM → deploy attempted and fails.
        let record = agent.run_iteration().await;
        assert_eq!(record.action, Action::Deploy);
        assert!(record.tx_hash.is_none());
        assert_eq!(record.position_after, Position::Home);
        assert_eq!(agent.tracker().position, Position::Home);
        assert!(agent.tracker().last_bridge_time.is_none());
        assert_eq!(agent.engine().history().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_tx_id_is_failure() {
        let mut executor = MockChainExecutor::new();
        executor.expect_name().return_const("mock");
        executor
            .expect_dispatch()
            .returning(|_| Ok(String::new()));

        let chain = PaperChain::new(1_000_000_000, 0, 3000, 0);
        let mut agent = make_agent(0.0, chain, Box::new(executor), &EngineConfig::default());
        let record = agent.run_iteration().await;
        assert!(record.tx_hash.is_none());
        assert_eq!(agent.tracker().position, Position::Home);
    }

    #[tokio::test]
    async fn test_hold_is_never_dispatched() {
        let mut executor = MockChainExecutor::new();
        executor.expect_name().return_const("mock");
        executor.expect_dispatch().never();

        // Below the deploy minimum, fee already optimal for MEDIUM.
        let chain = PaperChain::new(50_000_000, 0, 5000, 0);
        let mut agent = make_agent(0.0, chain, Box::new(executor), &EngineConfig::default());
        let record = agent.run_iteration().await;
        assert_eq!(record.action, Action::Hold);
        assert!(record.tx_hash.is_none());
    }

    #[tokio::test]
    async fn test_deploy_then_confirm_on_paper_chain() {
        let chain = PaperChain::new(1_000_000_000, 0, 3000, 0);
        let mut agent = make_agent(
            0.0,
            chain.clone(),
            Box::new(chain.clone()),
            &EngineConfig::default(),
        );

        let first = agent.run_iteration().await;
        assert_eq!(first.action, Action::Deploy);
        assert!(first.tx_hash.as_deref().unwrap_or_default().starts_with("paper-"));
        assert_eq!(first.position_after, Position::BridgingToYield);

        // Second iteration sees the yield balance and confirms; constant
        // price → LOW with the fee already at 0.30%, so nothing to do.
        let second = agent.run_iteration().await;
        assert_eq!(agent.tracker().position, Position::Yield);
        assert_eq!(second.position_after, Position::Yield);
        assert_eq!(second.action, Action::Hold);
        assert_eq!(agent.iteration(), 2);
        assert_eq!(agent.executions().len(), 2);
    }

    #[tokio::test]
    async fn test_execution_log_capacity() {
        let chain = PaperChain::new(0, 0, 3000, 0);
        let scanner = MarketScanner::new(
            Box::new(SteadySource { change_24h: 0.0 }),
            ConditionsConfig::default(),
        );
        let mut agent = Agent::new(
            scanner,
            Box::new(chain.clone()),
            Box::new(chain),
            Box::new(BalanceBridgeMonitor),
            DecisionEngine::new(&EngineConfig::default()),
            3,
        );
        for _ in 0..5 {
            agent.run_iteration().await;
        }
        assert_eq!(agent.executions().len(), 3);
        assert_eq!(agent.executions().front().map(|r| r.iteration), Some(3));
        assert_eq!(agent.executions().back().map(|r| r.iteration), Some(5));
    }

    #[tokio::test]
    async fn test_restored_tracker_is_used() {
        let chain = PaperChain::new(0, 800_000_000, 8000, 0);
        let mut agent = make_agent(
            0.07,
            chain.clone(),
            Box::new(chain.clone()),
            &EngineConfig::default(),
        )
        .with_restored(
            PositionTracker {
                position: Position::Yield,
                last_bridge_time: None,
                pending: None,
            },
            41,
        );

        // |change| 7% floors volatility to HIGH → withdraw everything.
        let record = agent.run_iteration().await;
        assert_eq!(record.iteration, 42);
        assert_eq!(record.action, Action::Withdraw);
        assert_eq!(record.position_after, Position::BridgingToHome);
        assert_eq!(chain.ledger().await.balance_home, 800_000_000);
    }
}
