//! Multi-iteration scenarios through the full agent pipeline.
//!
//! The paper chain settles bridges instantly, so a dispatch made in one
//! iteration is confirmed by the balance read at the start of the next.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use velvet::chain::dry_run::DryRunExecutor;
use velvet::chain::paper::PaperChain;
use velvet::chain::BalanceBridgeMonitor;
use velvet::config::{EngineConfig, MarketConfig};
use velvet::dashboard::{build_router, DashboardState};
use velvet::engine::Agent;
use velvet::market::feeds::HttpMarketSource;
use velvet::market::{ConditionsConfig, MarketScanner};
use velvet::storage::{self, PersistedState};
use velvet::strategy::DecisionEngine;
use velvet::types::{Action, DecisionParams, Position};

use crate::mock_market::{reading, ScriptedMarket, PRICE};

const USDC: u64 = 1_000_000;

fn no_cooldown() -> EngineConfig {
    EngineConfig {
        bridge_cooldown_secs: 0,
        ..EngineConfig::default()
    }
}

fn agent(market: ScriptedMarket, chain: &PaperChain, engine: &EngineConfig) -> Agent {
    Agent::new(
        MarketScanner::new(Box::new(market), ConditionsConfig::default()),
        Box::new(chain.clone()),
        Box::new(chain.clone()),
        Box::new(BalanceBridgeMonitor),
        DecisionEngine::new(engine),
        50,
    )
}

#[tokio::test]
async fn test_full_round_trip_through_all_positions() {
    let chain = PaperChain::new(1000 * USDC, 0, 3000, 1000);
    let market = ScriptedMarket::with_changes(&[0.0, 0.0, 0.07, 0.0, 0.12, 0.12]);
    let mut agent = agent(market, &chain, &no_cooldown());

    // 1. Cold start → MEDIUM, neutral → deploy 1000 × 0.8 × 0.6.
    let r = agent.run_iteration().await;
    assert_eq!(r.action, Action::Deploy);
    assert_eq!(r.position_after, Position::BridgingToYield);
    assert_eq!(chain.ledger().await.balance_yield, 480 * USDC);

    // 2. Flat prices → LOW, bridge confirmed, fee already optimal.
    let r = agent.run_iteration().await;
    assert_eq!(r.action, Action::Hold);
    assert_eq!(r.position_after, Position::Yield);
    // One read with 480 deployed: 10% turnover at 0.30%.
    assert_eq!(chain.ledger().await.fees_earned, 144_000);

    // 3. 7% daily move floors volatility into HIGH → withdraw everything.
    let r = agent.run_iteration().await;
    assert_eq!(r.action, Action::Withdraw);
    assert_eq!(r.position_after, Position::BridgingToHome);
    let ledger = chain.ledger().await;
    assert_eq!((ledger.balance_home, ledger.balance_yield), (1000 * USDC, 0));

    // 4. Calm again → confirmed home, LOW → deploy 80%.
    let r = agent.run_iteration().await;
    assert_eq!(r.action, Action::Deploy);
    assert_eq!(r.confidence, 0.9);
    assert_eq!(chain.ledger().await.balance_yield, 800 * USDC);

    // 5. 12% move → EXTREME while on the yield chain.
    let r = agent.run_iteration().await;
    assert_eq!(r.action, Action::EmergencyExit);
    assert_eq!(r.confidence, 1.0);
    assert_eq!(r.position_after, Position::BridgingToHome);
    assert_eq!(chain.ledger().await.balance_yield, 0);

    // 6. Still EXTREME but nothing at risk: hold at home.
    let r = agent.run_iteration().await;
    assert_eq!(r.action, Action::Hold);
    assert_eq!(r.position_after, Position::Home);
    assert!(r.reasoning.contains("no capital at risk"));

    assert_eq!(agent.iteration(), 6);
    assert_eq!(agent.engine().history().len(), 6);
    assert_eq!(chain.ledger().await.dispatch_count, 4);
}

#[tokio::test]
async fn test_sentiment_scales_deploy_size() {
    for (score, expected) in [(10, 336 * USDC), (50, 480 * USDC), (90, 432 * USDC)] {
        let chain = PaperChain::new(1000 * USDC, 0, 3000, 0);
        let market = ScriptedMarket::new(vec![reading(PRICE, 0.0, score)]);
        let mut agent = agent(market, &chain, &no_cooldown());

        let r = agent.run_iteration().await;
        assert_eq!(r.action, Action::Deploy, "score {score}");
        assert_eq!(chain.ledger().await.balance_yield, expected, "score {score}");
    }
}

#[tokio::test]
async fn test_cooldown_blocks_withdraw_but_not_fee_adjustment() {
    let chain = PaperChain::new(1000 * USDC, 0, 3000, 0);
    let market = ScriptedMarket::with_changes(&[0.0, 0.07, 0.07]);
    let mut agent = agent(market, &chain, &EngineConfig::default());

    assert_eq!(agent.run_iteration().await.action, Action::Deploy);

    // HIGH on the yield chain, but the deploy bridge is seconds old.
    let r = agent.run_iteration().await;
    assert_eq!(r.action, Action::AdjustFee);
    assert_eq!(r.position_after, Position::Yield);
    assert_eq!(chain.ledger().await.fee_bps, 8000);
    let last = agent.engine().last_decision().unwrap();
    assert_eq!(last.params, DecisionParams::AdjustFee { new_fee_bps: 8000 });

    let r = agent.run_iteration().await;
    assert_eq!(r.action, Action::Hold);
    assert!(r.reasoning.contains("bridge cooldown active"));
    assert_eq!(chain.ledger().await.balance_yield, 480 * USDC);
}

#[tokio::test]
async fn test_dry_run_bridge_never_settles() {
    let chain = PaperChain::new(1000 * USDC, 0, 3000, 0);
    let market = ScriptedMarket::with_changes(&[0.0, 0.0, 0.0]);
    let mut agent = Agent::new(
        MarketScanner::new(Box::new(market), ConditionsConfig::default()),
        Box::new(chain.clone()),
        Box::new(DryRunExecutor),
        Box::new(BalanceBridgeMonitor),
        DecisionEngine::new(&no_cooldown()),
        50,
    );

    let r = agent.run_iteration().await;
    assert_eq!(r.action, Action::Deploy);
    assert!(r.tx_hash.as_deref().unwrap_or_default().starts_with("dry-run-"));

    // Nothing moved on chain, so the bridge stays in flight and no
    // further bridging decision is made.
    for _ in 0..2 {
        let r = agent.run_iteration().await;
        assert_eq!(r.action, Action::Hold);
        assert_eq!(r.position_after, Position::BridgingToYield);
    }
    assert_eq!(chain.ledger().await.dispatch_count, 0);
}

#[tokio::test]
async fn test_resume_from_persisted_state() {
    let path = std::env::temp_dir()
        .join(format!("velvet_it_state_{}.json", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .to_string();

    let chain = PaperChain::new(1000 * USDC, 0, 3000, 0);
    let mut first = agent(ScriptedMarket::with_changes(&[0.0]), &chain, &no_cooldown());
    first.run_iteration().await;
    let saved = PersistedState::new(first.tracker().clone(), first.iteration());
    storage::save_state(&saved, Some(&path)).unwrap();
    drop(first);

    let loaded = storage::load_state(Some(&path)).unwrap().unwrap();
    assert_eq!(loaded.tracker.position, Position::BridgingToYield);
    assert!(loaded.tracker.pending.is_some());

    let mut second = agent(ScriptedMarket::with_changes(&[0.0]), &chain, &no_cooldown())
        .with_restored(loaded.tracker, loaded.iteration);
    let r = second.run_iteration().await;
    assert_eq!(r.iteration, 2);
    assert_eq!(r.position_after, Position::Yield);

    storage::delete_state(Some(&path)).unwrap();
}

#[tokio::test]
async fn test_unreachable_feeds_fall_back_and_agent_still_decides() {
    let cfg = MarketConfig {
        price_api_url: "http://127.0.0.1:9".into(),
        sentiment_api_url: "http://127.0.0.1:9/fng/".into(),
        gas_rpc_url: "http://127.0.0.1:9".into(),
        request_timeout_secs: 2,
        ..MarketConfig::default()
    };
    let source = HttpMarketSource::new(&cfg).unwrap();
    let chain = PaperChain::new(1000 * USDC, 0, 3000, 0);
    let mut agent = Agent::new(
        MarketScanner::new(Box::new(source), ConditionsConfig::from(&cfg)),
        Box::new(chain.clone()),
        Box::new(chain.clone()),
        Box::new(BalanceBridgeMonitor),
        DecisionEngine::new(&EngineConfig::default()),
        50,
    );

    let r = agent.run_iteration().await;
    assert_eq!(r.price, 0.0);
    assert_eq!(r.volatility, cfg.cold_start_volatility);
    assert_eq!(r.action, Action::Deploy);
    let conditions = agent.last_conditions().unwrap();
    assert_eq!(conditions.gas_price_gwei, cfg.fallback_gas_gwei);
}

#[tokio::test]
async fn test_dashboard_reflects_agent_after_iterations() {
    let chain = PaperChain::new(1000 * USDC, 0, 3000, 0);
    let market = ScriptedMarket::with_changes(&[0.0, 0.0]);
    let mut agent = agent(market, &chain, &no_cooldown());
    let state = Arc::new(DashboardState::new("VELVET-IT", agent.executor_name()));

    agent.run_iteration().await;
    agent.run_iteration().await;
    state.publish(&agent).await;

    let resp = build_router(state.clone())
        .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["position"], "YIELD");
    assert_eq!(json["iteration"], 2);
    assert_eq!(json["executor"], "paper");
    assert_eq!(json["balance_yield"].as_f64(), Some(480.0));

    let resp = build_router(state)
        .oneshot(Request::builder().uri("/api/executions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
    let json: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(json.len(), 2);
    assert_eq!(json[0]["action"], "DEPLOY");
}
