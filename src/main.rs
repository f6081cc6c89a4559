//! VELVET ARC: autonomous cross-chain liquidity agent.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores bookkeeping from disk (or starts fresh), and runs the
//! observe→decide→dispatch loop with graceful shutdown.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use velvet::chain::dry_run::DryRunExecutor;
use velvet::chain::paper::PaperChain;
use velvet::chain::rpc::RpcChainReader;
use velvet::chain::{BalanceBridgeMonitor, ChainExecutor, ChainReader};
use velvet::config::{self, ExecutorMode};
use velvet::dashboard::{self, DashboardState};
use velvet::engine::Agent;
use velvet::market::feeds::HttpMarketSource;
use velvet::market::{ConditionsConfig, MarketScanner};
use velvet::storage::{self, PersistedState};
use velvet::strategy::DecisionEngine;

const BANNER: &str = r#"
 __     __ _____ _     __     __ _____ _____      _     ____   ____
 \ \   / /| ____| |    \ \   / /| ____|_   _|    / \   |  _ \ / ___|
  \ \ / / |  _| | |     \ \ / / |  _|   | |     / _ \  | |_) | |
   \ V /  | |___| |___   \ V /  | |___  | |    / ___ \ |  _ <| |___
    \_/   |_____|_____|   \_/   |_____| |_|   /_/   \_\|_| \_\\____|

  Volatility-aware cross-chain liquidity agent
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("VELVET_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let cfg = config::AppConfig::load(&config_path)?;
    cfg.validate().context("Invalid configuration")?;

    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        scan_interval_secs = cfg.agent.scan_interval_secs,
        mode = ?cfg.executor.mode,
        home = %cfg.chains.home.name,
        yield_chain = %cfg.chains.yield_chain.name,
        "VELVET ARC starting up"
    );

    // -- Initialise components -------------------------------------------

    let source = HttpMarketSource::new(&cfg.market)?;
    let scanner = MarketScanner::new(Box::new(source), ConditionsConfig::from(&cfg.market));

    let (reader, executor): (Box<dyn ChainReader>, Box<dyn ChainExecutor>) =
        match cfg.executor.mode {
            ExecutorMode::Paper => {
                let chain = PaperChain::from_config(&cfg.executor);
                (Box::new(chain.clone()), Box::new(chain))
            }
            ExecutorMode::DryRun => {
                let timeout = Duration::from_secs(cfg.market.request_timeout_secs);
                let reader = RpcChainReader::new(&cfg.chains, &cfg.contracts, timeout)?;
                (Box::new(reader), Box::new(DryRunExecutor))
            }
        };

    let mut agent = Agent::new(
        scanner,
        reader,
        executor,
        Box::new(BalanceBridgeMonitor),
        DecisionEngine::new(&cfg.engine),
        cfg.agent.execution_log_capacity,
    );

    // -- Restore bookkeeping ---------------------------------------------

    let state_file = cfg.agent.state_file.as_str();
    match storage::load_state(Some(state_file)) {
        Ok(Some(saved)) => {
            info!(
                position = %saved.tracker.position,
                iteration = saved.iteration,
                "Resumed from saved state"
            );
            agent = agent.with_restored(saved.tracker, saved.iteration);
        }
        Ok(None) => info!("Fresh start at HOME"),
        Err(e) => warn!(error = %e, "Saved state unreadable, starting fresh at HOME"),
    }

    // -- Dashboard -------------------------------------------------------

    let dashboard_state = Arc::new(DashboardState::new(&cfg.agent.name, agent.executor_name()));
    if cfg.dashboard.enabled {
        if let Err(e) = dashboard::spawn_dashboard(dashboard_state.clone(), cfg.dashboard.port).await {
            warn!(error = %e, "Dashboard disabled");
        }
    }
    dashboard_state.publish(&agent).await;

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.agent.scan_interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.agent.scan_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let record = agent.run_iteration().await;
                dashboard_state.publish(&agent).await;

                let snapshot = PersistedState::new(agent.tracker().clone(), agent.iteration());
                if let Err(e) = storage::save_state(&snapshot, Some(state_file)) {
                    error!(error = %e, iteration = record.iteration, "Failed to save state");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    let snapshot = PersistedState::new(agent.tracker().clone(), agent.iteration());
    storage::save_state(&snapshot, Some(state_file))?;
    info!(
        iterations = agent.iteration(),
        position = %agent.tracker().position,
        decisions = agent.engine().history().len(),
        "VELVET ARC shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("velvet=info"));

    if std::env::var("VELVET_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
