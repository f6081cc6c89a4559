//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section carries serde defaults, so a missing key (or an empty
//! file) yields the documented reference values. RPC URLs may be
//! overridden by env vars named in the config and resolved at runtime.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::types::{VelvetError, VolatilityThresholds};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub engine: EngineConfig,
    pub market: MarketConfig,
    pub chains: ChainsConfig,
    pub contracts: ContractsConfig,
    pub executor: ExecutorConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub scan_interval_secs: u64,
    pub state_file: String,
    pub execution_log_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "VELVET-ARC".to_string(),
            scan_interval_secs: 30,
            state_file: "velvet_state.json".to_string(),
            execution_log_capacity: 50,
        }
    }
}

/// Decision engine parameters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// Smallest-unit balance required before a deploy is considered.
    pub min_deploy_amount: u64,
    pub bridge_cooldown_secs: i64,
    /// Minimum |optimal - current| fee gap that triggers ADJUST_FEE.
    pub fee_adjust_threshold_bps: u32,
    pub history_capacity: usize,
    /// Share of the home balance deployed before scaling (8000 = 80%).
    pub base_allocation_bps: u32,
    pub base_fee_bps: u32,
    pub fee_medium_bps: u32,
    pub fee_high_bps: u32,
    pub fee_extreme_bps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_deploy_amount: 100_000_000,
            bridge_cooldown_secs: 300,
            fee_adjust_threshold_bps: 500,
            history_capacity: 100,
            base_allocation_bps: 8000,
            base_fee_bps: 3000,
            fee_medium_bps: 5000,
            fee_high_bps: 8000,
            fee_extreme_bps: 10000,
        }
    }
}

/// Market data and volatility model parameters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MarketConfig {
    pub low_threshold: f64,
    pub medium_threshold: f64,
    pub high_threshold: f64,
    /// Number of price samples retained for the volatility estimate.
    pub history_window: usize,
    pub cold_start_volatility: f64,
    /// |24h change| above which volatility is floored at `medium_threshold`.
    pub large_move: f64,
    /// |24h change| above which volatility is floored at `high_threshold`.
    pub extreme_move: f64,
    pub coin_id: String,
    pub price_api_url: String,
    pub sentiment_api_url: String,
    pub gas_rpc_url: String,
    pub request_timeout_secs: u64,
    pub fallback_gas_gwei: f64,
    pub fallback_sentiment_score: u8,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            low_threshold: 0.02,
            medium_threshold: 0.08,
            high_threshold: 0.15,
            history_window: 24,
            cold_start_volatility: 0.05,
            large_move: 0.05,
            extreme_move: 0.10,
            coin_id: "ethereum".to_string(),
            price_api_url: "https://api.coingecko.com/api/v3".to_string(),
            sentiment_api_url: "https://api.alternative.me/fng/".to_string(),
            gas_rpc_url: "https://rpc.testnet.arc.network".to_string(),
            request_timeout_secs: 10,
            fallback_gas_gwei: 50.0,
            fallback_sentiment_score: 50,
        }
    }
}

impl MarketConfig {
    pub fn thresholds(&self) -> VolatilityThresholds {
        VolatilityThresholds {
            low: self.low_threshold,
            medium: self.medium_threshold,
            high: self.high_threshold,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChainsConfig {
    pub home: ChainConfig,
    pub yield_chain: ChainConfig,
}

impl Default for ChainsConfig {
    fn default() -> Self {
        Self {
            home: ChainConfig {
                name: "Arc Testnet".to_string(),
                chain_id: 5042002,
                rpc_url: "https://rpc.testnet.arc.network".to_string(),
                rpc_url_env: Some("ARC_RPC".to_string()),
                cctp_domain: 26,
                usdc_address: "0x3600000000000000000000000000000000000000".to_string(),
            },
            yield_chain: ChainConfig {
                name: "Base Sepolia".to_string(),
                chain_id: 84532,
                rpc_url: "https://sepolia.base.org".to_string(),
                rpc_url_env: Some("BASE_RPC".to_string()),
                cctp_domain: 6,
                usdc_address: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    /// Env var that overrides `rpc_url` when set.
    #[serde(default)]
    pub rpc_url_env: Option<String>,
    pub cctp_domain: u32,
    pub usdc_address: String,
}

impl ChainConfig {
    /// The RPC endpoint, preferring the env override when present.
    pub fn resolved_rpc_url(&self) -> String {
        self.rpc_url_env
            .as_deref()
            .and_then(|env| std::env::var(env).ok())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.rpc_url.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ContractsConfig {
    pub vault_address: String,
    pub hook_address: String,
    pub agent_address: String,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            vault_address: "0xC4a486Ef5dce0655983F7aF31682E1AE107995dB".to_string(),
            hook_address: "0x9D5Ed0F872f95808EaFf9F709cA61db06Dc520d2".to_string(),
            agent_address: "0x55c3aBb091D1a43C3872718b3b8B3AE8c20B592E".to_string(),
        }
    }
}

/// How decisions reach the chains.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorMode {
    /// Simulated balances on both chains, moved by each dispatch.
    Paper,
    /// Live on-chain reads, dispatches are logged and never broadcast.
    DryRun,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExecutorConfig {
    pub mode: ExecutorMode,
    pub paper_home_balance: u64,
    pub paper_yield_balance: u64,
    pub paper_fee_bps: u32,
    /// Share of deployed liquidity traded per paper cycle (1000 = 10%).
    pub paper_turnover_bps: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutorMode::Paper,
            paper_home_balance: 1_000_000_000,
            paper_yield_balance: 0,
            paper_fee_bps: 3000,
            paper_turnover_bps: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Reject values the agent cannot run with.
    pub fn validate(&self) -> std::result::Result<(), VelvetError> {
        let m = &self.market;
        let ordered = 0.0 < m.low_threshold
            && m.low_threshold < m.medium_threshold
            && m.medium_threshold < m.high_threshold
            && m.high_threshold <= 1.0;
        if !ordered {
            return Err(VelvetError::Config(format!(
                "volatility thresholds must satisfy 0 < low < medium < high <= 1, got {}/{}/{}",
                m.low_threshold, m.medium_threshold, m.high_threshold
            )));
        }
        if m.history_window < 2 {
            return Err(VelvetError::Config(
                "market.history_window must be at least 2".into(),
            ));
        }
        if self.agent.scan_interval_secs == 0 {
            return Err(VelvetError::Config(
                "agent.scan_interval_secs must be positive".into(),
            ));
        }
        if self.engine.history_capacity == 0 || self.agent.execution_log_capacity == 0 {
            return Err(VelvetError::Config(
                "history and execution log capacities must be positive".into(),
            ));
        }
        if self.engine.bridge_cooldown_secs < 0 {
            return Err(VelvetError::Config(
                "engine.bridge_cooldown_secs must not be negative".into(),
            ));
        }
        if self.engine.base_allocation_bps == 0 || self.engine.base_allocation_bps > 10_000 {
            return Err(VelvetError::Config(
                "engine.base_allocation_bps must be in 1..=10000".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.agent.name, "VELVET-ARC");
        assert_eq!(cfg.agent.scan_interval_secs, 30);
        assert_eq!(cfg.engine.min_deploy_amount, 100_000_000);
        assert_eq!(cfg.engine.bridge_cooldown_secs, 300);
        assert_eq!(cfg.engine.history_capacity, 100);
        assert_eq!(cfg.market.history_window, 24);
        assert_eq!(cfg.market.thresholds(), VolatilityThresholds::default());
        assert_eq!(cfg.executor.mode, ExecutorMode::Paper);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let cfg = AppConfig::from_toml(
            r#"
            [agent]
            scan_interval_secs = 60

            [engine]
            min_deploy_amount = 250000000

            [executor]
            mode = "dry_run"

            [chains.home]
            name = "Local"
            chain_id = 31337
            rpc_url = "http://127.0.0.1:8545"
            cctp_domain = 0
            usdc_address = "0x0000000000000000000000000000000000000001"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.agent.scan_interval_secs, 60);
        assert_eq!(cfg.agent.name, "VELVET-ARC");
        assert_eq!(cfg.engine.min_deploy_amount, 250_000_000);
        assert_eq!(cfg.engine.fee_adjust_threshold_bps, 500);
        assert_eq!(cfg.executor.mode, ExecutorMode::DryRun);
        assert_eq!(cfg.chains.home.chain_id, 31337);
        assert!(cfg.chains.home.rpc_url_env.is_none());
        assert_eq!(cfg.chains.yield_chain.chain_id, 84532);
    }

    #[test]
    fn test_validate_rejects_unordered_thresholds() {
        let mut cfg = AppConfig::default();
        cfg.market.medium_threshold = 0.01;
        assert!(matches!(cfg.validate(), Err(VelvetError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut cfg = AppConfig::default();
        cfg.agent.scan_interval_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_resolved_rpc_url_falls_back_to_config() {
        let chain = ChainConfig {
            name: "Test".into(),
            chain_id: 1,
            rpc_url: "http://localhost:8545".into(),
            rpc_url_env: Some("VELVET_TEST_UNSET_RPC_VAR".into()),
            cctp_domain: 0,
            usdc_address: String::new(),
        };
        assert_eq!(chain.resolved_rpc_url(), "http://localhost:8545");
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(AppConfig::load("/nonexistent/velvet_config.toml").is_err());
    }
}
