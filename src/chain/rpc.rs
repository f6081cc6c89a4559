//! Live chain reads over Ethereum JSON-RPC.
//!
//! [`JsonRpcClient`] wraps a single endpoint (`eth_call`, `eth_gasPrice`).
//! [`RpcChainReader`] uses one client per chain to read:
//!
//! - home balance: USDC `balanceOf(vault)` on the home chain
//! - yield balance: USDC `balanceOf(agent)` on the yield chain
//! - current fee: hook `dynamicFee()` on the home chain
//! - fees earned: hook `feesCollected()` on the home chain

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChainReader, ChainSnapshot};
use crate::config::{ChainsConfig, ContractsConfig};
use crate::types::VelvetError;

/// Hook fee reported when `dynamicFee()` cannot be read.
pub const FALLBACK_FEE_BPS: u32 = 3000;

// ---------------------------------------------------------------------------
// ABI helpers
// ---------------------------------------------------------------------------

/// First four bytes of keccak256 of a function signature, hex-encoded.
pub fn selector(signature: &str) -> String {
    let digest = Keccak256::digest(signature.as_bytes());
    hex::encode(&digest[..4])
}

fn normalize_address(raw: &str) -> Result<String> {
    let trimmed = raw.trim().to_ascii_lowercase();
    let valid = trimmed.len() == 42
        && trimmed.starts_with("0x")
        && trimmed.as_bytes().iter().skip(2).all(|b| b.is_ascii_hexdigit());
    if !valid {
        anyhow::bail!("invalid address: {raw}");
    }
    Ok(trimmed)
}

/// Calldata for `balanceOf(address)`.
pub fn balance_of_calldata(owner: &str) -> Result<String> {
    let owner = normalize_address(owner)?;
    Ok(format!(
        "0x{}{:0>64}",
        selector("balanceOf(address)"),
        owner.trim_start_matches("0x")
    ))
}

/// Calldata for a zero-argument function.
pub fn no_arg_calldata(signature: &str) -> String {
    format!("0x{}", selector(signature))
}

/// Parse a 0x-prefixed hex quantity or 32-byte word. An empty `0x` is zero.
pub fn parse_hex_u128(raw: &str) -> Result<u128> {
    let value = raw.trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .with_context(|| format!("expected 0x-prefixed hex, got {value}"))?;
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    if digits.len() > 32 {
        anyhow::bail!("hex value overflows u128: {value}");
    }
    u128::from_str_radix(digits, 16).with_context(|| format!("invalid hex value: {value}"))
}

// ---------------------------------------------------------------------------
// JSON-RPC client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    http: Client,
    label: String,
    url: String,
}

impl JsonRpcClient {
    pub fn new(label: &str, url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("VELVET-ARC/0.1.0")
            .build()
            .context("Failed to build JSON-RPC HTTP client")?;
        Ok(Self::with_client(http, label, url))
    }

    /// Share an existing HTTP client.
    pub fn with_client(http: Client, label: &str, url: &str) -> Self {
        Self {
            http,
            label: label.to_string(),
            url: url.to_string(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.error(format!("{method} request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(self.error(format!("{method} HTTP {status}")).into());
        }

        let value: Value = resp
            .json()
            .await
            .map_err(|e| self.error(format!("failed to parse {method} response: {e}")))?;

        if let Some(error) = value.get("error") {
            return Err(self.error(format!("{method} returned error: {error}")).into());
        }

        value
            .get("result")
            .cloned()
            .ok_or_else(|| self.error(format!("{method} result was missing")).into())
    }

    fn error(&self, message: String) -> VelvetError {
        VelvetError::Rpc {
            chain: self.label.clone(),
            message,
        }
    }

    pub async fn eth_call(&self, to: &str, data: &str) -> Result<String> {
        let result = self
            .rpc_call("eth_call", json!([{"to": to, "data": data}, "latest"]))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .with_context(|| format!("eth_call on {} returned non-string result", self.label))
    }

    /// Gas price in wei.
    pub async fn eth_gas_price(&self) -> Result<u128> {
        let result = self.rpc_call("eth_gasPrice", json!([])).await?;
        let raw = result
            .as_str()
            .with_context(|| format!("eth_gasPrice on {} returned non-string result", self.label))?;
        parse_hex_u128(raw)
    }

    /// `eth_call` a view function returning a single uint.
    pub async fn call_uint(&self, to: &str, data: &str) -> Result<u128> {
        let raw = self.eth_call(to, data).await?;
        parse_hex_u128(&raw)
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

pub struct RpcChainReader {
    home: JsonRpcClient,
    yield_chain: JsonRpcClient,
    home_usdc: String,
    yield_usdc: String,
    vault: String,
    hook: String,
    agent: String,
}

impl RpcChainReader {
    pub fn new(chains: &ChainsConfig, contracts: &ContractsConfig, timeout: Duration) -> Result<Self> {
        let home = JsonRpcClient::new(&chains.home.name, &chains.home.resolved_rpc_url(), timeout)?;
        let yield_chain = JsonRpcClient::new(
            &chains.yield_chain.name,
            &chains.yield_chain.resolved_rpc_url(),
            timeout,
        )?;

        Ok(Self {
            home,
            yield_chain,
            home_usdc: chains.home.usdc_address.clone(),
            yield_usdc: chains.yield_chain.usdc_address.clone(),
            vault: contracts.vault_address.clone(),
            hook: contracts.hook_address.clone(),
            agent: contracts.agent_address.clone(),
        })
    }

    async fn balance_of(client: &JsonRpcClient, token: &str, owner: &str) -> Result<u64> {
        let data = balance_of_calldata(owner)?;
        let raw = client.call_uint(token, &data).await?;
        u64::try_from(raw).with_context(|| format!("balance on {} exceeds u64", client.label()))
    }

    async fn hook_uint(&self, signature: &str) -> Result<u128> {
        self.home.call_uint(&self.hook, &no_arg_calldata(signature)).await
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    fn name(&self) -> &'static str {
        "rpc"
    }

    async fn read(&self) -> ChainSnapshot {
        let (home, yld, fee, fees) = tokio::join!(
            Self::balance_of(&self.home, &self.home_usdc, &self.vault),
            Self::balance_of(&self.yield_chain, &self.yield_usdc, &self.agent),
            self.hook_uint("dynamicFee()"),
            self.hook_uint("feesCollected()"),
        );

        let balance_home = home.unwrap_or_else(|e| {
            warn!(error = %e, "Home balance read failed, using 0");
            0
        });
        let balance_yield = yld.unwrap_or_else(|e| {
            warn!(error = %e, "Yield balance read failed, using 0");
            0
        });
        let current_fee_bps = fee
            .and_then(|f| u32::try_from(f).context("dynamicFee exceeds u32"))
            .unwrap_or_else(|e| {
                warn!(error = %e, fallback = FALLBACK_FEE_BPS, "Hook fee read failed");
                FALLBACK_FEE_BPS
            });
        let fees_earned = fees
            .and_then(|f| u64::try_from(f).context("feesCollected exceeds u64"))
            .unwrap_or_else(|e| {
                warn!(error = %e, "Hook fees read failed, using 0");
                0
            });

        debug!(balance_home, balance_yield, current_fee_bps, fees_earned, "Chain state read");

        ChainSnapshot {
            balance_home,
            balance_yield,
            current_fee_bps,
            fees_earned,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
