use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use ethers::types::Address;

/// Runtime configuration, collected from the environment once at startup.
/// Required settings fail hard; provider keys are optional and merely
/// disable the corresponding adapter.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub rpc_url: String,
    pub ws_url: String,
    pub market_address: Address,
    pub chain_id: u64,
    pub relay_url: String,
    pub relay_api_key: String,
    pub required_agreement: f64,
    pub poll_interval: Duration,
    pub poll_window_blocks: u64,
    pub retry_delay: Duration,
    pub bind_addr: SocketAddr,
    pub providers: ProviderKeys,
}

/// API keys for the classification providers, in priority order.
#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub gemini: Option<String>,
    pub grok: Option<String>,
    pub deepseek: Option<String>,
    pub perplexity: Option<String>,
}

impl OracleConfig {
    pub fn from_env() -> Result<Self> {
        let rpc_url = std::env::var("RPC_URL").context("RPC_URL must be set")?;
        let ws_url = std::env::var("WS_URL").context("WS_URL must be set")?;

        let market_address: Address = std::env::var("MARKET_ADDRESS")
            .context("MARKET_ADDRESS must be set")?
            .parse()
            .context("MARKET_ADDRESS is not a valid address")?;

        let chain_id: u64 = std::env::var("CHAIN_ID")
            .context("CHAIN_ID must be set")?
            .parse()
            .context("CHAIN_ID is not a valid integer")?;

        let relay_url = std::env::var("RELAY_URL").context("RELAY_URL must be set")?;
        let relay_api_key =
            std::env::var("RELAY_API_KEY").context("RELAY_API_KEY must be set")?;

        let required_agreement = match std::env::var("REQUIRED_AGREEMENT") {
            Ok(v) => v.parse().context("REQUIRED_AGREEMENT is not a number")?,
            Err(_) => 0.8,
        };
        anyhow::ensure!(
            (0.0..=1.0).contains(&required_agreement),
            "REQUIRED_AGREEMENT must be within 0.0..=1.0"
        );

        let bind_addr = match std::env::var("BIND_ADDR") {
            Ok(v) => v.parse().context("BIND_ADDR is not a valid socket address")?,
            Err(_) => SocketAddr::from(([127, 0, 0, 1], 3000)),
        };

        Ok(Self {
            rpc_url,
            ws_url,
            market_address,
            chain_id,
            relay_url,
            relay_api_key,
            required_agreement,
            poll_interval: Duration::from_secs(60),
            poll_window_blocks: 10_000,
            retry_delay: Duration::from_secs(300),
            bind_addr,
            providers: ProviderKeys {
                openai: std::env::var("OPENAI_API_KEY").ok(),
                anthropic: std::env::var("ANTHROPIC_API_KEY").ok(),
                gemini: std::env::var("GEMINI_API_KEY").ok(),
                grok: std::env::var("GROK_API_KEY").ok(),
                deepseek: std::env::var("DEEPSEEK_API_KEY").ok(),
                perplexity: std::env::var("PERPLEXITY_API_KEY").ok(),
            },
        })
    }
}
