use std::sync::Arc;
use std::time::Duration;

use market_oracle::config::OracleConfig;
use market_oracle::consensus::ConsensusEngine;
use market_oracle::eth::client::ChainClient;
use market_oracle::monitor::EventMonitor;
use market_oracle::providers;
use market_oracle::relay::RelayDispatcher;
use market_oracle::state::AppState;
use market_oracle::store::InMemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Load env
    dotenvy::dotenv().ok();

    let config = OracleConfig::from_env()?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(45))
        .build()?;

    let adapters = providers::build_adapters(&config.providers, &http);
    let engine = Arc::new(ConsensusEngine::new(adapters, config.required_agreement));

    let chain = Arc::new(ChainClient::new(&config)?);
    let relay = Arc::new(RelayDispatcher::new(
        http.clone(),
        config.relay_url.clone(),
        config.relay_api_key.clone(),
        config.market_address,
        config.chain_id,
    ));
    let store = Arc::new(InMemoryStore::new());

    let monitor = Arc::new(EventMonitor::new(
        Arc::clone(&engine),
        relay,
        store,
        chain,
        &config,
    ));

    let monitor_task = Arc::clone(&monitor);
    tokio::spawn(async move {
        monitor_task.run().await;
    });

    let state = AppState { engine, monitor };
    let app = market_oracle::app(state);

    tracing::info!("Server running on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
