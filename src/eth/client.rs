use std::sync::Arc;

use ethers::prelude::*;

use super::PredictionMarket;
use crate::config::OracleConfig;
use crate::error::OracleError;

/// Read-side handle on the market contract: an HTTP provider for view calls
/// and bounded log scans, plus the ws endpoint for the push subscription.
pub struct ChainClient {
    contract: PredictionMarket<Provider<Http>>,
    ws_url: String,
    address: Address,
    chain_id: u64,
}

impl ChainClient {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| OracleError::Ledger(format!("bad RPC url: {e}")))?;

        Ok(Self {
            contract: PredictionMarket::new(config.market_address, Arc::new(provider)),
            ws_url: config.ws_url.clone(),
            address: config.market_address,
            chain_id: config.chain_id,
        })
    }

    pub fn contract(&self) -> &PredictionMarket<Provider<Http>> {
        &self.contract
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Fresh ws-backed contract handle. Called on every (re)connect of the
    /// subscription loop.
    pub async fn connect_ws(&self) -> Result<PredictionMarket<Provider<Ws>>, OracleError> {
        let ws = Ws::connect(self.ws_url.as_str())
            .await
            .map_err(|e| OracleError::Ledger(format!("ws connect failed: {e}")))?;

        Ok(PredictionMarket::new(self.address, Arc::new(Provider::new(ws))))
    }
}
