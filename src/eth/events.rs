use ethers::prelude::*;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::client::ChainClient;
use super::PredictionMarket;
use crate::error::OracleError;
use crate::types::ResolutionRequest;

/// Scans a bounded recent block window for resolution requests that are not
/// yet fulfilled on-chain. This is the durability backstop for events the
/// push subscription missed.
pub async fn scan_recent(
    client: &ChainClient,
    window_blocks: u64,
) -> Result<Vec<ResolutionRequest>, OracleError> {
    let latest = client
        .contract()
        .client()
        .get_block_number()
        .await
        .map_err(|e| OracleError::Ledger(format!("get_block_number failed: {e}")))?;

    let from = latest.saturating_sub(window_blocks.into());

    let events = client
        .contract()
        .resolution_requested_filter()
        .from_block(from)
        .query()
        .await
        .map_err(|e| OracleError::Ledger(format!("event query failed: {e}")))?;

    let mut requests = Vec::new();
    for event in events {
        let fulfilled = client
            .contract()
            .resolution_fulfilled(event.request_id)
            .call()
            .await
            .map_err(|e| OracleError::Ledger(format!("fulfilled check failed: {e}")))?;

        if fulfilled {
            debug!(request_id = %H256::from(event.request_id), "already fulfilled, skipping");
            continue;
        }

        requests.push(ResolutionRequest::new(
            H256::from(event.request_id),
            event.market_id,
            event.question,
        ));
    }

    Ok(requests)
}

/// Forwards decoded resolution-request events from a ws subscription into
/// the monitor's channel. Returns when the stream or the channel closes; the
/// caller owns reconnection.
pub async fn stream_requests(
    contract: &PredictionMarket<Provider<Ws>>,
    tx: &mpsc::Sender<ResolutionRequest>,
) -> Result<(), OracleError> {
    let event = contract.resolution_requested_filter();
    let mut stream = event
        .subscribe()
        .await
        .map_err(|e| OracleError::Ledger(format!("event subscribe failed: {e}")))?;

    while let Some(item) = stream.next().await {
        match item {
            Ok(ev) => {
                let request =
                    ResolutionRequest::new(H256::from(ev.request_id), ev.market_id, ev.question);
                if tx.send(request).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "failed to decode resolution event"),
        }
    }

    Ok(())
}
