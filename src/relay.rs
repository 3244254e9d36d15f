//! Settlement dispatch through a gasless relay. Encodes the fixed settlement
//! call and hands it off; on-chain confirmation is the relay's problem. No
//! internal retry here: retry policy belongs to the event monitor.

use async_trait::async_trait;
use chrono::Utc;
use ethers::abi::Token;
use ethers::types::{Address, Bytes, U256};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::OracleError;
use crate::types::{Outcome, RelayTask, TaskState};

/// Seam between the pipeline and the relay, so the monitor can be exercised
/// against a counting stub in tests.
#[async_trait]
pub trait SettlementSink: Send + Sync {
    async fn submit(
        &self,
        market_id: U256,
        outcome: Outcome,
        agreement_percent: u8,
    ) -> Result<RelayTask, OracleError>;
}

pub struct RelayDispatcher {
    client: reqwest::Client,
    relay_url: String,
    api_key: String,
    target: Address,
    chain_id: u64,
}

impl RelayDispatcher {
    pub fn new(
        client: reqwest::Client,
        relay_url: String,
        api_key: String,
        target: Address,
        chain_id: u64,
    ) -> Self {
        Self { client, relay_url, api_key, target, chain_id }
    }

    /// Best-effort cancellation of a pending relay task.
    pub async fn cancel(&self, task_id: &str) -> Result<bool, OracleError> {
        let url = format!("{}/tasks/{task_id}", self.relay_url);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| OracleError::Relay(e.to_string()))?;

        Ok(response.status().is_success())
    }

    pub async fn status(&self, task_id: &str) -> Result<TaskState, OracleError> {
        let url = format!("{}/tasks/status/{task_id}", self.relay_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| OracleError::Relay(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(TaskState::Unknown);
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Relay(format!("malformed status response: {e}")))?;

        Ok(match body.task.task_state.as_str() {
            "CheckPending" | "ExecPending" | "WaitingForConfirmation" => TaskState::Pending,
            _ => TaskState::Unknown,
        })
    }
}

#[async_trait]
impl SettlementSink for RelayDispatcher {
    async fn submit(
        &self,
        market_id: U256,
        outcome: Outcome,
        agreement_percent: u8,
    ) -> Result<RelayTask, OracleError> {
        let payload = encode_settlement(market_id, outcome, agreement_percent);

        let body = json!({
            "chainId": self.chain_id,
            "target": format!("{:?}", self.target),
            "data": format!("0x{}", hex::encode(&payload)),
            "sponsorApiKey": self.api_key,
        });

        let url = format!("{}/relays/v2/sponsored-call", self.relay_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Relay(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(OracleError::Relay(format!("relay rejected submission: {status}: {details}")));
        }

        let accepted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Relay(format!("malformed relay response: {e}")))?;

        info!(
            task_id = %accepted.task_id,
            market_id = %market_id,
            outcome = %outcome,
            "settlement handed to relay"
        );

        Ok(RelayTask {
            task_id: accepted.task_id,
            target: self.target,
            payload,
            submitted_at: Utc::now(),
            status: TaskState::Pending,
        })
    }
}

/// Calldata for `resolveMarket(uint256 marketId, uint8 outcome, uint8 confidence)`.
pub fn encode_settlement(market_id: U256, outcome: Outcome, agreement_percent: u8) -> Bytes {
    let selector = ethers::utils::id("resolveMarket(uint256,uint8,uint8)");
    let args = ethers::abi::encode(&[
        Token::Uint(market_id),
        Token::Uint(U256::from(outcome.as_u8())),
        Token::Uint(U256::from(agreement_percent)),
    ]);

    let mut data = selector.to_vec();
    data.extend_from_slice(&args);
    data.into()
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(rename = "taskId")]
    task_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    task: StatusTask,
}

#[derive(Deserialize)]
struct StatusTask {
    #[serde(rename = "taskState")]
    task_state: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settlement_calldata_layout() {
        let data = encode_settlement(U256::from(42u64), Outcome::Yes, 87);

        // 4-byte selector plus three 32-byte words.
        assert_eq!(data.len(), 4 + 3 * 32);
        assert_eq!(data[..4], ethers::utils::id("resolveMarket(uint256,uint8,uint8)")[..]);

        let words = &data[4..];
        assert_eq!(U256::from_big_endian(&words[..32]), U256::from(42u64));
        assert_eq!(U256::from_big_endian(&words[32..64]), U256::from(1u64));
        assert_eq!(U256::from_big_endian(&words[64..96]), U256::from(87u64));
    }

    #[test]
    fn outcome_encoding_in_calldata() {
        for (outcome, expected) in
            [(Outcome::Yes, 1u64), (Outcome::No, 2), (Outcome::Invalid, 3)]
        {
            let data = encode_settlement(U256::one(), outcome, 100);
            let word = U256::from_big_endian(&data[36..68]);
            assert_eq!(word, U256::from(expected));
        }
    }
}
