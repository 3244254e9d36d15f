use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::providers::{build_prompt, network_error, vote_from_answer, ProviderAdapter};
use crate::types::ProviderVote;

const ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: String,
}

impl AnthropicAdapter {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn id(&self) -> &'static str {
        "anthropic"
    }

    fn confidence(&self) -> u8 {
        90
    }

    async fn classify(
        &self,
        question: &str,
        context: Option<&str>,
    ) -> Result<ProviderVote, ProviderError> {
        let prompt = build_prompt(question, context);
        let request = MessagesRequest {
            model: MODEL,
            max_tokens: 16,
            messages: vec![Message { role: "user", content: &prompt }],
        };

        let response = self
            .client
            .post(ENDPOINT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Permanent(format!("malformed response: {e}")))?;

        let answer = parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| ProviderError::Permanent("response had no text block".into()))?;

        Ok(vote_from_answer(self.id(), self.confidence(), answer))
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}
