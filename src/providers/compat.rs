use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::providers::{build_prompt, network_error, vote_from_answer, ProviderAdapter};
use crate::types::ProviderVote;

/// Adapter for providers exposing an OpenAI-compatible chat completions API.
/// Grok, DeepSeek and Perplexity differ only in endpoint, model name, and
/// baseline confidence.
pub struct ChatCompatAdapter {
    client: reqwest::Client,
    api_key: String,
    id: &'static str,
    confidence: u8,
    endpoint: &'static str,
    model: &'static str,
}

impl ChatCompatAdapter {
    pub fn grok(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            id: "grok",
            confidence: 80,
            endpoint: "https://api.x.ai/v1/chat/completions",
            model: "grok-3",
        }
    }

    pub fn deepseek(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            id: "deepseek",
            confidence: 80,
            endpoint: "https://api.deepseek.com/chat/completions",
            model: "deepseek-chat",
        }
    }

    pub fn perplexity(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            id: "perplexity",
            confidence: 75,
            endpoint: "https://api.perplexity.ai/chat/completions",
            model: "sonar",
        }
    }
}

#[async_trait]
impl ProviderAdapter for ChatCompatAdapter {
    fn id(&self) -> &'static str {
        self.id
    }

    fn confidence(&self) -> u8 {
        self.confidence
    }

    async fn classify(
        &self,
        question: &str,
        context: Option<&str>,
    ) -> Result<ProviderVote, ProviderError> {
        let prompt = build_prompt(question, context);
        let request = ChatRequest {
            model: self.model,
            messages: vec![Message { role: "user", content: &prompt }],
            temperature: 0.0,
            max_tokens: 16,
        };

        let response = self
            .client
            .post(self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Permanent(format!("malformed response: {e}")))?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::Permanent("response had no choices".into()))?;

        Ok(vote_from_answer(self.id, self.confidence, answer))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}
