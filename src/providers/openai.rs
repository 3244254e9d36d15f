use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;
use crate::providers::{build_prompt, network_error, vote_from_answer, ProviderAdapter};
use crate::types::ProviderVote;

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Backing models, tried in sequence. The fallback chain is internal: the
/// engine sees one vote or one error regardless of which model answered.
const MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini"];

pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAiAdapter {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }

    async fn ask(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model,
            messages: vec![Message { role: "user", content: prompt }],
            temperature: 0.0,
            max_tokens: 16,
        };

        let response = self
            .client
            .post(ENDPOINT)
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

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::Permanent("response had no choices".into()))
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn id(&self) -> &'static str {
        "openai"
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

        let mut last_err = None;
        for model in MODELS {
            match self.ask(model, &prompt).await {
                Ok(answer) => return Ok(vote_from_answer(self.id(), self.confidence(), answer)),
                Err(err) => {
                    debug!(model, error = %err, "openai model attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ProviderError::Permanent("no models configured".into())))
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
