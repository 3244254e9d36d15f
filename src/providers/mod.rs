use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ProviderKeys;
use crate::error::ProviderError;
use crate::types::{Outcome, ProviderVote};

pub mod anthropic;
pub mod compat;
pub mod gemini;
pub mod openai;
pub mod retry;

/// Uniform interface around one external classification provider. Adapters
/// own request/response shaping and error classification; retry and the
/// per-call deadline are applied uniformly by [`retry::classify_with_policy`].
///
/// Adapters hold no shared mutable state. An adapter with internal fallbacks
/// (several backing models) still reports a single vote or a single error.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> &'static str;

    /// Static baseline quality score (0-100), used for diagnostics only.
    /// Votes are unweighted in the tally.
    fn confidence(&self) -> u8;

    async fn classify(
        &self,
        question: &str,
        context: Option<&str>,
    ) -> Result<ProviderVote, ProviderError>;
}

/// Normalizes a provider's free-text answer: the first literal "YES" or "NO"
/// (case-insensitive, by byte position) wins; neither present means Invalid.
/// No smarter guessing.
pub fn parse_outcome(answer: &str) -> Outcome {
    let upper = answer.to_uppercase();
    match (upper.find("YES"), upper.find("NO")) {
        (Some(yes), Some(no)) => {
            if yes < no {
                Outcome::Yes
            } else {
                Outcome::No
            }
        }
        (Some(_), None) => Outcome::Yes,
        (None, Some(_)) => Outcome::No,
        (None, None) => Outcome::Invalid,
    }
}

pub(crate) fn vote_from_answer(
    provider: &'static str,
    confidence: u8,
    answer: String,
) -> ProviderVote {
    ProviderVote {
        provider,
        outcome: parse_outcome(&answer),
        confidence,
        rationale: answer,
        latency_ok: true,
    }
}

pub(crate) fn build_prompt(question: &str, context: Option<&str>) -> String {
    let mut prompt = format!(
        "Resolve this prediction market question with a single word.\n\
         Answer YES if the event happened or the statement is true.\n\
         Answer NO if the event did not happen or the statement is false.\n\
         Answer INVALID if the question is ambiguous or cannot be resolved yet.\n\n\
         Question: {question}"
    );
    if let Some(ctx) = context {
        prompt.push_str("\nAdditional context: ");
        prompt.push_str(ctx);
    }
    prompt
}

pub(crate) fn network_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Transient(err.to_string())
    }
}

/// Builds the adapter set from configured keys, in priority order. Providers
/// without a key are skipped so a partial deployment still runs.
pub fn build_adapters(
    keys: &ProviderKeys,
    client: &reqwest::Client,
) -> Vec<Arc<dyn ProviderAdapter>> {
    let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();

    if let Some(key) = &keys.openai {
        adapters.push(Arc::new(openai::OpenAiAdapter::new(client.clone(), key.clone())));
    }
    if let Some(key) = &keys.anthropic {
        adapters.push(Arc::new(anthropic::AnthropicAdapter::new(client.clone(), key.clone())));
    }
    if let Some(key) = &keys.gemini {
        adapters.push(Arc::new(gemini::GeminiAdapter::new(client.clone(), key.clone())));
    }
    if let Some(key) = &keys.grok {
        adapters.push(Arc::new(compat::ChatCompatAdapter::grok(client.clone(), key.clone())));
    }
    if let Some(key) = &keys.deepseek {
        adapters.push(Arc::new(compat::ChatCompatAdapter::deepseek(client.clone(), key.clone())));
    }
    if let Some(key) = &keys.perplexity {
        adapters.push(Arc::new(compat::ChatCompatAdapter::perplexity(
            client.clone(),
            key.clone(),
        )));
    }

    for adapter in &adapters {
        tracing::info!("provider enabled: {}", adapter.id());
    }
    if adapters.is_empty() {
        tracing::warn!("no provider API keys configured; every resolution will fail with NoQuorum");
    }

    adapters
}
