//! Combines independent provider votes into a single trust-minimized outcome.
//!
//! Every configured adapter contributes exactly one vote or one error; errors
//! are excluded from the tally and never abort the round unless they leave
//! zero votes. The tally itself is pure and order-independent.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};

use crate::error::OracleError;
use crate::providers::retry::{classify_with_policy, RetryPolicy};
use crate::providers::ProviderAdapter;
use crate::types::{ConsensusResult, Outcome, ProviderVote, VoteTally};

pub struct ConsensusEngine {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    policy: RetryPolicy,
    required_agreement: f64,
}

impl ConsensusEngine {
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>, required_agreement: f64) -> Self {
        Self { adapters, policy: RetryPolicy::default(), required_agreement }
    }

    #[cfg(test)]
    fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Queries every adapter concurrently and tallies whatever came back.
    ///
    /// Fails with `NoQuorum` when zero adapters produced a vote; a result is
    /// never fabricated. Low agreement is not an error: the outcome is forced
    /// to Invalid and propagated so the dispute path downstream can take over.
    pub async fn resolve(
        &self,
        question: &str,
        context: Option<&str>,
    ) -> Result<ConsensusResult, OracleError> {
        if question.trim().is_empty() {
            return Err(OracleError::BadRequest("question must not be empty".into()));
        }

        let calls = self
            .adapters
            .iter()
            .map(|adapter| classify_with_policy(adapter.as_ref(), question, context, self.policy));
        let results = join_all(calls).await;

        let mut votes = Vec::with_capacity(results.len());
        for (adapter, result) in self.adapters.iter().zip(results) {
            match result {
                Ok(vote) => {
                    info!(
                        provider = adapter.id(),
                        outcome = %vote.outcome,
                        confidence = vote.confidence,
                        latency_ok = vote.latency_ok,
                        "provider vote collected"
                    );
                    votes.push(vote);
                }
                Err(err) => {
                    warn!(provider = adapter.id(), error = %err, "provider excluded from tally");
                }
            }
        }

        if votes.is_empty() {
            return Err(OracleError::NoQuorum);
        }

        Ok(tally_votes(votes, self.required_agreement))
    }
}

/// Pure tally over one round of votes. Deterministic for a given vote set:
/// the math never depends on collection order.
fn tally_votes(votes: Vec<ProviderVote>, required_agreement: f64) -> ConsensusResult {
    let mut tally = VoteTally::default();
    for vote in &votes {
        tally.add(vote.outcome);
    }

    let total_votes = votes.len();
    let winning_votes = tally.max();
    let agreement_percent = percent(winning_votes, total_votes);

    // Strict majority required; any tie for first place resolves Invalid.
    let nominal = tally.strict_winner().unwrap_or(Outcome::Invalid);

    // Below-threshold winners must never silently resolve Yes/No.
    let threshold = (required_agreement * 100.0).round() as u8;
    let outcome = if agreement_percent < threshold { Outcome::Invalid } else { nominal };

    ConsensusResult {
        outcome,
        agreement_percent,
        winning_votes,
        total_votes,
        tally,
        votes,
        decided_at: Utc::now(),
    }
}

fn percent(part: usize, whole: usize) -> u8 {
    (100.0 * part as f64 / whole as f64).round() as u8
}
