use chrono::{DateTime, Utc};
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

/// Final classification of a market question. The discriminants match the
/// on-chain encoding expected by the settlement call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Yes,
    No,
    Invalid,
}

impl Outcome {
    pub fn as_u8(self) -> u8 {
        match self {
            Outcome::Yes => 1,
            Outcome::No => 2,
            Outcome::Invalid => 3,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Yes => write!(f, "yes"),
            Outcome::No => write!(f, "no"),
            Outcome::Invalid => write!(f, "invalid"),
        }
    }
}

/// One unit of work: a market the ledger asked us to resolve.
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    pub request_id: H256,
    pub market_id: U256,
    pub question: String,
    pub detected_at: DateTime<Utc>,
}

impl ResolutionRequest {
    pub fn new(request_id: H256, market_id: U256, question: String) -> Self {
        Self {
            request_id,
            market_id,
            question,
            detected_at: Utc::now(),
        }
    }
}

/// A single provider's answer for one resolution attempt. Confidence is the
/// adapter's static baseline, used for diagnostics only; votes are unweighted.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderVote {
    pub provider: &'static str,
    pub outcome: Outcome,
    pub confidence: u8,
    #[serde(skip_serializing)]
    pub rationale: String,
    pub latency_ok: bool,
}

/// Per-category vote counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub yes: usize,
    pub no: usize,
    pub invalid: usize,
}

impl VoteTally {
    pub fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Yes => self.yes += 1,
            Outcome::No => self.no += 1,
            Outcome::Invalid => self.invalid += 1,
        }
    }

    pub fn max(&self) -> usize {
        self.yes.max(self.no).max(self.invalid)
    }

    /// A category wins only if its count is strictly greater than both
    /// others. Any tie for first place yields `None`.
    pub fn strict_winner(&self) -> Option<Outcome> {
        if self.yes > self.no && self.yes > self.invalid {
            Some(Outcome::Yes)
        } else if self.no > self.yes && self.no > self.invalid {
            Some(Outcome::No)
        } else if self.invalid > self.yes && self.invalid > self.no {
            Some(Outcome::Invalid)
        } else {
            None
        }
    }
}

/// Deterministic summary of one consensus round over a set of votes.
#[derive(Debug, Clone, Serialize)]
pub struct ConsensusResult {
    pub outcome: Outcome,
    pub agreement_percent: u8,
    pub winning_votes: usize,
    pub total_votes: usize,
    pub tally: VoteTally,
    pub votes: Vec<ProviderVote>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Unknown,
}

/// Handle returned by the relay after it accepts a settlement submission.
/// On-chain confirmation tracking is the relay consumer's job, not ours.
#[derive(Debug, Clone)]
pub struct RelayTask {
    pub task_id: String,
    pub target: Address,
    pub payload: Bytes,
    pub submitted_at: DateTime<Utc>,
    pub status: TaskState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_chain_encoding() {
        assert_eq!(Outcome::Yes.as_u8(), 1);
        assert_eq!(Outcome::No.as_u8(), 2);
        assert_eq!(Outcome::Invalid.as_u8(), 3);
    }

    #[test]
    fn tally_strict_winner() {
        let mut tally = VoteTally::default();
        tally.add(Outcome::Yes);
        tally.add(Outcome::Yes);
        tally.add(Outcome::No);
        assert_eq!(tally.strict_winner(), Some(Outcome::Yes));
        assert_eq!(tally.max(), 2);
    }

    #[test]
    fn tally_three_way_tie_has_no_winner() {
        let tally = VoteTally { yes: 1, no: 1, invalid: 1 };
        assert_eq!(tally.strict_winner(), None);
        assert_eq!(tally.max(), 1);
    }

    #[test]
    fn tally_two_way_tie_has_no_winner() {
        let tally = VoteTally { yes: 2, no: 2, invalid: 0 };
        assert_eq!(tally.strict_winner(), None);
    }

    #[test]
    fn tally_invalid_can_win_outright() {
        let tally = VoteTally { yes: 1, no: 0, invalid: 3 };
        assert_eq!(tally.strict_winner(), Some(Outcome::Invalid));
    }
}
