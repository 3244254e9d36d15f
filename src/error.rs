use thiserror::Error;

/// Failure classes for a single provider call. The class decides whether the
/// retry wrapper may try again: only `Transient` is retryable.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Rate limit, model still loading, or temporary 5xx.
    #[error("transient provider failure: {0}")]
    Transient(String),
    /// Auth failure, unknown model/endpoint, or malformed response.
    #[error("permanent provider failure: {0}")]
    Permanent(String),
    /// Per-call deadline exceeded.
    #[error("provider call timed out")]
    Timeout,
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    /// Classifies an HTTP status from a provider endpoint.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            ProviderError::Transient(format!("{status}: {body}"))
        } else {
            ProviderError::Permanent(format!("{status}: {body}"))
        }
    }
}

/// Pipeline-level failures. Provider errors never appear here directly; they
/// are excluded from the tally and only surface as `NoQuorum` when every
/// adapter failed.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("no provider returned a usable vote")]
    NoQuorum,
    #[error("relay submission failed: {0}")]
    Relay(String),
    #[error("ledger error: {0}")]
    Ledger(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_transient() {
        let err = ProviderError::from_status(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "slow down".into(),
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn server_error_is_transient() {
        let err = ProviderError::from_status(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "loading".into(),
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn auth_failure_is_permanent() {
        let err =
            ProviderError::from_status(reqwest::StatusCode::UNAUTHORIZED, "bad key".into());
        assert!(!err.is_retryable());
    }

    #[test]
    fn timeout_is_not_retryable() {
        assert!(!ProviderError::Timeout.is_retryable());
    }
}
