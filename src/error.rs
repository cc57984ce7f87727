use thiserror::Error;

use crate::prompt::STRATEGY_NAMES;

#[derive(Debug, Error)]
pub enum TracksideError {
    #[error("no first chunk after {elapsed_ms}ms (budget {budget_ms}ms)")]
    Timeout { elapsed_ms: u64, budget_ms: u64 },

    #[error("rate limited by inference endpoint")]
    RateLimited,

    #[error("upstream error: {message}")]
    Upstream {
        message: String,
        status: Option<u16>,
    },

    #[error("auth failed: {message}")]
    AuthFailed { message: String },

    #[error("schema parse error: {0}")]
    SchemaParse(String),

    #[error("invalid strategy: {input}")]
    InvalidStrategy { input: String },

    #[error("not enough example reports: need {needed}, found {available}")]
    MissingExamples { needed: usize, available: usize },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl TracksideError {
    /// Returns true for transient errors that may succeed on retry.
    /// Nothing is retried internally — the caller decides.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::RateLimited => true,
            Self::Upstream { status, .. } => {
                // 5xx = server error (retryable), 4xx = client error (not retryable)
                // status: None = mid-stream failure → safe default: NOT retryable
                status.is_some_and(|s| s >= 500)
            }
            Self::Request(_) => true, // connection errors may be transient
            _ => false,
        }
    }

    /// Produce an error message for the operator.
    /// Does not leak URLs, tokens, or transport internals.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout {
                elapsed_ms,
                budget_ms,
            } => format!(
                "no data received from the model after {elapsed_ms}ms (budget {budget_ms}ms) — try again shortly"
            ),
            Self::RateLimited => {
                "rate limited by the inference endpoint — try again shortly".to_string()
            }
            Self::Upstream { message, .. } => {
                format!("inference endpoint error: {message}")
            }
            Self::AuthFailed { message } => {
                format!("authentication failed: {message}")
            }
            Self::SchemaParse(_) => "failed to parse the endpoint response".to_string(),
            Self::InvalidStrategy { input } => format!(
                "invalid strategy: {input}. Valid strategies are: {}",
                STRATEGY_NAMES.join(", ")
            ),
            Self::MissingExamples { needed, available } => format!(
                "the strategy needs {needed} example reports but the examples directory only has {available}"
            ),
            Self::Request(_) => "request to the inference endpoint failed".to_string(),
            Self::Io(e) => format!("i/o error: {e}"),
        }
    }
}
