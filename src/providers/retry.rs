//! Recovery policy for failed backend calls.
//!
//! A request gets a fixed retry budget (one by default). A failed attempt
//! is recovered in one of two ways while budget remains:
//!
//! - 401: refresh credentials and send the same request again;
//! - 429/503: switch to the configured fallback model and send again.
//!
//! Everything else is fatal.

use tracing::debug;

use crate::config::FallbackConfig;
use crate::providers::ProviderError;
use crate::providers::gemini::constants::RATE_LIMIT_STATUSES;

// MARK: - Constants

/// Retries granted to each logical request.
const DEFAULT_MAX_RETRIES: u32 = 1;

// MARK: - Retry Policy

/// What to do about a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Clear cached credentials, re-initialize, retry unchanged.
    RefreshAuth,
    /// Retry with this model instead.
    SwitchModel(String),
    /// Give up.
    Fail,
}

/// Retry budget and model fallbacks.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub fallback: FallbackConfig,
}

impl RetryPolicy {
    pub fn new(fallback: FallbackConfig) -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            fallback,
        }
    }

    /// Fallback for `model`, if switching is enabled.
    pub fn fallback_for(&self, model: &str) -> Option<&str> {
        self.fallback.fallback_for(model)
    }

    /// Decide how to handle `status` for a request originally sent to
    /// `original_model`, with `remaining` retries left.
    pub fn decide(&self, status: u16, remaining: u32, original_model: &str) -> RetryDecision {
        if remaining == 0 {
            return RetryDecision::Fail;
        }

        let decision = if status == 401 {
            RetryDecision::RefreshAuth
        } else if RATE_LIMIT_STATUSES.contains(&status) {
            self.fallback_for(original_model)
                .map(|m| RetryDecision::SwitchModel(m.to_string()))
                .unwrap_or(RetryDecision::Fail)
        } else {
            RetryDecision::Fail
        };

        debug!(status, remaining, decision = ?decision, "Retry decision");
        decision
    }

    /// Fallback to try when a rate-limit failure surfaced as an error
    /// instead of being handled inside the attempt loop. None once the
    /// request has already been served by a fallback.
    pub fn fallback_after_error(&self, error: &ProviderError, model: &str) -> Option<&str> {
        if error.is_rate_limit() && !error.is_fallback_failure() {
            self.fallback_for(model)
        } else {
            None
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(FallbackConfig::default())
    }
}
