//! LLM provider layer.
//!
//! Holds the OpenAI-shaped request/response types, the error taxonomy
//! shared by every stage of the pipeline, the retry policy, and the Cloud
//! Code (Gemini) provider itself.

pub mod gemini;
pub mod retry;
pub mod types;

use crate::auth::AuthError;

// ---------------------------------------------------------------------------
// ProviderError
// ---------------------------------------------------------------------------

/// Errors that can occur during provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The request was rejected before any backend call.
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Non-success status from the backend that was not recovered.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The backend answered with a success status but no body to stream.
    #[error("Backend returned an empty response body")]
    EmptyBody,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The request already moved to a fallback model and failed there.
    #[error("Fallback model {model} failed: {source}")]
    FallbackFailed {
        model: String,
        #[source]
        source: Box<ProviderError>,
    },
}

impl ProviderError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Marks an error raised while serving `model` as a fallback.
    /// Already-marked errors are returned unchanged.
    pub fn on_fallback(self, model: &str) -> Self {
        match self {
            Self::FallbackFailed { .. } => self,
            other => Self::FallbackFailed {
                model: model.to_string(),
                source: Box::new(other),
            },
        }
    }

    pub fn is_fallback_failure(&self) -> bool {
        matches!(self, Self::FallbackFailed { .. })
    }

    /// HTTP status carried by the error, if it came from the backend.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::FallbackFailed { source, .. } => source.status(),
            _ => None,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Auth(_) => true,
            Self::FallbackFailed { source, .. } => source.is_auth_failure(),
            _ => self.status() == Some(401),
        }
    }

    /// Rate limiting or temporary unavailability upstream.
    ///
    /// Besides 429/503 statuses this also recognizes quota messages that
    /// reach us without a usable status code.
    pub fn is_rate_limit(&self) -> bool {
        if matches!(self.status(), Some(429 | 503)) {
            return true;
        }
        let message = match self {
            Self::Api { message, .. } => message.to_lowercase(),
            Self::Stream(message) => message.to_lowercase(),
            Self::FallbackFailed { source, .. } => return source.is_rate_limit(),
            _ => return false,
        };
        message.contains("rate limit")
            || message.contains("resource_exhausted")
            || message.contains("quota")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::UnknownModel("gpt-4".into());
        assert_eq!(err.to_string(), "Unknown model: gpt-4");
    }

    #[test]
    fn test_provider_error_api() {
        let err = ProviderError::api(429, "Too many requests");
        assert_eq!(err.to_string(), "API error (429): Too many requests");
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn test_provider_error_validation() {
        let err = ProviderError::validation("Invalid PDF data");
        assert_eq!(err.to_string(), "Invalid request: Invalid PDF data");
    }

    #[test]
    fn test_provider_error_empty_body() {
        assert_eq!(
            ProviderError::EmptyBody.to_string(),
            "Backend returned an empty response body"
        );
    }

    #[test]
    fn test_rate_limit_classification() {
        assert!(ProviderError::api(429, "slow down").is_rate_limit());
        assert!(ProviderError::api(503, "unavailable").is_rate_limit());
        assert!(ProviderError::api(500, "RESOURCE_EXHAUSTED: quota").is_rate_limit());
        assert!(ProviderError::Stream("Rate limit exceeded".into()).is_rate_limit());
        assert!(!ProviderError::api(500, "internal").is_rate_limit());
        assert!(!ProviderError::validation("rate limit").is_rate_limit());
    }

    #[test]
    fn test_auth_failure_classification() {
        assert!(ProviderError::api(401, "expired").is_auth_failure());
        assert!(ProviderError::Auth(AuthError::TokenNotFound).is_auth_failure());
        assert!(!ProviderError::api(403, "forbidden").is_auth_failure());
    }

    #[test]
    fn test_fallback_failure_keeps_classification() {
        let err = ProviderError::api(429, "quota").on_fallback("gemini-2.5-flash");
        assert!(err.is_fallback_failure());
        assert_eq!(err.status(), Some(429));
        assert!(err.is_rate_limit());
        assert!(!err.is_auth_failure());
        assert_eq!(
            err.to_string(),
            "Fallback model gemini-2.5-flash failed: API error (429): quota"
        );

        let stream = ProviderError::Stream("quota exceeded".into()).on_fallback("m");
        assert!(stream.is_rate_limit());
        assert_eq!(stream.status(), None);
    }

    #[test]
    fn test_on_fallback_does_not_nest() {
        let err = ProviderError::EmptyBody
            .on_fallback("gemini-2.5-flash")
            .on_fallback("gemini-2.5-flash-lite");
        match err {
            ProviderError::FallbackFailed { model, source } => {
                assert_eq!(model, "gemini-2.5-flash");
                assert!(matches!(*source, ProviderError::EmptyBody));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
