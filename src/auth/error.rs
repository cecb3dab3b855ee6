//! Error types for auth module.

/// Errors that can occur while obtaining backend credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential is loaded (never initialized or cache cleared).
    #[error("No access token available")]
    TokenNotFound,

    /// The backend rejected the token and it could not be renewed.
    #[error("Token expired: {0}")]
    TokenExpired(String),

    /// Token refresh against the identity provider failed.
    #[error("Refresh failed: {0}")]
    RefreshFailed(String),

    /// Credential cache error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}
