//! Shared authentication traits.

use crate::auth::error::AuthError;

/// Source of bearer tokens for the Cloud Code backend.
///
/// Token acquisition and refresh live behind this trait; the request
/// pipeline only asks for a token, and after a 401 clears the cache and
/// re-initializes before its single retry.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Get a valid access token, refreshing if necessary.
    async fn access_token(&self) -> Result<String, AuthError>;

    /// Forget any cached token so the next `initialize` fetches a fresh one.
    async fn clear_token_cache(&self) -> Result<(), AuthError>;

    /// (Re)load credentials.
    async fn initialize(&self) -> Result<(), AuthError>;
}
