//! Fixed-token credentials.

use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::auth::error::AuthError;
use crate::auth::traits::CredentialProvider;

/// Credentials backed by a token handed over at startup.
///
/// Clearing the cache drops the token until `initialize` reloads it from the
/// original value. Useful for the CLI and for tests.
#[derive(Debug)]
pub struct StaticCredentials {
    source: String,
    cached: RwLock<Option<String>>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        let source = token.into();
        Self {
            cached: RwLock::new(Some(source.clone())),
            source,
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn access_token(&self) -> Result<String, AuthError> {
        let guard = self
            .cached
            .read()
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        guard.clone().ok_or(AuthError::TokenNotFound)
    }

    async fn clear_token_cache(&self) -> Result<(), AuthError> {
        debug!("Clearing cached access token");
        let mut guard = self
            .cached
            .write()
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        *guard = None;
        Ok(())
    }

    async fn initialize(&self) -> Result<(), AuthError> {
        let mut guard = self
            .cached
            .write()
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        *guard = Some(self.source.clone());
        Ok(())
    }
}
