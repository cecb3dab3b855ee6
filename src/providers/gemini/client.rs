//! Cloud Code API client.
//!
//! Sends `streamGenerateContent` requests and owns the recovery loop: one
//! credential refresh after a 401, or one switch to the fallback model after
//! a 429/503. The discovered project id is cached for the client's lifetime.

use std::sync::{Arc, OnceLock};

use reqwest::Response;
use tracing::{debug, info, instrument, warn};

use crate::auth::CredentialProvider;
use crate::config::BackendConfig;
use crate::net::{HttpClient, HttpClientBuilder};
use crate::providers::ProviderError;
use crate::providers::gemini::constants::{
    API_PATH_STREAM_GENERATE_CONTENT, CLIENT_METADATA, GOOG_API_CLIENT,
    STREAM_ALT_SSE, auto_switch_notice,
};
use crate::providers::gemini::discovery::discover_project;
use crate::providers::gemini::models::google::{CloudCodeRequest, GenerateContentRequest};
use crate::providers::retry::{RetryDecision, RetryPolicy};

/// A successful streaming response and what it took to get it.
#[derive(Debug)]
pub struct OpenedStream {
    pub response: Response,
    /// Model that actually served the request.
    pub model: String,
    /// Texts to show the caller before the response, in order.
    pub notices: Vec<String>,
}

/// Cloud Code API client.
///
/// Cheap to clone; clones share the HTTP pool and the project id.
#[derive(Clone)]
pub struct CloudCodeClient {
    credentials: Arc<dyn CredentialProvider>,
    http: HttpClient,
    base_url: String,
    project_id: Arc<OnceLock<String>>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for CloudCodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudCodeClient")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id.get())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl CloudCodeClient {
    pub fn builder() -> CloudCodeClientBuilder {
        CloudCodeClientBuilder::default()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Get the project id, discovering it on first use.
    ///
    /// Concurrent first calls may both discover; the first stored value wins.
    #[instrument(skip(self, token))]
    pub async fn project_id(&self, token: &str) -> Result<String, ProviderError> {
        if let Some(id) = self.project_id.get() {
            return Ok(id.clone());
        }

        let discovered = discover_project(self.http.inner(), &self.base_url, token).await?;
        let _ = self.project_id.set(discovered.clone());
        Ok(self.project_id.get().cloned().unwrap_or(discovered))
    }

    /// Open a streaming generation, recovering once from auth expiry or
    /// rate limiting.
    #[instrument(skip(self, request), fields(model = %model))]
    pub async fn open_stream(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<OpenedStream, ProviderError> {
        let mut remaining_attempts = self.retry.max_retries;
        let mut current_model = model.to_string();
        let mut notices = Vec::new();

        loop {
            let error = match self.send_once(&current_model, request).await {
                Ok(response) => {
                    if response.content_length() == Some(0) {
                        warn!(model = %current_model, "Backend returned an empty body");
                        return Err(attribute(ProviderError::EmptyBody, model, &current_model));
                    }
                    debug!(model = %current_model, "Stream opened");
                    return Ok(OpenedStream {
                        response,
                        model: current_model,
                        notices,
                    });
                }
                Err(e) => e,
            };

            let status = match error.status() {
                Some(status) => status,
                None if error.is_auth_failure() => 401,
                None => return Err(attribute(error, model, &current_model)),
            };

            match self.retry.decide(status, remaining_attempts, model) {
                RetryDecision::RefreshAuth => {
                    info!(status, "Refreshing credentials and retrying");
                    self.credentials.clear_token_cache().await?;
                    self.credentials.initialize().await?;
                }
                RetryDecision::SwitchModel(fallback) => {
                    warn!(from = %model, to = %fallback, status, "Switching to fallback model");
                    notices.push(auto_switch_notice(model, &fallback));
                    current_model = fallback;
                }
                RetryDecision::Fail => return Err(attribute(error, model, &current_model)),
            }
            remaining_attempts -= 1;
        }
    }

    async fn send_once(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<Response, ProviderError> {
        let token = self.credentials.access_token().await?;
        let project = self.project_id(&token).await?;

        let body = CloudCodeRequest {
            model: model.to_string(),
            project,
            request: request.clone(),
        };
        let url = format!(
            "{}{}?{}",
            self.base_url, API_PATH_STREAM_GENERATE_CONTENT, STREAM_ALT_SSE
        );

        let response = self
            .http
            .inner()
            .post(&url)
            .bearer_auth(&token)
            .header("X-Goog-Api-Client", GOOG_API_CLIENT)
            .header("Client-Metadata", CLIENT_METADATA)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %message, "Backend rejected request");
        Err(ProviderError::api(status.as_u16(), message))
    }
}

/// Tags `error` as a fallback failure when `served` differs from the
/// requested model, so callers do not switch a second time.
fn attribute(error: ProviderError, requested: &str, served: &str) -> ProviderError {
    if served == requested {
        error
    } else {
        error.on_fallback(served)
    }
}

/// Builder for [`CloudCodeClient`].
#[derive(Default)]
pub struct CloudCodeClientBuilder {
    credentials: Option<Arc<dyn CredentialProvider>>,
    backend: BackendConfig,
    retry: Option<RetryPolicy>,
}

impl CloudCodeClientBuilder {
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Base URL, timeouts and pinned project from the `[backend]` section.
    pub fn with_backend_config(mut self, backend: &BackendConfig) -> Self {
        self.backend = backend.clone();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn build(self) -> Result<CloudCodeClient, ProviderError> {
        let credentials = self
            .credentials
            .ok_or_else(|| ProviderError::Config("a credential provider is required".into()))?;

        let project_id = OnceLock::new();
        if let Some(id) = self.backend.project_id.clone().filter(|id| !id.trim().is_empty()) {
            let _ = project_id.set(id);
        }

        Ok(CloudCodeClient {
            credentials,
            http: HttpClientBuilder::from_backend(&self.backend).build()?,
            base_url: self.backend.base_url.trim_end_matches('/').to_string(),
            project_id: Arc::new(project_id),
            retry: self.retry.unwrap_or_default(),
        })
    }
}
