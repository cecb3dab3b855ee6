//! Project discovery for the Cloud Code API.
//!
//! Every generation request names a Cloud Code project. Unless one is
//! configured, it is discovered once by calling `loadCodeAssist` and
//! reading `cloudaicompanionProject` from the response.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::providers::ProviderError;
use crate::providers::gemini::constants::{
    API_PATH_LOAD_CODE_ASSIST, CLIENT_METADATA, GOOG_API_CLIENT,
};

/// Response from the loadCodeAssist API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadCodeAssistResponse {
    #[serde(default)]
    cloudaicompanion_project: Option<String>,
}

/// Discover the project id for the authenticated user.
#[instrument(skip(http, token))]
pub async fn discover_project(
    http: &Client,
    base_url: &str,
    token: &str,
) -> Result<String, ProviderError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), API_PATH_LOAD_CODE_ASSIST);
    debug!(url = %url, "Calling loadCodeAssist");

    let metadata: serde_json::Value = serde_json::from_str(CLIENT_METADATA)?;
    let response = http
        .post(&url)
        .bearer_auth(token)
        .header("X-Goog-Api-Client", GOOG_API_CLIENT)
        .json(&json!({ "metadata": metadata }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::api(status.as_u16(), body));
    }

    let response: LoadCodeAssistResponse = response.json().await?;
    let project = response
        .cloudaicompanion_project
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| {
            ProviderError::Config(
                "loadCodeAssist returned no project; set backend.project_id".to_string(),
            )
        })?;

    info!(project_id = %project, "Discovered project");
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_discovers_project() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1internal:loadCodeAssist"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"cloudaicompanionProject": "proj-123"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let project = discover_project(&Client::new(), &server.uri(), "tok").await.unwrap();
        assert_eq!(project, "proj-123");
    }

    #[tokio::test]
    async fn test_missing_project_is_config_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1internal:loadCodeAssist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let err = discover_project(&Client::new(), &server.uri(), "tok").await.unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)));
    }

    #[tokio::test]
    async fn test_status_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;

        let err = discover_project(&Client::new(), &server.uri(), "tok").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }
}
