use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gemrelay::auth::CredentialProvider;
use gemrelay::auth::error::AuthError;
use gemrelay::config::Config;
use gemrelay::providers::gemini::GeminiProvider;
use serde_json::Value;
use wiremock::ResponseTemplate;

pub const PROJECT: &str = "test-project";

/// Hands out `stale` until the first refresh, `fresh` afterwards.
#[derive(Default)]
pub struct RotatingCredentials {
    refreshes: AtomicUsize,
}

impl RotatingCredentials {
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CredentialProvider for RotatingCredentials {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(if self.refreshes() == 0 { "stale" } else { "fresh" }.to_string())
    }

    async fn clear_token_cache(&self) -> Result<(), AuthError> {
        Ok(())
    }

    async fn initialize(&self) -> Result<(), AuthError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Config pointing at `base_url` with a pinned project and no preamble delays.
pub fn config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.backend.base_url = base_url.to_string();
    config.backend.project_id = Some(PROJECT.to_string());
    config.thinking.reasoning_delay_ms = 0;
    config.thinking.thinking_chunk_delay_ms = 0;
    config
}

pub fn provider(config: &Config, credentials: Arc<dyn CredentialProvider>) -> GeminiProvider {
    GeminiProvider::from_config(config, credentials).expect("provider")
}

/// SSE body with one `data:` event per frame.
pub fn sse(frames: &[Value]) -> ResponseTemplate {
    let body: String = frames
        .iter()
        .map(|frame| format!("data: {frame}\n\n"))
        .collect();
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_raw(body.into_bytes(), "text/event-stream")
}

/// A streamed frame carrying the given parts.
pub fn frame(parts: Value) -> Value {
    serde_json::json!({
        "response": {
            "candidates": [{"content": {"role": "model", "parts": parts}}]
        }
    })
}

pub fn usage_frame(prompt: u32, candidates: u32) -> Value {
    serde_json::json!({
        "response": {
            "usageMetadata": {
                "promptTokenCount": prompt,
                "candidatesTokenCount": candidates
            }
        }
    })
}
