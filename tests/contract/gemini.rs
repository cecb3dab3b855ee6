use std::sync::Arc;

use futures::StreamExt;
use gemrelay::auth::StaticCredentials;
use gemrelay::providers::ProviderError;
use gemrelay::providers::gemini::constants::{
    THINKING_CLOSE_MARKER, THINKING_OPEN_MARKER, auto_switch_notice,
};
use gemrelay::providers::gemini::{ChatOptions, StreamChunk, UsageData};
use gemrelay::providers::types::{ChatMessage, ChatRequest};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, PROJECT, RotatingCredentials};

const STREAM_PATH: &str = "/v1internal:streamGenerateContent";

async fn collect(
    stream: gemrelay::providers::gemini::ChunkStream,
) -> Vec<Result<StreamChunk, ProviderError>> {
    stream.collect().await
}

fn ok_chunks(items: Vec<Result<StreamChunk, ProviderError>>) -> Vec<StreamChunk> {
    items
        .into_iter()
        .map(|r| r.expect("stream item"))
        .collect()
}

#[tokio::test]
async fn test_stream_request_contract() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(query_param("alt", "sse"))
        .and(header("authorization", "Bearer tok"))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(json!({
            "model": "gemini-2.5-flash",
            "project": PROJECT,
            "request": {
                "contents": [{"role": "user", "parts": [{"text": "Hello"}]}],
                "systemInstruction": {"parts": [{"text": "Be brief."}]}
            }
        })))
        .respond_with(common::sse(&[
            common::frame(json!([{"text": "Hi "}])),
            common::frame(json!([{"text": "there"}])),
            common::usage_frame(5, 2),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let provider = common::provider(
        &common::config(&server.uri()),
        Arc::new(StaticCredentials::new("tok")),
    );
    let stream = provider
        .stream_content(
            "gemini-2.5-flash",
            Some("Be brief."),
            &[ChatMessage::user("Hello")],
            &ChatOptions::default(),
        )
        .unwrap();

    assert_eq!(
        ok_chunks(collect(stream).await),
        vec![
            StreamChunk::Text("Hi ".into()),
            StreamChunk::Text("there".into()),
            StreamChunk::Usage(UsageData {
                input_tokens: 5,
                output_tokens: 2
            }),
        ]
    );
}

#[tokio::test]
async fn test_unauthorized_refreshes_once_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(common::sse(&[common::frame(json!([{"text": "ok"}]))]))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = Arc::new(RotatingCredentials::default());
    let provider = common::provider(&common::config(&server.uri()), credentials.clone());
    let stream = provider
        .stream_content(
            "gemini-2.5-flash",
            None,
            &[ChatMessage::user("Hello")],
            &ChatOptions::default(),
        )
        .unwrap();

    assert_eq!(
        ok_chunks(collect(stream).await),
        vec![StreamChunk::Text("ok".into())]
    );
    assert_eq!(credentials.refreshes(), 1);
}

#[tokio::test]
async fn test_second_unauthorized_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let credentials = Arc::new(RotatingCredentials::default());
    let provider = common::provider(&common::config(&server.uri()), credentials.clone());
    let items = collect(
        provider
            .stream_content(
                "gemini-2.5-flash",
                None,
                &[ChatMessage::user("Hello")],
                &ChatOptions::default(),
            )
            .unwrap(),
    )
    .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().err().and_then(|e| e.status()), Some(401));
    assert_eq!(credentials.refreshes(), 1);
}

#[tokio::test]
async fn test_rate_limit_switches_to_fallback_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_partial_json(json!({"model": "gemini-2.5-pro"})))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_partial_json(json!({"model": "gemini-2.5-flash"})))
        .respond_with(common::sse(&[common::frame(json!([{"text": "answer"}]))]))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = common::config(&server.uri());
    config.fallback.auto_switch = true;
    let provider = common::provider(&config, Arc::new(StaticCredentials::new("tok")));
    let stream = provider
        .stream_content(
            "gemini-2.5-pro",
            None,
            &[ChatMessage::user("Hello")],
            &ChatOptions::default(),
        )
        .unwrap();

    assert_eq!(
        ok_chunks(collect(stream).await),
        vec![
            StreamChunk::Text(auto_switch_notice("gemini-2.5-pro", "gemini-2.5-flash")),
            StreamChunk::Text("answer".into()),
        ]
    );
}

#[tokio::test]
async fn test_rate_limit_without_fallback_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let provider = common::provider(
        &common::config(&server.uri()),
        Arc::new(StaticCredentials::new("tok")),
    );
    let items = collect(
        provider
            .stream_content(
                "gemini-2.5-pro",
                None,
                &[ChatMessage::user("Hello")],
                &ChatOptions::default(),
            )
            .unwrap(),
    )
    .await;

    assert_eq!(items.len(), 1);
    assert!(items[0].as_ref().err().is_some_and(ProviderError::is_rate_limit));
}

/// Both the requested model and its fallback answer 429, once each.
async fn mount_rate_limited_pair(server: &MockServer) {
    for model in ["gemini-2.5-pro", "gemini-2.5-flash"] {
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .and(body_partial_json(json!({"model": model})))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
            .expect(1)
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_rate_limit_on_fallback_is_fatal() {
    let server = MockServer::start().await;
    mount_rate_limited_pair(&server).await;

    let mut config = common::config(&server.uri());
    config.fallback.auto_switch = true;
    let provider = common::provider(&config, Arc::new(StaticCredentials::new("tok")));
    let items = collect(
        provider
            .stream_content(
                "gemini-2.5-pro",
                None,
                &[ChatMessage::user("Hello")],
                &ChatOptions::default(),
            )
            .unwrap(),
    )
    .await;

    match &items[..] {
        [Err(error)] => {
            assert!(error.is_fallback_failure());
            assert_eq!(error.status(), Some(429));
            assert!(error.is_rate_limit());
        }
        other => panic!("unexpected items: {other:?}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_other_status_is_fatal_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = common::provider(
        &common::config(&server.uri()),
        Arc::new(StaticCredentials::new("tok")),
    );
    let items = collect(
        provider
            .stream_content(
                "gemini-2.5-flash",
                None,
                &[ChatMessage::user("Hello")],
                &ChatOptions::default(),
            )
            .unwrap(),
    )
    .await;

    match &items[..] {
        [Err(ProviderError::Api { status, message })] => {
            assert_eq!(*status, 400);
            assert_eq!(message, "bad request");
        }
        other => panic!("unexpected items: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let provider = common::provider(
        &common::config(&server.uri()),
        Arc::new(StaticCredentials::new("tok")),
    );
    let items = collect(
        provider
            .stream_content(
                "gemini-2.5-flash",
                None,
                &[ChatMessage::user("Hello")],
                &ChatOptions::default(),
            )
            .unwrap(),
    )
    .await;

    assert!(matches!(&items[..], [Err(ProviderError::EmptyBody)]));
}

#[tokio::test]
async fn test_fake_thinking_closed_before_first_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(common::sse(&[
            common::frame(json!([{"text": "more thought", "thought": true}])),
            common::frame(json!([{"text": "The answer."}])),
        ]))
        .mount(&server)
        .await;

    let mut config = common::config(&server.uri());
    config.thinking.enable_fake_thinking = true;
    config.thinking.stream_thinking_as_content = true;
    let provider = common::provider(&config, Arc::new(StaticCredentials::new("tok")));
    let chunks = ok_chunks(
        collect(
            provider
                .stream_content(
                    "gemini-2.5-flash",
                    None,
                    &[ChatMessage::user("What is two plus two?")],
                    &ChatOptions::default(),
                )
                .unwrap(),
        )
        .await,
    );

    assert_eq!(
        chunks.first(),
        Some(&StreamChunk::ThinkingContent(THINKING_OPEN_MARKER.into()))
    );
    let opens = chunks
        .iter()
        .filter(|c| **c == StreamChunk::ThinkingContent(THINKING_OPEN_MARKER.into()))
        .count();
    assert_eq!(opens, 1);

    let n = chunks.len();
    assert_eq!(
        &chunks[n - 3..],
        &[
            StreamChunk::ThinkingContent("more thought".into()),
            StreamChunk::ThinkingContent(THINKING_CLOSE_MARKER.into()),
            StreamChunk::Text("The answer.".into()),
        ]
    );
    let preamble: String = chunks[1..n - 3]
        .iter()
        .map(|c| match c {
            StreamChunk::ThinkingContent(s) => s.as_str(),
            other => panic!("unexpected preamble chunk: {other:?}"),
        })
        .collect();
    assert!(preamble.contains("What is two plus two?"));
}

#[tokio::test]
async fn test_project_discovered_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1internal:loadCodeAssist"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"cloudaicompanionProject": "discovered-1"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_partial_json(json!({"project": "discovered-1"})))
        .respond_with(common::sse(&[common::frame(json!([{"text": "ok"}]))]))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = common::config(&server.uri());
    config.backend.project_id = None;
    let provider = common::provider(&config, Arc::new(StaticCredentials::new("tok")));

    for _ in 0..2 {
        let chunks = ok_chunks(
            collect(
                provider
                    .stream_content(
                        "gemini-2.5-flash",
                        None,
                        &[ChatMessage::user("Hello")],
                        &ChatOptions::default(),
                    )
                    .unwrap(),
            )
            .await,
        );
        assert_eq!(chunks, vec![StreamChunk::Text("ok".into())]);
    }
}

#[tokio::test]
async fn test_chat_completion_with_tool_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(common::sse(&[
            common::frame(json!([{"text": "private", "thought": true}])),
            common::frame(json!([
                {"text": "Checking."},
                {"functionCall": {"name": "get_weather", "args": {"city": "Oslo"}}}
            ])),
            common::usage_frame(7, 3),
        ]))
        .mount(&server)
        .await;

    let provider = common::provider(
        &common::config(&server.uri()),
        Arc::new(StaticCredentials::new("tok")),
    );
    let response = provider
        .chat(&ChatRequest::new(
            "gemini-2.5-flash",
            vec![ChatMessage::user("Weather in Oslo?")],
        ))
        .await
        .unwrap();

    assert!(response.id.starts_with("chatcmpl-"));
    assert_eq!(response.model, "gemini-2.5-flash");
    let choice = &response.choices[0];
    assert_eq!(choice.message.content.as_deref(), Some("Checking."));
    assert_eq!(choice.finish_reason.as_deref(), Some("tool_calls"));
    let calls = choice.message.tool_calls.as_ref().unwrap();
    assert_eq!(calls[0].function.name, "get_weather");

    let usage = response.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 7);
    assert_eq!(usage.completion_tokens, 3);
    assert_eq!(usage.total_tokens, 10);
}

#[tokio::test]
async fn test_complete_after_fallback_prepends_notice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_partial_json(json!({"model": "gemini-2.5-pro"})))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_partial_json(json!({"model": "gemini-2.5-flash"})))
        .respond_with(common::sse(&[common::frame(json!([{"text": "fine"}]))]))
        .mount(&server)
        .await;

    let mut config = common::config(&server.uri());
    config.fallback.auto_switch = true;
    let provider = common::provider(&config, Arc::new(StaticCredentials::new("tok")));
    let completion = provider
        .complete(
            "gemini-2.5-pro",
            None,
            &[ChatMessage::user("Hello")],
            &ChatOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        completion.content,
        format!(
            "{}fine",
            auto_switch_notice("gemini-2.5-pro", "gemini-2.5-flash")
        )
    );
    assert!(completion.tool_calls.is_none());
}

#[tokio::test]
async fn test_complete_does_not_retry_failed_fallback() {
    let server = MockServer::start().await;
    mount_rate_limited_pair(&server).await;

    let mut config = common::config(&server.uri());
    config.fallback.auto_switch = true;
    let provider = common::provider(&config, Arc::new(StaticCredentials::new("tok")));
    let error = provider
        .complete(
            "gemini-2.5-pro",
            None,
            &[ChatMessage::user("Hello")],
            &ChatOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(error.is_fallback_failure());
    assert_eq!(error.status(), Some(429));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
