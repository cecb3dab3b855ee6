use std::sync::Arc;

use gemrelay::auth::StaticCredentials;
use gemrelay::config::Config;
use gemrelay::providers::gemini::convert::split_system_prompt;
use gemrelay::providers::gemini::models::google::{GenerateContentResponse, SafetyThreshold};
use gemrelay::providers::gemini::{ChatOptions, GeminiProvider, ResponseClassifier, StreamChunk};
use gemrelay::providers::types::ChatRequest;

use crate::GoldenTest;

fn provider(config: &Config) -> GeminiProvider {
    GeminiProvider::from_config(config, Arc::new(StaticCredentials::new("golden")))
        .expect("provider")
}

/// Convert a stored OpenAI request and compare it with the stored backend request.
fn assert_conversion(config: &Config, request_name: &str, expected_name: &str) {
    let golden = GoldenTest::new("gemini");
    let provider = provider(config);
    let req: ChatRequest = golden.load_json(request_name);

    let caps = provider.capabilities(&req.model).expect("known model");
    let (system_prompt, messages) = split_system_prompt(&req.messages);
    let options = ChatOptions::from_request(&req, &caps);
    let (google_req, _) = provider
        .build_request(&req.model, system_prompt.as_deref(), &messages, &options)
        .expect("Failed to convert request");

    golden.assert_json(expected_name, &google_req);
}

#[test]
fn test_tool_conversation_transformation() {
    assert_conversion(
        &Config::default(),
        "tool_conversation_req",
        "tool_conversation_google",
    );
}

#[test]
fn test_grounded_reasoning_transformation() {
    let mut config = Config::default();
    config.thinking.enable_real_thinking = true;
    config.safety.harassment = Some(SafetyThreshold::BlockNone);
    config.safety.dangerous_content = Some(SafetyThreshold::BlockOnlyHigh);

    assert_conversion(
        &config,
        "grounded_reasoning_req",
        "grounded_reasoning_google",
    );
}

#[test]
fn test_inline_thinking_classification() {
    let golden = GoldenTest::new("gemini");
    let frames: Vec<GenerateContentResponse> = golden.load_json("inline_thinking_frames");

    let mut classifier = ResponseClassifier::new(true);
    let chunks: Vec<StreamChunk> = frames
        .iter()
        .flat_map(|frame| classifier.classify(frame))
        .collect();

    golden.assert_json("inline_thinking_chunks", &chunks);
}
