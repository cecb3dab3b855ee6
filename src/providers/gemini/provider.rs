//! Gemini (Cloud Code) provider.
//!
//! Ties the pipeline together: request conversion, the backend call with
//! its recovery loop, frame classification and, for non-streaming calls,
//! aggregation.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, instrument, warn};

use crate::auth::CredentialProvider;
use crate::config::{Config, SafetyConfig, ThinkingSettings};
use crate::providers::ProviderError;
use crate::providers::gemini::aggregate::{Completion, aggregate};
use crate::providers::gemini::citation::{CitationAnnotator, PassthroughAnnotator};
use crate::providers::gemini::client::CloudCodeClient;
use crate::providers::gemini::constants::auto_switch_notice;
use crate::providers::gemini::convert::{
    build_generation_config, build_safety_settings, convert_messages, split_system_prompt,
};
use crate::providers::gemini::models::google::{Content, GenerateContentRequest, Part};
use crate::providers::gemini::options::ChatOptions;
use crate::providers::gemini::registry::{CapabilityRegistry, ModelCapabilities, ModelRegistry};
use crate::providers::gemini::stream::{ChunkStream, ClassifiedStream, ResponseClassifier, ThinkingPhase};
use crate::providers::gemini::thinking::{preamble_stream, should_fake_thinking, user_preview};
use crate::providers::gemini::tools::{DefaultToolSelector, ToolSelector};
use crate::providers::retry::RetryPolicy;
use crate::providers::types::{ChatMessage, ChatRequest, ChatResponse};

/// OpenAI-compatible chat provider backed by Cloud Code.
#[derive(Clone)]
pub struct GeminiProvider {
    client: CloudCodeClient,
    registry: Arc<dyn CapabilityRegistry>,
    tool_selector: Arc<dyn ToolSelector>,
    annotator: Arc<dyn CitationAnnotator>,
    thinking: ThinkingSettings,
    safety: SafetyConfig,
}

impl GeminiProvider {
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::default()
    }

    /// Provider with default collaborators, configured from `config`.
    pub fn from_config(
        config: &Config,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ProviderError> {
        Self::builder().config(config).credentials(credentials).build()
    }

    /// Ids of every supported model.
    pub fn models(&self) -> Vec<String> {
        self.registry.models()
    }

    pub fn capabilities(&self, model: &str) -> Result<ModelCapabilities, ProviderError> {
        self.registry
            .capabilities(model)
            .ok_or_else(|| ProviderError::UnknownModel(model.to_string()))
    }

    /// Stream normalized chunks for one request.
    ///
    /// Conversion errors are returned before any backend call; backend and
    /// transport errors arrive as stream items.
    pub fn stream_content(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChunkStream, ProviderError> {
        self.build_stream(model, system_prompt, messages, options, true)
    }

    /// Run one request to completion.
    ///
    /// A rate-limit failure that escaped the retry loop gets one more pass
    /// with the fallback model, with the switch notice prepended. Failures
    /// already served by the fallback are returned as they are.
    #[instrument(skip(self, system_prompt, messages, options), fields(model = %model))]
    pub async fn complete(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<Completion, ProviderError> {
        let stream = self.build_stream(model, system_prompt, messages, options, false)?;
        let error = match aggregate(stream).await {
            Ok(completion) => return Ok(completion),
            Err(e) => e,
        };

        let Some(fallback) = self.retry().fallback_after_error(&error, model) else {
            return Err(error);
        };
        let fallback = fallback.to_string();
        warn!(from = %model, to = %fallback, error = %error, "Retrying with fallback model");

        let stream = self.build_stream(&fallback, system_prompt, messages, options, false)?;
        let mut completion = aggregate(stream).await?;
        completion
            .content
            .insert_str(0, &auto_switch_notice(model, &fallback));
        Ok(completion)
    }

    /// OpenAI request in, chat completion out.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let caps = self.capabilities(&request.model)?;
        let (system_prompt, messages) = split_system_prompt(&request.messages);
        let options = ChatOptions::from_request(request, &caps);

        let completion = self
            .complete(&request.model, system_prompt.as_deref(), &messages, &options)
            .await?;
        Ok(completion.into_chat_response(&request.model))
    }

    /// OpenAI request in, chunk stream out.
    pub fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream, ProviderError> {
        let caps = self.capabilities(&request.model)?;
        let (system_prompt, messages) = split_system_prompt(&request.messages);
        let options = ChatOptions::from_request(request, &caps);

        self.stream_content(&request.model, system_prompt.as_deref(), &messages, &options)
    }

    fn retry(&self) -> &RetryPolicy {
        self.client.retry_policy()
    }

    /// Build the backend request for `model`.
    pub fn build_request(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<(GenerateContentRequest, bool), ProviderError> {
        let caps = self.capabilities(model)?;
        let contents = convert_messages(messages, &caps)?;
        let resolved = self.tool_selector.select(
            &options.tools,
            options.tool_choice.as_ref(),
            &options.native_tools,
            model,
        );

        let request = GenerateContentRequest {
            contents,
            system_instruction: system_prompt
                .filter(|s| !s.trim().is_empty())
                .map(|s| Content::system(vec![Part::text(s)])),
            generation_config: build_generation_config(&caps, options, &self.thinking),
            tools: resolved.tools,
            tool_config: resolved.tool_config,
            safety_settings: build_safety_settings(&self.safety),
        };
        Ok((request, resolved.grounding_active))
    }

    fn build_stream(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        options: &ChatOptions,
        with_preamble: bool,
    ) -> Result<ChunkStream, ProviderError> {
        let caps = self.capabilities(model)?;
        let (request, grounding_active) =
            self.build_request(model, system_prompt, messages, options)?;

        let fake_thinking = with_preamble
            && should_fake_thinking(caps.thinking, options.include_reasoning, &self.thinking);
        let preamble: ChunkStream = if fake_thinking {
            preamble_stream(&user_preview(messages), &self.thinking)
        } else {
            stream::empty().boxed()
        };
        let phase = if fake_thinking && self.thinking.stream_thinking_as_content {
            ThinkingPhase::Open
        } else {
            ThinkingPhase::Idle
        };

        let classifier = ResponseClassifier::new(self.thinking.stream_thinking_as_content)
            .with_phase(phase)
            .with_grounding(grounding_active, self.annotator.clone());

        debug!(model = %model, fake_thinking, grounding_active, "Starting stream");

        let client = self.client.clone();
        let model = model.to_string();
        let backend = stream::once(async move {
            match client.open_stream(&model, &request).await {
                Ok(opened) => {
                    let bytes = opened.response.bytes_stream().map(|r| r.map_err(ProviderError::from));
                    let chunks = ClassifiedStream::new(bytes, classifier, &opened.notices);
                    if opened.model == model {
                        chunks.boxed()
                    } else {
                        let served = opened.model;
                        chunks
                            .map(move |item| item.map_err(|e| e.on_fallback(&served)))
                            .boxed()
                    }
                }
                Err(e) => stream::iter([Err(e)]).boxed(),
            }
        })
        .flatten();

        Ok(preamble.chain(backend).boxed())
    }
}

/// Builder for [`GeminiProvider`].
#[derive(Default)]
pub struct GeminiProviderBuilder {
    config: Option<Config>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    registry: Option<Arc<dyn CapabilityRegistry>>,
    tool_selector: Option<Arc<dyn ToolSelector>>,
    annotator: Option<Arc<dyn CitationAnnotator>>,
}

impl GeminiProviderBuilder {
    pub fn config(mut self, config: &Config) -> Self {
        self.config = Some(config.clone());
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn CapabilityRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn tool_selector(mut self, selector: Arc<dyn ToolSelector>) -> Self {
        self.tool_selector = Some(selector);
        self
    }

    pub fn annotator(mut self, annotator: Arc<dyn CitationAnnotator>) -> Self {
        self.annotator = Some(annotator);
        self
    }

    pub fn build(self) -> Result<GeminiProvider, ProviderError> {
        let config = self.config.unwrap_or_default();
        let credentials = self
            .credentials
            .ok_or_else(|| ProviderError::Config("a credential provider is required".into()))?;

        let client = CloudCodeClient::builder()
            .with_credentials(credentials)
            .with_backend_config(&config.backend)
            .with_retry_policy(RetryPolicy::new(config.fallback.clone()));

        Ok(GeminiProvider {
            client: client.build()?,
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(ModelRegistry::builtin())),
            tool_selector: self
                .tool_selector
                .unwrap_or_else(|| Arc::new(DefaultToolSelector)),
            annotator: self
                .annotator
                .unwrap_or_else(|| Arc::new(PassthroughAnnotator)),
            thinking: config.thinking,
            safety: config.safety,
        })
    }
}
