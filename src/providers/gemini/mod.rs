//! # gemini
//!
//! OpenAI-compatible chat on top of the Google Cloud Code streaming API.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use gemrelay::auth::StaticCredentials;
//! use gemrelay::config::Config;
//! use gemrelay::providers::gemini::{ChatOptions, GeminiProvider};
//! use gemrelay::providers::types::ChatMessage;
//!
//! # async fn example() -> Result<(), gemrelay::providers::ProviderError> {
//! let provider = GeminiProvider::from_config(
//!     &Config::default(),
//!     Arc::new(StaticCredentials::new("ya29.token")),
//! )?;
//!
//! let mut stream = provider.stream_content(
//!     "gemini-2.5-flash",
//!     Some("Answer briefly."),
//!     &[ChatMessage::user("Why is the sky blue?")],
//!     &ChatOptions::default(),
//! )?;
//! while let Some(chunk) = stream.next().await {
//!     println!("{}", serde_json::to_string(&chunk?)?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! 1. `convert`: messages, generation config, safety settings
//! 2. `tools`: function declarations and native grounding tools
//! 3. `client`: backend call with one auth refresh or model fallback
//! 4. `stream`: SSE frames classified into [`StreamChunk`]s
//! 5. `aggregate`: chunks folded into a [`Completion`]

pub mod aggregate;
pub mod citation;
pub mod client;
pub mod constants;
pub mod convert;
pub mod discovery;
pub mod models;
pub mod options;
pub mod provider;
pub mod registry;
pub mod stream;
pub mod thinking;
pub mod tools;

pub use aggregate::{Completion, aggregate};
pub use citation::{CitationAnnotator, PassthroughAnnotator};
pub use client::{CloudCodeClient, CloudCodeClientBuilder, OpenedStream};
pub use models::{StreamChunk, ToolCodeData, UsageData};
pub use options::{ChatOptions, NativeToolFlags};
pub use provider::{GeminiProvider, GeminiProviderBuilder};
pub use registry::{CapabilityRegistry, ModelCapabilities, ModelFamily, ModelRegistry};
pub use stream::{ChunkStream, ResponseClassifier, ThinkingPhase};
pub use tools::{DefaultToolSelector, ResolvedTools, ToolSelector};
