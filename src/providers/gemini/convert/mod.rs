//! Format conversion from the OpenAI chat format to Cloud Code requests.
//!
//! ## Module Structure
//!
//! - `config`: reasoning effort, thinking budgets, `generationConfig`, safety
//! - `content`: messages and content parts to Google `Content`/`Part`
//! - `media`: image and PDF validation
//! - `schema`: JSON Schema cleaning for function declarations

pub mod config;
pub mod content;
pub mod media;
pub mod schema;

pub use config::{build_generation_config, build_safety_settings, validate_thinking_budget};
pub use content::{convert_messages, split_system_prompt};
pub use schema::clean_schema;
