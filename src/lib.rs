//! gemrelay -- OpenAI-compatible chat completions over the Google Cloud Code
//! streaming API.
//!
//! - [`auth`]: credential provider seam
//! - [`config`]: TOML configuration with `GEMRELAY_*` overrides
//! - [`net`]: HTTP client and SSE framing
//! - [`providers`]: request types, errors, retry policy and the Gemini provider

pub mod auth;
pub mod config;
pub mod net;
pub mod providers;
