//! Provider behavior against a mocked Cloud Code backend.

mod common;
mod gemini;
