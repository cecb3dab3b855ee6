//! Wire and output models.

pub mod chunk;
pub mod google;

pub use chunk::{StreamChunk, ToolCodeData, UsageData};
