//! Constants for the Cloud Code API.
//!
//! Endpoints, request paths and headers, thinking budgets and the literal
//! markers used when thinking is streamed inline with content.

// ============================================================================
// API Endpoints
// ============================================================================

/// Production Cloud Code API endpoint.
pub const CLOUDCODE_ENDPOINT: &str = "https://cloudcode-pa.googleapis.com";

/// Streaming generation path (server-sent events).
pub const API_PATH_STREAM_GENERATE_CONTENT: &str = "/v1internal:streamGenerateContent";

/// Query string selecting SSE framing for the streaming path.
pub const STREAM_ALT_SSE: &str = "alt=sse";

/// Project discovery path.
pub const API_PATH_LOAD_CODE_ASSIST: &str = "/v1internal:loadCodeAssist";

// ============================================================================
// Headers
// ============================================================================

/// X-Goog-Api-Client header value.
pub const GOOG_API_CLIENT: &str = "google-cloud-sdk vscode_cloudshelleditor/0.1";

/// Client-Metadata header value (JSON).
pub const CLIENT_METADATA: &str =
    r#"{"ideType":"IDE_UNSPECIFIED","platform":"PLATFORM_UNSPECIFIED","pluginType":"GEMINI"}"#;

// ============================================================================
// Thinking
// ============================================================================

/// Let the model pick its own thinking budget.
pub const DEFAULT_THINKING_BUDGET: i32 = -1;

/// Reasoning effort budgets, `(flash, default)` per level.
pub const EFFORT_LOW_BUDGET: i32 = 1024;
pub const EFFORT_MEDIUM_BUDGET: (i32, i32) = (12288, 16384);
pub const EFFORT_HIGH_BUDGET: (i32, i32) = (24576, 32768);

/// Opening marker emitted once before inline thinking content.
pub const THINKING_OPEN_MARKER: &str = "<thinking>\n";

/// Closing marker emitted before the first non-thinking output.
pub const THINKING_CLOSE_MARKER: &str = "\n</thinking>\n\n";

/// Delimiters the model sometimes writes into plain text parts.
pub const THINKING_TAG_OPEN: &str = "<thinking>";
pub const THINKING_TAG_CLOSE: &str = "</thinking>";

// ============================================================================
// Fallback
// ============================================================================

/// Statuses that trigger the rate-limit model fallback.
pub const RATE_LIMIT_STATUSES: &[u16] = &[429, 503];

/// Notice streamed to the caller when the model is switched mid-request.
pub fn auto_switch_notice(from: &str, to: &str) -> String {
    format!("[Auto-switched from {from} to {to} due to rate limiting]\n\n")
}
