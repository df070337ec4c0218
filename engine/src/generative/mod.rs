//! Generative Collaborator Boundary
//!
//! The orchestration engine treats the generative capability as an opaque
//! function: text in, text out. The `GenerativeClient` trait defines that
//! contract so the decomposer and the capability adapters can work against
//! a deterministic stub in tests and an HTTP-backed client in production.
//!
//! This module also provides the JSON extraction helpers shared by every
//! caller that has to dig structured output out of free-form model text.

use async_trait::async_trait;

pub mod gemini;

/// Result type for generative operations
pub type Result<T> = std::result::Result<T, GenerativeError>;

/// Errors that can occur when calling the generative collaborator
#[derive(Debug, thiserror::Error)]
pub enum GenerativeError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// A single request to the generative collaborator
///
/// The engine never models the collaborator's internal reasoning; the
/// request is an instruction framing plus a prompt, the response is text.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerativeRequest {
    /// Standing instructions for this call (role framing, output contract)
    pub system: Option<String>,

    /// The prompt body
    pub prompt: String,
}

impl GenerativeRequest {
    /// Create a request with an instruction framing
    pub fn with_system(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            prompt: prompt.into(),
        }
    }

    /// Create a bare prompt request
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
        }
    }
}

/// Contract implemented by every generative collaborator backend
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Returns the name of the backend (e.g., "gemini")
    fn name(&self) -> &str;

    /// Generate a text response for the given request
    async fn generate(&self, request: &GenerativeRequest) -> Result<String>;
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
/// Returns `None` if no fenced block is found.
pub fn extract_fenced_block(content: &str) -> Option<&str> {
    // Find opening fence
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    // Find closing fence after the body starts
    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract the first JSON array from model output.
///
/// Tries, in order: the whole trimmed content, the body of a markdown code
/// fence, and the outermost `[` .. `]` span. Returns the candidate slice;
/// the caller is responsible for deserializing it.
pub fn extract_json_array(content: &str) -> Option<&str> {
    let trimmed = content.trim();

    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        return Some(trimmed);
    }

    if let Some(inner) = extract_fenced_block(trimmed) {
        let inner = inner.trim();
        if inner.starts_with('[') {
            return Some(inner);
        }
    }

    let start = trimmed.find('[')?;
    let end = trimmed.rfind(']')?;
    if start < end {
        Some(&trimmed[start..=end])
    } else {
        None
    }
}

/// Extract the first balanced JSON object from model output.
///
/// Tries the whole trimmed content, then a fenced block, then scans for the
/// first `{` and counts brace depth (respecting string literals) to find the
/// matching close.
pub fn extract_json_object(content: &str) -> Option<&str> {
    let trimmed = content.trim();

    if trimmed.starts_with('{') {
        if let Some(obj) = extract_balanced_object(trimmed) {
            return Some(obj);
        }
    }

    if let Some(inner) = extract_fenced_block(trimmed) {
        let inner = inner.trim();
        if inner.starts_with('{') {
            if let Some(obj) = extract_balanced_object(inner) {
                return Some(obj);
            }
        }
    }

    let pos = trimmed.find('{')?;
    extract_balanced_object(&trimmed[pos..])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn extract_balanced_object(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
