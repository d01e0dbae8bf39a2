//! Extraction of incremental text from chat-completion chunks.

use serde::Deserialize;

use crate::errors::ChunkError;

/// Incremental text carried by one chunk.
///
/// An empty string and an absent `content` field are the same thing here:
/// both contribute nothing to the answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta(Option<String>);

impl Delta {
    pub fn new(content: Option<String>) -> Self {
        Self(content.filter(|text| !text.is_empty()))
    }

    /// A delta with no content.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn text(&self) -> &str {
        self.0.as_deref().unwrap_or_default()
    }
}

impl From<&str> for Delta {
    fn from(value: &str) -> Self {
        Self::new(Some(value.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Option<Vec<ChunkChoice>>,
    #[serde(default)]
    error: Option<UpstreamError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl UpstreamError {
    fn describe(self) -> String {
        let message = self
            .message
            .unwrap_or_else(|| "unknown provider error".to_string());
        match self.code {
            Some(code) => format!("{message} (code {code})"),
            None => message,
        }
    }
}

/// Parses one event payload and returns the text fragment of its first choice.
///
/// Errors are per chunk; callers report them and keep consuming the stream.
pub fn extract_delta(payload: &str) -> Result<Delta, ChunkError> {
    let chunk: ChatChunk = serde_json::from_str(payload)?;
    if let Some(error) = chunk.error {
        return Err(ChunkError::Upstream(error.describe()));
    }
    let choice = chunk
        .choices
        .ok_or(ChunkError::MissingField("choices"))?
        .into_iter()
        .next()
        .ok_or(ChunkError::NoChoices)?;
    let delta = choice.delta.ok_or(ChunkError::MissingField("delta"))?;
    Ok(Delta::new(delta.content))
}
