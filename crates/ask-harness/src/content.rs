use std::fmt;

use crate::errors::AskError;

/// The user's question, guaranteed non-blank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Creates a question from a single string.
    pub fn new(text: impl Into<String>) -> Result<Self, AskError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(AskError::EmptyQuestion);
        }
        Ok(Self(text))
    }

    /// Joins command-line words with single spaces.
    pub fn from_words<I, S>(words: I) -> Result<Self, AskError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = words
            .into_iter()
            .map(|word| word.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join(" ");
        Self::new(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a completed request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Answer {
    /// Concatenation of every non-empty delta, in arrival order.
    pub text: String,
    /// Number of non-empty deltas received.
    pub deltas: usize,
    /// Number of chunks reported as malformed.
    pub warnings: usize,
}
