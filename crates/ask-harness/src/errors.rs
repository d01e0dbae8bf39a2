use crate::display::TransitionError;

/// Exit status reported for every terminating failure.
pub const EXIT_FAILURE: u8 = 1;

/// Exit status for a fully rendered answer.
pub const EXIT_SUCCESS: u8 = 0;

/// Failures that terminate an invocation.
///
/// Malformed chunks and markdown failures are not represented here; they are
/// absorbed locally as [`ChunkError`] and [`RenderError`].
#[derive(Debug, thiserror::Error)]
pub enum AskError {
    /// The bearer token variable is missing or blank.
    #[error("Environment variable {var} is not set.")]
    MissingCredential { var: &'static str },
    /// The question is empty after joining its words.
    #[error("The 'question' argument cannot be empty.")]
    EmptyQuestion,
    /// Connection, timeout or body read failure below the HTTP layer.
    #[error("API Request Error: {0}")]
    Transport(String),
    /// The endpoint answered with a non-success status.
    #[error("API HTTP Error ({status} {reason})\nResponse body:\n{body}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    /// Presentation state was driven out of order.
    #[error(transparent)]
    Transition(#[from] TransitionError),
    /// Writing to an output sink failed.
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used when reporting an [`AskError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Status,
    Unexpected,
}

impl AskError {
    /// Builds a transport error that keeps the whole source chain.
    pub(crate) fn transport(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        Self::Transport(message)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredential { .. } | Self::EmptyQuestion => ErrorKind::Configuration,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Status { .. } => ErrorKind::Status,
            Self::Client(_) | Self::Transition(_) | Self::Io(_) => ErrorKind::Unexpected,
        }
    }

    /// Process exit status for this failure. Always non-zero.
    pub fn exit_code(&self) -> u8 {
        EXIT_FAILURE
    }
}

/// A single stream chunk that could not be turned into a delta.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("invalid JSON: {0}")]
    Json(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("`choices` is empty")]
    NoChoices,
    /// The provider reported a failure inside the stream.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl From<serde_json::Error> for ChunkError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value.to_string())
    }
}

/// Final markdown formatting failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RenderError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn transport_error_includes_source_chain() {
        let err = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        let AskError::Transport(message) = AskError::transport(&err) else {
            panic!("expected transport error");
        };
        assert_eq!(message, "outer failure: connection refused");
    }

    #[test]
    fn every_terminating_error_exits_with_one() {
        let errors = [
            AskError::MissingCredential { var: "KEY" },
            AskError::EmptyQuestion,
            AskError::Transport("dns".into()),
            AskError::Status {
                status: 401,
                reason: "Unauthorized".into(),
                body: "{}".into(),
            },
            AskError::Client("tls".into()),
        ];
        for err in errors {
            assert_eq!(err.exit_code(), EXIT_FAILURE, "{err}");
        }
    }

    #[test]
    fn status_error_message_carries_code_and_body() {
        let err = AskError::Status {
            status: 401,
            reason: "Unauthorized".into(),
            body: "{\n  \"error\": \"bad key\"\n}".into(),
        };
        let text = err.to_string();
        assert!(text.starts_with("API HTTP Error (401 Unauthorized)"));
        assert!(text.contains("Response body:\n{\n  \"error\""));
        assert_eq!(err.kind(), ErrorKind::Status);
    }

    #[test]
    fn missing_credential_names_the_variable() {
        let err = AskError::MissingCredential {
            var: "OPENROUTER_API_KEY",
        };
        assert_eq!(
            err.to_string(),
            "Environment variable OPENROUTER_API_KEY is not set."
        );
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
