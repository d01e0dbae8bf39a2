//! Streaming question-and-answer client for an OpenAI-compatible
//! chat-completions endpoint.
//!
//! A question is sent with a fixed system prompt; the answer is streamed back
//! as server-sent events, shown live in the terminal and re-rendered as
//! markdown once the stream ends.
//!
//! # Usage
//!
//! ```no_run
//! use ask_harness::{AskConfig, Question, SYSTEM_PROMPT, run};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ask_harness::AskError> {
//! let config = AskConfig::from_env()?;
//! let question = Question::new("What is the capital of France?")?;
//! let status = run(config, SYSTEM_PROMPT, question).await;
//! std::process::exit(i32::from(status));
//! # }
//! ```

/// Delta extraction from chat-completion chunks.
pub mod chunk;
/// HTTP client that opens the event stream.
pub mod client;
/// Invocation configuration and fixed protocol constants.
pub mod config;
/// Question and answer values.
pub mod content;
/// Warning and error output.
pub mod diagnostics;
/// Display state machine and frames.
pub mod display;
/// Error types and exit statuses.
pub mod errors;
/// Markdown formatting for the final answer.
pub mod markdown;
/// Tracing subscriber setup.
pub mod observability;
/// The system prompt sent with every question.
pub mod prompt;
/// Request orchestration and error reporting.
pub mod run;
/// Server-sent event decoding.
pub mod sse;
/// Terminal output and refresh throttling.
pub mod view;

pub use chunk::{Delta, extract_delta};
pub use client::{AskClient, EventStream};
pub use config::AskConfig;
pub use content::{Answer, Question};
pub use diagnostics::Diagnostics;
pub use display::{Body, DisplayState, Frame, Indicator, Presentation, TransitionError};
pub use errors::{AskError, ChunkError, EXIT_FAILURE, EXIT_SUCCESS, ErrorKind, RenderError};
pub use markdown::{AnsiMarkdownRenderer, MarkdownRenderer};
pub use observability::{LogSettings, init_observability};
pub use prompt::SYSTEM_PROMPT;
pub use run::{ask, report, run};
pub use sse::{LineDecoder, SseEvent, decode_line, event_stream};
pub use view::{TerminalView, Throttle, View};
