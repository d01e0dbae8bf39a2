use std::future::Future;
use std::io::{self, IsTerminal as _, Write};

use futures::StreamExt as _;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument as _, debug, info, info_span};

use crate::chunk::extract_delta;
use crate::client::AskClient;
use crate::config::AskConfig;
use crate::content::{Answer, Question};
use crate::diagnostics::Diagnostics;
use crate::display::Presentation;
use crate::errors::{AskError, EXIT_FAILURE, EXIT_SUCCESS, ErrorKind};
use crate::markdown::{AnsiMarkdownRenderer, MarkdownRenderer};
use crate::sse::SseEvent;
use crate::view::{TerminalView, Throttle, View};

/// Streams one answer to `question` through `view`.
///
/// The view sees the question, a waiting frame, a streaming frame per
/// non-empty delta and finally the formatted answer. Malformed chunks are
/// reported on `diag` and skipped. The stream ends at the done sentinel or
/// when the body is exhausted, whichever comes first.
///
/// While waiting for the next event the view is ticked at the configured
/// refresh rate, so coalesced frames show up during pauses in the stream.
pub async fn ask<V, W>(
    client: &AskClient,
    system_prompt: &str,
    question: &Question,
    view: V,
    renderer: &dyn MarkdownRenderer,
    diag: &mut Diagnostics<W>,
) -> Result<Answer, AskError>
where
    V: View,
    W: Write,
{
    let mut presentation = Presentation::new(view, question.as_str())?;
    let mut events = match client.open_stream(system_prompt, question).await {
        Ok(events) => events,
        Err(err) => {
            presentation.release()?;
            return Err(err);
        }
    };
    presentation.connected()?;

    let mut ticker = tokio::time::interval(client.config().refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut warnings = 0;
    loop {
        let event = tokio::select! {
            event = events.next() => event,
            _ = ticker.tick() => {
                presentation.tick()?;
                continue;
            }
        };
        let Some(event) = event else {
            break;
        };
        let payload = match event {
            Ok(SseEvent::Data(payload)) => payload,
            Ok(SseEvent::Done) => {
                debug!("done sentinel received");
                break;
            }
            Err(err) => {
                presentation.release()?;
                return Err(err);
            }
        };
        match extract_delta(&payload) {
            Ok(delta) => presentation.push(&delta)?,
            Err(err) => {
                debug!(error = %err, "skipping malformed chunk");
                warnings += 1;
                presentation.interject(|| {
                    diag.warn(format_args!(
                        "[Warning: Stream processing error: {err} on chunk: {payload}]"
                    ));
                })?;
            }
        }
    }

    presentation.complete(renderer, diag)?;
    Ok(Answer {
        text: presentation.answer().to_string(),
        deltas: presentation.deltas(),
        warnings,
    })
}

/// Prints a terminating error on `diag` and returns the exit status.
pub fn report<W: Write>(err: &AskError, diag: &mut Diagnostics<W>) -> u8 {
    debug!(kind = ?err.kind(), error = %err, "invocation failed");
    match err.kind() {
        ErrorKind::Configuration => diag.error(format_args!("Error: {err}")),
        ErrorKind::Transport | ErrorKind::Status => diag.error(err),
        ErrorKind::Unexpected => diag.error(format_args!("An unexpected error occurred: {err}")),
    }
    err.exit_code()
}

async fn ask_on_terminal<W: Write>(
    config: AskConfig,
    system_prompt: &str,
    question: &Question,
    diag: &mut Diagnostics<W>,
) -> Result<Answer, AskError> {
    let interval = config.refresh_interval();
    let client = AskClient::new(config)?;
    let view = Throttle::new(TerminalView::stdout(), interval);
    let renderer = AnsiMarkdownRenderer::new(io::stdout().is_terminal());
    ask(&client, system_prompt, question, view, &renderer, diag).await
}

/// Waits for `task`, or cancels it when `interrupt` resolves first.
///
/// Cancelling drops the task's view, which restores the cursor and moves
/// below the live frame before the message is printed.
async fn until_interrupted<I>(mut task: JoinHandle<u8>, interrupt: I) -> u8
where
    I: Future<Output = ()>,
{
    tokio::select! {
        joined = &mut task => match joined {
            Ok(code) => code,
            Err(err) => {
                Diagnostics::stderr().error(format_args!("An unexpected error occurred: {err}"));
                EXIT_FAILURE
            }
        },
        () = interrupt => {
            debug!("interrupted");
            task.abort();
            let _ = task.await;
            Diagnostics::stderr().error("Interrupted.");
            EXIT_FAILURE
        }
    }
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Answers `question` on stdout and returns the process exit status.
///
/// The request runs in its own task; a panic inside it is reported as an
/// unexpected error instead of unwinding through the caller. Ctrl-C cancels
/// the task and exits with a failure status.
pub async fn run(config: AskConfig, system_prompt: impl Into<String>, question: Question) -> u8 {
    let system_prompt = system_prompt.into();
    let run_id = uuid::Uuid::new_v4();
    let span = info_span!("ask", run_id = %run_id, model = %config.model);

    let task = tokio::spawn(
        async move {
            let mut diag = Diagnostics::stderr();
            match ask_on_terminal(config, &system_prompt, &question, &mut diag).await {
                Ok(answer) => {
                    info!(
                        deltas = answer.deltas,
                        warnings = answer.warnings,
                        chars = answer.text.chars().count(),
                        "answer complete"
                    );
                    EXIT_SUCCESS
                }
                Err(err) => report(&err, &mut diag),
            }
        }
        .instrument(span),
    );

    until_interrupted(task, ctrl_c()).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn interrupt_cancels_the_task_before_returning() {
        let dropped = Arc::new(AtomicBool::new(false));
        let guard = SetOnDrop(dropped.clone());
        let task = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
            EXIT_SUCCESS
        });
        tokio::task::yield_now().await;

        let code = until_interrupted(task, async {}).await;
        assert_eq!(code, EXIT_FAILURE);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn finished_task_wins_over_a_pending_interrupt() {
        let task = tokio::spawn(async { EXIT_SUCCESS });
        let code = until_interrupted(task, std::future::pending()).await;
        assert_eq!(code, EXIT_SUCCESS);
    }

    #[tokio::test]
    async fn panicking_task_is_an_unexpected_failure() {
        let task = tokio::spawn(async { panic!("boom") });
        let code = until_interrupted(task, std::future::pending()).await;
        assert_eq!(code, EXIT_FAILURE);
    }

    fn reported(err: AskError) -> (u8, String) {
        let mut diag = Diagnostics::new(Vec::new(), false);
        let code = report(&err, &mut diag);
        (code, String::from_utf8(diag.into_inner()).expect("utf8"))
    }

    #[test]
    fn configuration_errors_are_prefixed() {
        let (code, text) = reported(AskError::MissingCredential {
            var: "OPENROUTER_API_KEY",
        });
        assert_eq!(code, 1);
        assert_eq!(
            text,
            "Error: Environment variable OPENROUTER_API_KEY is not set.\n"
        );
    }

    #[test]
    fn status_errors_include_the_body() {
        let (code, text) = reported(AskError::Status {
            status: 401,
            reason: "Unauthorized".into(),
            body: "{\n  \"error\": \"bad key\"\n}".into(),
        });
        assert_eq!(code, 1);
        assert_eq!(
            text,
            "API HTTP Error (401 Unauthorized)\nResponse body:\n{\n  \"error\": \"bad key\"\n}\n"
        );
    }

    #[test]
    fn transport_and_internal_errors_use_their_own_wording() {
        let (_, text) = reported(AskError::Transport("connection refused".into()));
        assert_eq!(text, "API Request Error: connection refused\n");

        let (code, text) = reported(AskError::Client("no tls backend".into()));
        assert_eq!(code, 1);
        assert_eq!(
            text,
            "An unexpected error occurred: failed to build HTTP client: no tls backend\n"
        );
    }
}
