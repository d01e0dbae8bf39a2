//! Presentation state machine: waiting, streaming, complete.

use std::fmt;
use std::io::Write;

use crossterm::style::{Color, ContentStyle, Stylize as _};

use crate::chunk::Delta;
use crate::diagnostics::Diagnostics;
use crate::errors::AskError;
use crate::markdown::MarkdownRenderer;
use crate::view::View;

/// Label printed after the status indicator.
pub const ASSISTANT_LABEL: &str = "Assistant:";

/// Display state of one request. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DisplayState {
    /// Request sent, no response headers yet.
    Waiting,
    /// Connection open, answer arriving.
    Streaming,
    /// Stream ended; the answer is frozen.
    Complete,
}

impl DisplayState {
    /// The only state this one may move to.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Streaming),
            Self::Streaming => Some(Self::Complete),
            Self::Complete => None,
        }
    }

    /// Moves to `to`, rejecting anything but the immediate successor.
    pub fn advance(&mut self, to: Self) -> Result<(), TransitionError> {
        if self.next() != Some(to) {
            return Err(TransitionError { from: *self, to });
        }
        *self = to;
        Ok(())
    }

    pub fn indicator(self) -> Indicator {
        match self {
            Self::Waiting => Indicator {
                glyph: "🔴",
                style: ContentStyle::new().with(Color::Red).bold(),
            },
            Self::Streaming => Indicator {
                glyph: "🟠",
                style: ContentStyle::new().with(Color::Yellow).bold().slow_blink(),
            },
            Self::Complete => Indicator {
                glyph: "🟢",
                style: ContentStyle::new().with(Color::Green).bold(),
            },
        }
    }
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Waiting => "waiting",
            Self::Streaming => "streaming",
            Self::Complete => "complete",
        })
    }
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal display transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: DisplayState,
    pub to: DisplayState,
}

/// Glyph and style shown for a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicator {
    pub glyph: &'static str,
    pub style: ContentStyle,
}

impl Indicator {
    /// The glyph, with escape codes when `styled`.
    pub fn paint(&self, styled: bool) -> String {
        if styled {
            self.style.apply(self.glyph).to_string()
        } else {
            self.glyph.to_string()
        }
    }
}

/// Content of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Unformatted answer text, used while streaming.
    Plain(String),
    /// Final answer already formatted for the terminal.
    Rendered(String),
}

impl Body {
    pub fn text(&self) -> &str {
        match self {
            Self::Plain(text) | Self::Rendered(text) => text,
        }
    }
}

/// One indicator/content pair handed to a [`View`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub state: DisplayState,
    pub body: Body,
}

/// Owns the accumulated answer and the display state of one request.
pub struct Presentation<V> {
    state: DisplayState,
    answer: String,
    deltas: usize,
    view: V,
}

impl<V: View> Presentation<V> {
    /// Echoes the question and shows the waiting frame.
    pub fn new(mut view: V, question: &str) -> Result<Self, AskError> {
        view.show_question(question)?;
        let mut presentation = Self {
            state: DisplayState::Waiting,
            answer: String::new(),
            deltas: 0,
            view,
        };
        presentation.refresh()?;
        Ok(presentation)
    }

    pub fn state(&self) -> DisplayState {
        self.state
    }

    /// Answer accumulated so far.
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Number of non-empty deltas appended.
    pub fn deltas(&self) -> usize {
        self.deltas
    }

    /// Response headers arrived.
    pub fn connected(&mut self) -> Result<(), AskError> {
        self.state.advance(DisplayState::Streaming)?;
        self.refresh()
    }

    /// Appends a delta and refreshes the live frame. Empty deltas are ignored.
    pub fn push(&mut self, delta: &Delta) -> Result<(), AskError> {
        if self.state != DisplayState::Streaming {
            return Err(TransitionError {
                from: self.state,
                to: DisplayState::Streaming,
            }
            .into());
        }
        if delta.is_empty() {
            return Ok(());
        }
        self.answer.push_str(delta.text());
        self.deltas += 1;
        self.refresh()
    }

    /// Freezes the answer and replaces the live frame with the formatted one.
    ///
    /// A formatting failure falls back to the plain answer and is reported on
    /// `diag`; it does not fail the request.
    pub fn complete<W: Write>(
        &mut self,
        renderer: &dyn MarkdownRenderer,
        diag: &mut Diagnostics<W>,
    ) -> Result<(), AskError> {
        self.state.advance(DisplayState::Complete)?;
        let body = match renderer.render(&self.answer) {
            Ok(rendered) => Body::Rendered(rendered),
            Err(err) => {
                self.view.clear()?;
                diag.warn(format_args!(
                    "Markdown rendering error: {err}. Displaying as plain text:"
                ));
                Body::Plain(self.answer.clone())
            }
        };
        self.view.finish(&Frame {
            state: self.state,
            body,
        })?;
        Ok(())
    }

    /// Leaves the live frame on screen so a diagnostic can be printed below it.
    pub fn release(&mut self) -> Result<(), AskError> {
        self.view.release()?;
        Ok(())
    }

    /// Prints `emit`'s output in place of the live frame, then redraws the
    /// frame below it.
    pub fn interject<F>(&mut self, emit: F) -> Result<(), AskError>
    where
        F: FnOnce(),
    {
        self.view.clear()?;
        emit();
        self.refresh()
    }

    /// Lets a throttled view catch up while no deltas arrive.
    pub fn tick(&mut self) -> Result<(), AskError> {
        self.view.tick()?;
        Ok(())
    }

    pub fn into_view(self) -> V {
        self.view
    }

    fn refresh(&mut self) -> Result<(), AskError> {
        self.view.refresh(&Frame {
            state: self.state,
            body: Body::Plain(self.answer.clone()),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RenderError;
    use crate::markdown::AnsiMarkdownRenderer;

    #[derive(Default)]
    struct Recorder {
        question: Option<String>,
        frames: Vec<Frame>,
        finished: Option<Frame>,
        releases: usize,
        clears: usize,
    }

    impl View for Recorder {
        fn show_question(&mut self, question: &str) -> std::io::Result<()> {
            self.question = Some(question.to_string());
            Ok(())
        }

        fn refresh(&mut self, frame: &Frame) -> std::io::Result<()> {
            assert!(self.finished.is_none(), "refresh after finish");
            self.frames.push(frame.clone());
            Ok(())
        }

        fn release(&mut self) -> std::io::Result<()> {
            self.releases += 1;
            Ok(())
        }

        fn clear(&mut self) -> std::io::Result<()> {
            self.clears += 1;
            Ok(())
        }

        fn finish(&mut self, frame: &Frame) -> std::io::Result<()> {
            assert!(self.finished.is_none(), "finish called twice");
            self.finished = Some(frame.clone());
            Ok(())
        }
    }

    struct FailingRenderer;

    impl MarkdownRenderer for FailingRenderer {
        fn render(&self, _markdown: &str) -> Result<String, RenderError> {
            Err(RenderError("unbalanced markup".into()))
        }
    }

    fn plain(state: DisplayState, text: &str) -> Frame {
        Frame {
            state,
            body: Body::Plain(text.into()),
        }
    }

    #[test]
    fn transitions_only_move_to_the_next_state() {
        let mut state = DisplayState::Waiting;
        assert!(state.advance(DisplayState::Complete).is_err());
        assert!(state.advance(DisplayState::Waiting).is_err());
        state.advance(DisplayState::Streaming).expect("streaming");
        assert!(state.advance(DisplayState::Waiting).is_err());
        state.advance(DisplayState::Complete).expect("complete");
        let err = state.advance(DisplayState::Complete).expect_err("complete once");
        assert_eq!(err.to_string(), "illegal display transition: complete -> complete");
        assert_eq!(state, DisplayState::Complete);
    }

    #[test]
    fn each_state_has_a_distinct_indicator() {
        let glyphs = [
            DisplayState::Waiting.indicator().glyph,
            DisplayState::Streaming.indicator().glyph,
            DisplayState::Complete.indicator().glyph,
        ];
        assert_eq!(glyphs, ["🔴", "🟠", "🟢"]);
        assert_eq!(DisplayState::Complete.indicator().paint(false), "🟢");
        assert!(DisplayState::Complete.indicator().paint(true).contains('\u{1b}'));
    }

    #[test]
    fn frames_follow_waiting_streaming_complete() {
        let mut diag = Diagnostics::new(Vec::new(), false);
        let mut presentation = Presentation::new(Recorder::default(), "hi").expect("new");
        presentation.connected().expect("connected");
        presentation.push(&Delta::from("Hel")).expect("push");
        presentation.push(&Delta::from("lo")).expect("push");
        presentation.push(&Delta::none()).expect("push");
        presentation
            .complete(&AnsiMarkdownRenderer::plain(), &mut diag)
            .expect("complete");

        assert_eq!(presentation.answer(), "Hello");
        assert_eq!(presentation.deltas(), 2);
        assert_eq!(presentation.state(), DisplayState::Complete);
        let view = presentation.into_view();
        assert_eq!(view.question.as_deref(), Some("hi"));
        assert_eq!(
            view.frames,
            vec![
                plain(DisplayState::Waiting, ""),
                plain(DisplayState::Streaming, ""),
                plain(DisplayState::Streaming, "Hel"),
                plain(DisplayState::Streaming, "Hello"),
            ]
        );
        assert_eq!(
            view.finished,
            Some(Frame {
                state: DisplayState::Complete,
                body: Body::Rendered("Hello".into()),
            })
        );
        assert_eq!(diag.warnings(), 0);
    }

    #[test]
    fn deltas_are_rejected_outside_streaming() {
        let mut diag = Diagnostics::new(Vec::new(), false);
        let mut presentation = Presentation::new(Recorder::default(), "q").expect("new");
        assert!(matches!(
            presentation.push(&Delta::from("early")),
            Err(AskError::Transition(_))
        ));
        presentation.connected().expect("connected");
        presentation
            .complete(&AnsiMarkdownRenderer::plain(), &mut diag)
            .expect("complete");
        assert!(presentation.push(&Delta::from("late")).is_err());
        assert!(presentation.connected().is_err());
        assert!(
            presentation
                .complete(&AnsiMarkdownRenderer::plain(), &mut diag)
                .is_err()
        );
        assert_eq!(presentation.answer(), "");
    }

    #[test]
    fn interjected_output_replaces_the_frame_which_is_then_redrawn() {
        let mut presentation = Presentation::new(Recorder::default(), "q").expect("new");
        presentation.connected().expect("connected");
        presentation.push(&Delta::from("part")).expect("push");
        let mut emitted = false;
        presentation
            .interject(|| emitted = true)
            .expect("interject");
        assert!(emitted);
        let view = presentation.into_view();
        assert_eq!(view.clears, 1);
        assert_eq!(view.releases, 0);
        assert_eq!(
            view.frames.last(),
            Some(&plain(DisplayState::Streaming, "part"))
        );
        assert_eq!(view.frames.len(), 4);
    }

    #[test]
    fn render_failure_falls_back_to_plain_text() {
        let mut diag = Diagnostics::new(Vec::new(), false);
        let mut presentation = Presentation::new(Recorder::default(), "q").expect("new");
        presentation.connected().expect("connected");
        presentation.push(&Delta::from("**half")).expect("push");
        presentation
            .complete(&FailingRenderer, &mut diag)
            .expect("fallback is not an error");

        assert_eq!(diag.warnings(), 1);
        let written = String::from_utf8(diag.into_inner()).expect("utf8");
        assert!(written.contains(
            "Markdown rendering error: unbalanced markup. Displaying as plain text:"
        ));
        let view = presentation.into_view();
        assert_eq!(view.clears, 1);
        assert_eq!(view.releases, 0);
        assert_eq!(
            view.finished,
            Some(plain(DisplayState::Complete, "**half"))
        );
    }
}
