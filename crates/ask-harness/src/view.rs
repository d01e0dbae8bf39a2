//! Output sinks for presentation frames.

use std::io::{self, IsTerminal as _, Write};
use std::time::{Duration, Instant};

use crossterm::style::{Print, Stylize as _};
use crossterm::{cursor, queue, terminal};
use unicode_width::UnicodeWidthStr as _;

use crate::display::{ASSISTANT_LABEL, DisplayState, Frame};

const FALLBACK_SIZE: (u16, u16) = (80, 24);

/// Receives frames from a [`crate::display::Presentation`].
///
/// Frames arrive in production order; `finish` is called at most once and
/// nothing follows it.
pub trait View {
    /// Echoes the question before any frame.
    fn show_question(&mut self, question: &str) -> io::Result<()>;

    /// Shows a live (waiting or streaming) frame, replacing the previous one.
    fn refresh(&mut self, frame: &Frame) -> io::Result<()>;

    /// Leaves the current live frame on screen; the next refresh starts below.
    fn release(&mut self) -> io::Result<()>;

    /// Erases the live frame so other output can take its place.
    fn clear(&mut self) -> io::Result<()>;

    /// Called periodically while streaming; lets buffered frames catch up.
    fn tick(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Replaces the live frame with the final one.
    fn finish(&mut self, frame: &Frame) -> io::Result<()>;
}

impl<T: View + ?Sized> View for Box<T> {
    fn show_question(&mut self, question: &str) -> io::Result<()> {
        (**self).show_question(question)
    }

    fn refresh(&mut self, frame: &Frame) -> io::Result<()> {
        (**self).refresh(frame)
    }

    fn release(&mut self) -> io::Result<()> {
        (**self).release()
    }

    fn clear(&mut self) -> io::Result<()> {
        (**self).clear()
    }

    fn tick(&mut self) -> io::Result<()> {
        (**self).tick()
    }

    fn finish(&mut self, frame: &Frame) -> io::Result<()> {
        (**self).finish(frame)
    }
}

impl<T: View + ?Sized> View for &mut T {
    fn show_question(&mut self, question: &str) -> io::Result<()> {
        (**self).show_question(question)
    }

    fn refresh(&mut self, frame: &Frame) -> io::Result<()> {
        (**self).refresh(frame)
    }

    fn release(&mut self) -> io::Result<()> {
        (**self).release()
    }

    fn clear(&mut self) -> io::Result<()> {
        (**self).clear()
    }

    fn tick(&mut self) -> io::Result<()> {
        (**self).tick()
    }

    fn finish(&mut self, frame: &Frame) -> io::Result<()> {
        (**self).finish(frame)
    }
}

/// Writes frames to a terminal-like writer.
///
/// In live mode each refresh redraws the frame in place with cursor movement;
/// otherwise only the question and the final frame are written.
pub struct TerminalView<W: Write> {
    out: W,
    live: bool,
    styled: bool,
    drawn_rows: u16,
    cursor_hidden: bool,
}

impl TerminalView<io::Stdout> {
    /// Live and styled when stdout is a terminal.
    pub fn stdout() -> Self {
        let stdout = io::stdout();
        let tty = stdout.is_terminal();
        Self::new(stdout, tty, tty)
    }
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, live: bool, styled: bool) -> Self {
        Self {
            out,
            live,
            styled,
            drawn_rows: 0,
            cursor_hidden: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn header(&self, state: DisplayState) -> String {
        format!("{} {ASSISTANT_LABEL}", state.indicator().paint(self.styled))
    }

    fn clear_live(&mut self) -> io::Result<()> {
        if self.drawn_rows == 0 {
            return Ok(());
        }
        if self.drawn_rows > 1 {
            queue!(self.out, cursor::MoveUp(self.drawn_rows - 1))?;
        }
        queue!(
            self.out,
            cursor::MoveToColumn(0),
            terminal::Clear(terminal::ClearType::FromCursorDown)
        )?;
        self.drawn_rows = 0;
        Ok(())
    }

    fn show_cursor(&mut self) -> io::Result<()> {
        if self.cursor_hidden {
            queue!(self.out, cursor::Show)?;
            self.cursor_hidden = false;
        }
        Ok(())
    }
}

impl<W: Write> View for TerminalView<W> {
    fn show_question(&mut self, question: &str) -> io::Result<()> {
        let line = format!("User: {question}");
        if self.styled {
            writeln!(self.out, "{}", line.bold())?;
        } else {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()
    }

    fn refresh(&mut self, frame: &Frame) -> io::Result<()> {
        if !self.live {
            return Ok(());
        }
        let (cols, rows) = terminal::size().unwrap_or(FALLBACK_SIZE);
        let glyph_width = frame.state.indicator().glyph.width();
        let (visible, drawn) = fit_to_screen(
            frame.body.text(),
            glyph_width + 1 + ASSISTANT_LABEL.len() + 1,
            cols,
            rows.saturating_sub(1).max(1),
        );

        if !self.cursor_hidden {
            queue!(self.out, cursor::Hide)?;
            self.cursor_hidden = true;
        }
        self.clear_live()?;
        let header = self.header(frame.state);
        queue!(self.out, Print(header), Print(" "), Print(visible))?;
        self.drawn_rows = drawn;
        self.out.flush()
    }

    fn release(&mut self) -> io::Result<()> {
        if self.drawn_rows > 0 {
            writeln!(self.out)?;
            self.drawn_rows = 0;
        }
        self.show_cursor()?;
        self.out.flush()
    }

    fn clear(&mut self) -> io::Result<()> {
        self.clear_live()?;
        self.out.flush()
    }

    fn finish(&mut self, frame: &Frame) -> io::Result<()> {
        self.clear_live()?;
        self.show_cursor()?;
        let header = self.header(frame.state);
        writeln!(self.out, "{header}")?;
        let body = frame.body.text().trim_end_matches('\n');
        if !body.is_empty() {
            writeln!(self.out, "{body}")?;
        }
        self.out.flush()
    }
}

impl<W: Write> Drop for TerminalView<W> {
    fn drop(&mut self) {
        if self.drawn_rows > 0 {
            let _ = writeln!(self.out);
        }
        if self.cursor_hidden {
            let _ = queue!(self.out, cursor::Show);
        }
        let _ = self.out.flush();
    }
}

/// Cuts `text` to what fits in `max_rows` terminal rows after a header of
/// `lead` columns, returning the text to print and the rows it occupies.
fn fit_to_screen(text: &str, lead: usize, cols: u16, max_rows: u16) -> (String, u16) {
    let cols = usize::from(cols.max(1));
    let max_rows = max_rows.max(1);
    let rows_for = |width: usize| -> u16 {
        u16::try_from(width.max(1).div_ceil(cols)).unwrap_or(u16::MAX)
    };

    let mut kept: Vec<String> = Vec::new();
    let mut used: u16 = 0;
    for (idx, line) in text.split('\n').enumerate() {
        let width = if idx == 0 { lead + line.width() } else { line.width() };
        let rows = rows_for(width);
        if idx == 0 && rows > max_rows {
            // One paragraph taller than the screen: keep what fits on the
            // available rows, ellipsis included.
            let budget = (usize::from(max_rows) * cols).saturating_sub(lead + 1);
            let cut = truncate_to_width(line, budget);
            let rows = rows_for(lead + cut.width() + 1);
            return (format!("{cut}…"), rows);
        }
        if idx > 0 && used.saturating_add(rows) >= max_rows {
            kept.push("…".to_string());
            used = used.saturating_add(1);
            return (kept.join("\n"), used);
        }
        kept.push(line.to_string());
        used = used.saturating_add(rows);
    }
    (kept.join("\n"), used)
}

/// Longest prefix of `text` no wider than `max_width` columns.
fn truncate_to_width(text: &str, max_width: usize) -> &str {
    let mut width = 0;
    for (idx, ch) in text.char_indices() {
        width += unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width > max_width {
            return &text[..idx];
        }
    }
    text
}

/// Coalesces refreshes to at most one per `interval`.
///
/// State changes always pass through. A coalesced frame is flushed before a
/// release and before the final frame, so the last update is never lost.
pub struct Throttle<V> {
    inner: V,
    interval: Duration,
    last_emit: Option<Instant>,
    last_state: Option<DisplayState>,
    pending: Option<Frame>,
}

impl<V: View> Throttle<V> {
    pub fn new(inner: V, interval: Duration) -> Self {
        Self {
            inner,
            interval,
            last_emit: None,
            last_state: None,
            pending: None,
        }
    }

    pub fn into_inner(self) -> V {
        self.inner
    }

    fn emit(&mut self, frame: &Frame) -> io::Result<()> {
        self.pending = None;
        self.last_emit = Some(Instant::now());
        self.last_state = Some(frame.state);
        self.inner.refresh(frame)
    }

    fn flush_pending(&mut self) -> io::Result<()> {
        match self.pending.take() {
            Some(frame) => self.emit(&frame),
            None => Ok(()),
        }
    }

    fn due(&self) -> bool {
        match self.last_emit {
            None => true,
            Some(at) => at.elapsed() >= self.interval,
        }
    }
}

impl<V: View> View for Throttle<V> {
    fn show_question(&mut self, question: &str) -> io::Result<()> {
        self.inner.show_question(question)
    }

    fn refresh(&mut self, frame: &Frame) -> io::Result<()> {
        if self.due() || self.last_state != Some(frame.state) {
            self.emit(frame)
        } else {
            self.pending = Some(frame.clone());
            Ok(())
        }
    }

    fn release(&mut self) -> io::Result<()> {
        self.flush_pending()?;
        self.inner.release()
    }

    fn clear(&mut self) -> io::Result<()> {
        self.pending = None;
        self.last_emit = None;
        self.inner.clear()
    }

    fn tick(&mut self) -> io::Result<()> {
        if self.pending.is_some() && self.due() {
            self.flush_pending()?;
        }
        self.inner.tick()
    }

    fn finish(&mut self, frame: &Frame) -> io::Result<()> {
        self.flush_pending()?;
        self.inner.finish(frame)
    }
}
