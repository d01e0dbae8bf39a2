use std::fmt::Display;
use std::io::{self, IsTerminal as _, Write};

use crossterm::style::Stylize as _;

/// Diagnostic channel: warnings and errors, separate from the answer.
///
/// Write failures are ignored; there is nowhere left to report them.
pub struct Diagnostics<W: Write> {
    out: W,
    styled: bool,
    warnings: usize,
}

impl Diagnostics<io::Stderr> {
    /// Stderr, styled when it is a terminal.
    pub fn stderr() -> Self {
        let stderr = io::stderr();
        let styled = stderr.is_terminal();
        Self::new(stderr, styled)
    }
}

impl<W: Write> Diagnostics<W> {
    pub fn new(out: W, styled: bool) -> Self {
        Self {
            out,
            styled,
            warnings: 0,
        }
    }

    /// Reports a recoverable problem (yellow).
    pub fn warn(&mut self, message: impl Display) {
        self.warnings += 1;
        let text = message.to_string();
        let _ = if self.styled {
            writeln!(self.out, "{}", text.yellow())
        } else {
            writeln!(self.out, "{text}")
        };
        let _ = self.out.flush();
    }

    /// Reports a failure that ends the invocation (red, bold).
    pub fn error(&mut self, message: impl Display) {
        let text = message.to_string();
        let _ = if self.styled {
            writeln!(self.out, "{}", text.red().bold())
        } else {
            writeln!(self.out, "{text}")
        };
        let _ = self.out.flush();
    }

    /// Number of warnings reported so far.
    pub fn warnings(&self) -> usize {
        self.warnings
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
