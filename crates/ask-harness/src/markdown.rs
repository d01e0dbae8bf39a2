//! Markdown to terminal text.
//!
//! The final answer is formatted once, after streaming ends. Partial markup is
//! never rendered.

use crossterm::style::{Attribute, Color, ContentStyle, Stylize as _};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::errors::RenderError;

/// Formats a complete markdown document for the terminal.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> Result<String, RenderError>;
}

/// Renderer built on pulldown-cmark with crossterm styles.
#[derive(Debug, Clone, Copy)]
pub struct AnsiMarkdownRenderer {
    styled: bool,
}

impl AnsiMarkdownRenderer {
    /// Layout plus ANSI styling.
    pub fn styled() -> Self {
        Self { styled: true }
    }

    /// Same layout without escape codes.
    pub fn plain() -> Self {
        Self { styled: false }
    }

    pub fn new(styled: bool) -> Self {
        Self { styled }
    }
}

impl MarkdownRenderer for AnsiMarkdownRenderer {
    fn render(&self, markdown: &str) -> Result<String, RenderError> {
        let options =
            Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES | Options::ENABLE_TASKLISTS;
        let mut state = RenderState::new(self.styled);
        for event in Parser::new_ext(markdown, options) {
            state.handle(event)?;
        }
        state.finish()
    }
}

const RULE_WIDTH: usize = 40;
const CODE_INDENT: &str = "    ";

struct ListContext {
    next_number: Option<u64>,
}

struct RenderState {
    styled: bool,
    out: String,
    styles: Vec<ContentStyle>,
    lists: Vec<ListContext>,
    quote_depth: usize,
    code: Option<String>,
    link_urls: Vec<String>,
    link_text: String,
    table_row: Option<Vec<String>>,
    in_table_head: bool,
}

impl RenderState {
    fn new(styled: bool) -> Self {
        Self {
            styled,
            out: String::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            quote_depth: 0,
            code: None,
            link_urls: Vec::new(),
            link_text: String::new(),
            table_row: None,
            in_table_head: false,
        }
    }

    fn handle(&mut self, event: Event<'_>) -> Result<(), RenderError> {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => return self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                if let Some(cell) = self.table_row.as_mut().and_then(|row| row.last_mut()) {
                    cell.push_str(&code);
                } else {
                    if !self.link_urls.is_empty() {
                        self.link_text.push_str(&code);
                    }
                    let style = ContentStyle::new().with(Color::Cyan);
                    self.push_styled(&code, style);
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => self.text(&html),
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.end_line(),
            Event::Rule => {
                self.block_gap();
                let rule = "─".repeat(RULE_WIDTH);
                self.push_styled(&rule, ContentStyle::new().with(Color::DarkGrey));
                self.end_line();
            }
            Event::TaskListMarker(done) => self.text(if done { "[x] " } else { "[ ] " }),
            Event::FootnoteReference(name) => self.text(&format!("[^{name}]")),
            _ => {}
        }
        Ok(())
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if !self.in_fresh_item() {
                    self.block_gap();
                }
            }
            Tag::Heading { level, .. } => {
                self.block_gap();
                self.styles.push(heading_style(level));
            }
            Tag::BlockQuote(_) => {
                self.block_gap();
                self.quote_depth += 1;
                self.styles.push(ContentStyle::new().italic());
            }
            Tag::CodeBlock(kind) => {
                self.block_gap();
                if let CodeBlockKind::Fenced(lang) = kind
                    && !lang.is_empty()
                {
                    let label = format!("{CODE_INDENT}{lang}");
                    self.push_styled(&label, ContentStyle::new().with(Color::DarkGrey));
                    self.end_line();
                }
                self.code = Some(String::new());
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.block_gap();
                } else {
                    self.end_line();
                }
                self.lists.push(ListContext { next_number: start });
            }
            Tag::Item => {
                self.end_line();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(ListContext {
                        next_number: Some(n),
                    }) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                let prefix = format!("{}{}", self.quote_prefix(), "  ".repeat(depth));
                self.out.push_str(&prefix);
                self.push_raw(&marker, ContentStyle::new().with(Color::Yellow));
            }
            Tag::Emphasis => self.styles.push(ContentStyle::new().italic()),
            Tag::Strong => self.styles.push(ContentStyle::new().bold()),
            Tag::Strikethrough => self.styles.push(ContentStyle::new().crossed_out()),
            Tag::Link { dest_url, .. } => {
                self.link_urls.push(dest_url.to_string());
                self.link_text.clear();
                self.styles
                    .push(ContentStyle::new().with(Color::Blue).underlined());
            }
            Tag::Image { dest_url, .. } => {
                self.link_urls.push(dest_url.to_string());
                self.link_text.clear();
                self.styles.push(ContentStyle::new().with(Color::Blue));
            }
            Tag::Table(_) => self.block_gap(),
            Tag::TableHead => {
                self.in_table_head = true;
                self.table_row = Some(Vec::new());
            }
            Tag::TableRow if !self.in_table_head => self.table_row = Some(Vec::new()),
            Tag::TableCell => {
                if let Some(row) = self.table_row.as_mut() {
                    row.push(String::new());
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) -> Result<(), RenderError> {
        match tag {
            TagEnd::Paragraph => self.end_line(),
            TagEnd::Heading(_) => {
                self.pop_style()?;
                self.end_line();
            }
            TagEnd::BlockQuote(_) => {
                self.pop_style()?;
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.end_line();
            }
            TagEnd::CodeBlock => {
                let code = self
                    .code
                    .take()
                    .ok_or_else(|| RenderError("code block closed twice".into()))?;
                let style = ContentStyle::new().with(Color::Green);
                for line in code.trim_end_matches('\n').split('\n') {
                    let prefix = self.quote_prefix();
                    self.out.push_str(&prefix);
                    self.out.push_str(CODE_INDENT);
                    self.push_raw(line, style);
                    self.out.push('\n');
                }
            }
            TagEnd::List(_) => {
                self.lists
                    .pop()
                    .ok_or_else(|| RenderError("list closed without opening".into()))?;
                self.end_line();
            }
            TagEnd::Item => self.end_line(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.pop_style()?,
            TagEnd::Link | TagEnd::Image => {
                self.pop_style()?;
                let url = self
                    .link_urls
                    .pop()
                    .ok_or_else(|| RenderError("link closed without opening".into()))?;
                if !url.is_empty() && url != self.link_text {
                    let suffix = format!(" ({url})");
                    self.push_styled(&suffix, ContentStyle::new().with(Color::DarkGrey));
                }
            }
            TagEnd::TableHead => {
                self.flush_table_row(true);
                self.in_table_head = false;
            }
            TagEnd::TableRow if !self.in_table_head => self.flush_table_row(false),
            TagEnd::Table => self.end_line(),
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<String, RenderError> {
        if !self.styles.is_empty() || self.code.is_some() || !self.lists.is_empty() {
            return Err(RenderError("unterminated markdown block".into()));
        }
        Ok(self.out.trim_end_matches('\n').to_string())
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = self.code.as_mut() {
            code.push_str(text);
            return;
        }
        if let Some(cell) = self.table_row.as_mut().and_then(|row| row.last_mut()) {
            cell.push_str(text);
            return;
        }
        if !self.link_urls.is_empty() {
            self.link_text.push_str(text);
        }
        let style = self.current_style();
        self.push_styled(text, style);
    }

    fn push_styled(&mut self, text: &str, style: ContentStyle) {
        if self.at_line_start() && (self.quote_depth > 0 || !self.lists.is_empty()) {
            let prefix = format!(
                "{}{}",
                self.quote_prefix(),
                "  ".repeat(self.lists.len())
            );
            self.out.push_str(&prefix);
        }
        self.push_raw(text, style);
    }

    fn push_raw(&mut self, text: &str, style: ContentStyle) {
        if self.styled && style != ContentStyle::new() {
            self.out.push_str(&style.apply(text).to_string());
        } else {
            self.out.push_str(text);
        }
    }

    fn flush_table_row(&mut self, header: bool) {
        let Some(cells) = self.table_row.take() else {
            return;
        };
        let line = cells.join(" │ ");
        let style = if header {
            ContentStyle::new().bold()
        } else {
            ContentStyle::new()
        };
        self.end_line();
        self.push_styled(&line, style);
        self.end_line();
        if header {
            let width = unicode_width::UnicodeWidthStr::width(line.as_str());
            let rule = "─".repeat(width);
            self.push_styled(&rule, ContentStyle::new().with(Color::DarkGrey));
            self.end_line();
        }
    }

    fn current_style(&self) -> ContentStyle {
        let mut merged = ContentStyle::new();
        for style in &self.styles {
            if style.foreground_color.is_some() {
                merged.foreground_color = style.foreground_color;
            }
            merged.attributes.extend(style.attributes);
        }
        merged
    }

    fn pop_style(&mut self) -> Result<(), RenderError> {
        self.styles
            .pop()
            .map(|_| ())
            .ok_or_else(|| RenderError("style closed without opening".into()))
    }

    fn quote_prefix(&self) -> String {
        "▌ ".repeat(self.quote_depth)
    }

    fn in_fresh_item(&self) -> bool {
        !self.lists.is_empty() && !self.at_line_start()
    }

    fn at_line_start(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    fn end_line(&mut self) {
        if !self.at_line_start() {
            self.out.push('\n');
        }
    }

    /// Ensures one blank line before a new block.
    fn block_gap(&mut self) {
        if self.out.is_empty() {
            return;
        }
        self.end_line();
        if !self.out.ends_with("\n\n") && self.lists.is_empty() {
            self.out.push('\n');
        }
    }
}

fn heading_style(level: HeadingLevel) -> ContentStyle {
    let base = ContentStyle::new().bold();
    match level {
        HeadingLevel::H1 => base.with(Color::Magenta).underlined(),
        HeadingLevel::H2 => base.with(Color::Magenta),
        _ => base.attribute(Attribute::Italic),
    }
}
