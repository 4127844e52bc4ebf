//! Conversation to styled terminal lines.
//!
//! Assistant turns are read as markdown; user turns are shown as typed.
//! Nothing here mutates the conversation.

use std::mem;

use chrono::{DateTime, Utc};
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::conversation::{Conversation, Role};

/// One turn ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualTurn {
    pub role: Role,
    pub lines: Vec<Line<'static>>,
    /// Still receiving chunks.
    pub streaming: bool,
    pub created_at: DateTime<Utc>,
}

/// Map every turn, in order, to its visual form.
pub fn project(conversation: &Conversation, open_turn: Option<usize>) -> Vec<VisualTurn> {
    conversation
        .turns()
        .iter()
        .enumerate()
        .map(|(index, turn)| VisualTurn {
            role: turn.role(),
            lines: match turn.role() {
                Role::User => plain_lines(turn.content()),
                Role::Assistant => render_markdown(turn.content()),
            },
            streaming: open_turn == Some(index),
            created_at: turn.created_at(),
        })
        .collect()
}

fn plain_lines(text: &str) -> Vec<Line<'static>> {
    text.lines().map(|line| Line::raw(line.to_string())).collect()
}

fn code_style() -> Style {
    Style::default().fg(Color::Yellow)
}

/// Render markdown into styled lines.
pub fn render_markdown(text: &str) -> Vec<Line<'static>> {
    let mut renderer = MarkdownRenderer::default();
    for event in Parser::new(text) {
        renderer.handle(event);
    }
    renderer.finish()
}

#[derive(Default)]
struct MarkdownRenderer {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    /// Next number for ordered lists, `None` for bullets.
    lists: Vec<Option<u64>>,
    link: Option<PendingLink>,
    in_code_block: bool,
}

struct PendingLink {
    target: String,
    text: String,
}

impl MarkdownRenderer {
    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) if self.in_code_block => self.code_text(&text),
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                if let Some(link) = self.link.as_mut() {
                    link.text.push_str(&text);
                }
                self.push_span(text.into_string(), self.style());
            }
            Event::Code(code) => {
                if let Some(link) = self.link.as_mut() {
                    link.text.push_str(&code);
                }
                self.push_span(code.into_string(), self.style().patch(code_style()));
            }
            Event::SoftBreak | Event::HardBreak => {
                self.push_line();
                let indent = self.continuation_indent();
                if !indent.is_empty() {
                    self.current.push(Span::raw(indent));
                }
            }
            Event::Rule => {
                self.flush();
                self.lines
                    .push(Line::styled("─".repeat(24), Style::default().fg(Color::DarkGray)));
                self.blank();
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { .. } => {
                self.flush();
                self.push_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD));
            }
            Tag::CodeBlock(_) => {
                self.flush();
                self.in_code_block = true;
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(number)) => {
                        let marker = format!("{}. ", number);
                        *number += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.current.push(Span::raw(format!("{}{}", "  ".repeat(depth), marker)));
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { dest_url, .. } => {
                self.link = Some(PendingLink {
                    target: dest_url.into_string(),
                    text: String::new(),
                });
                self.push_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Heading(_) => {
                self.styles.pop();
                self.flush();
                self.blank();
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.flush();
                self.blank();
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            TagEnd::Link => {
                self.styles.pop();
                if let Some(link) = self.link.take() {
                    if link.text != link.target {
                        self.push_span(format!(" ({})", link.target), Style::default().fg(Color::DarkGray));
                    }
                }
            }
            _ => {}
        }
    }

    fn code_text(&mut self, text: &str) {
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                self.push_line();
            }
            if !part.is_empty() {
                if self.current.is_empty() {
                    self.current.push(Span::raw("  "));
                }
                self.current.push(Span::styled(part.to_string(), code_style()));
            }
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, style: Style) {
        self.styles.push(self.style().patch(style));
    }

    fn push_span(&mut self, text: String, style: Style) {
        self.current.push(Span::styled(text, style));
    }

    fn continuation_indent(&self) -> String {
        "  ".repeat(self.lists.len())
    }

    /// End the current line, even when empty.
    fn push_line(&mut self) {
        self.lines.push(Line::from(mem::take(&mut self.current)));
    }

    /// End the current line if it has content.
    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.push_line();
        }
    }

    /// Separate blocks with a single empty line.
    fn blank(&mut self) {
        if matches!(self.lines.last(), Some(line) if line.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while matches!(self.lines.last(), Some(line) if line.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

/// Word-wrap `lines` to `width` columns, keeping span styles.
pub fn wrap_lines(lines: &[Line<'static>], width: usize) -> Vec<Line<'static>> {
    lines.iter().flat_map(|line| wrap_line(line, width)).collect()
}

fn text_width(text: &str) -> usize {
    Span::raw(text).width()
}

fn wrap_line(line: &Line<'static>, width: usize) -> Vec<Line<'static>> {
    if width == 0 || line.width() <= width {
        return vec![line.clone()];
    }

    let mut wrapper = LineWrapper {
        width,
        out: Vec::new(),
        current: Vec::new(),
        used: 0,
    };
    for span in &line.spans {
        for token in tokens(&span.content) {
            wrapper.push(token, span.style);
        }
    }
    wrapper.finish()
}

/// Split into alternating runs of whitespace and non-whitespace.
fn tokens(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev_space: Option<bool> = None;
    for (i, ch) in text.char_indices() {
        let space = ch.is_whitespace();
        if prev_space.is_some_and(|p| p != space) {
            out.push(&text[start..i]);
            start = i;
        }
        prev_space = Some(space);
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

struct LineWrapper {
    width: usize,
    out: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    used: usize,
}

impl LineWrapper {
    fn push(&mut self, token: &str, style: Style) {
        let token_width = text_width(token);

        if token.chars().all(char::is_whitespace) {
            if self.used == 0 && !self.out.is_empty() {
                return;
            }
            if self.used + token_width > self.width {
                self.break_line();
                return;
            }
            self.append(token, style, token_width);
            return;
        }

        if self.used > 0 && self.used + token_width > self.width {
            self.break_line();
        }
        if token_width <= self.width {
            self.append(token, style, token_width);
            return;
        }

        let mut buf = [0u8; 4];
        for ch in token.chars() {
            let piece = ch.encode_utf8(&mut buf);
            let piece_width = text_width(piece);
            if self.used > 0 && self.used + piece_width > self.width {
                self.break_line();
            }
            self.append(piece, style, piece_width);
        }
    }

    fn append(&mut self, text: &str, style: Style, width: usize) {
        match self.current.last_mut() {
            Some(last) if last.style == style => last.content.to_mut().push_str(text),
            _ => self.current.push(Span::styled(text.to_string(), style)),
        }
        self.used += width;
    }

    fn break_line(&mut self) {
        self.out.push(Line::from(mem::take(&mut self.current)));
        self.used = 0;
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        if !self.current.is_empty() || self.out.is_empty() {
            self.break_line();
        }
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    fn texts(lines: &[Line<'_>]) -> Vec<String> {
        lines.iter().map(line_text).collect()
    }

    #[test]
    fn paragraph_with_strong_text() {
        let lines = render_markdown("Hello **world**");
        assert_eq!(texts(&lines), vec!["Hello world"]);
        let bold = &lines[0].spans[1];
        assert_eq!(bold.content, "world");
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn soft_and_hard_breaks_start_new_lines() {
        assert_eq!(texts(&render_markdown("a\nb")), vec!["a", "b"]);
        assert_eq!(texts(&render_markdown("a  \nb")), vec!["a", "b"]);
    }

    #[test]
    fn paragraphs_are_separated_by_one_blank_line() {
        assert_eq!(texts(&render_markdown("a\n\n\n\nb")), vec!["a", "", "b"]);
    }

    #[test]
    fn bullet_and_numbered_lists() {
        assert_eq!(texts(&render_markdown("- one\n- two")), vec!["• one", "• two"]);
        assert_eq!(texts(&render_markdown("3. x\n4. y")), vec!["3. x", "4. y"]);
    }

    #[test]
    fn nested_list_is_indented() {
        assert_eq!(texts(&render_markdown("- a\n  - b\n- c")), vec!["• a", "  • b", "• c"]);
    }

    #[test]
    fn paragraph_before_list() {
        assert_eq!(texts(&render_markdown("intro\n\n- item")), vec!["intro", "", "• item"]);
    }

    #[test]
    fn links_show_their_target() {
        assert_eq!(texts(&render_markdown("[site](https://x.io)")), vec!["site (https://x.io)"]);
        assert_eq!(texts(&render_markdown("<https://x.io>")), vec!["https://x.io"]);
    }

    #[test]
    fn code_block_lines_are_indented() {
        let lines = render_markdown("```\nfn a() {}\n\nfn b() {}\n```\nafter");
        assert_eq!(texts(&lines), vec!["  fn a() {}", "", "  fn b() {}", "", "after"]);
    }

    #[test]
    fn inline_code_is_styled() {
        let lines = render_markdown("run `cargo`");
        assert_eq!(lines[0].spans[1].style.fg, Some(Color::Yellow));
    }

    #[test]
    fn heading_is_its_own_block() {
        let lines = render_markdown("# Title\nbody");
        assert_eq!(texts(&lines), vec!["Title", "", "body"]);
        assert!(lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn empty_content_renders_no_lines() {
        assert!(render_markdown("").is_empty());
    }

    #[test]
    fn projection_is_one_to_one_and_marks_open_turn() {
        let mut conversation = Conversation::new();
        conversation.push(Role::User, "**not bold**");
        conversation.push(Role::Assistant, "*partial*");

        let turns = project(&conversation, Some(1));
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(texts(&turns[0].lines), vec!["**not bold**"]);
        assert!(!turns[0].streaming);
        assert_eq!(texts(&turns[1].lines), vec!["partial"]);
        assert!(turns[1].streaming);
    }

    #[test]
    fn wrap_breaks_at_word_boundaries() {
        let wrapped = wrap_lines(&[Line::raw("hello world foo")], 11);
        assert_eq!(texts(&wrapped), vec!["hello world", "foo"]);
    }

    #[test]
    fn wrap_keeps_styles() {
        let line = Line::from(vec![
            Span::raw("plain "),
            Span::styled("bold words here", Style::default().add_modifier(Modifier::BOLD)),
        ]);
        let wrapped = wrap_lines(&[line], 10);
        assert_eq!(texts(&wrapped), vec!["plain bold", "words here"]);
        assert!(wrapped[1].spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn wrap_splits_overlong_words() {
        let wrapped = wrap_lines(&[Line::raw("abcdefgh")], 3);
        assert_eq!(texts(&wrapped), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn short_lines_are_untouched() {
        let wrapped = wrap_lines(&[Line::raw("hi"), Line::default()], 10);
        assert_eq!(texts(&wrapped), vec!["hi", ""]);
    }
}
