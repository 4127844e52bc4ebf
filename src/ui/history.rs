//! Conversation history display component

use std::ops::Range;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget},
};

use crate::conversation::Role;
use crate::projection::{wrap_lines, VisualTurn};

const STREAMING_CURSOR: &str = "▋";

/// Bottom-anchored scroll position over the rendered history.
#[derive(Debug, Default)]
pub struct HistoryView {
    /// Lines scrolled up from the bottom.
    offset: usize,
}

impl HistoryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.offset = self.offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.offset = self.offset.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.offset = 0;
    }

    /// Render `turns`, clamping the stored offset to the content.
    pub fn render(&mut self, turns: &[VisualTurn], area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title("Conversation");
        let inner = block.inner(area);
        block.render(area, buf);

        if turns.is_empty() {
            for (i, line) in welcome_lines().iter().enumerate() {
                if i < inner.height as usize {
                    buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
                }
            }
            return;
        }

        let lines = history_lines(turns, inner.width.saturating_sub(1) as usize);
        let height = inner.height as usize;
        self.offset = self.offset.min(lines.len().saturating_sub(height));
        let range = visible_range(lines.len(), height, self.offset);

        for (i, line) in lines[range.clone()].iter().enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }

        if lines.len() > height {
            let mut state = ScrollbarState::new(lines.len().saturating_sub(height)).position(range.start);
            Scrollbar::default()
                .orientation(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .render(inner, buf, &mut state);
        }
    }
}

fn welcome_lines() -> Vec<Line<'static>> {
    vec![
        Line::from(Span::styled("Welcome to parley", Style::default().fg(Color::Green))),
        Line::default(),
        Line::from(Span::styled(
            "Enter your API key above, then type a message below.",
            Style::default().fg(Color::Gray),
        )),
        Line::default(),
        Line::from(Span::styled(
            "Enter sends, Tab switches fields, /help lists commands.",
            Style::default().fg(Color::DarkGray),
        )),
    ]
}

/// Rows `[start, end)` to show so the last row sits at the bottom, moved up
/// by `offset`.
pub fn visible_range(total: usize, height: usize, offset: usize) -> Range<usize> {
    let end = total.saturating_sub(offset.min(total.saturating_sub(height)));
    let start = end.saturating_sub(height);
    start..end
}

/// Every turn as a header line, its wrapped body, and a spacer.
pub fn history_lines(turns: &[VisualTurn], width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for turn in turns {
        lines.push(header(turn));

        let mut body = wrap_lines(&turn.lines, width.saturating_sub(2));
        if turn.streaming {
            match body.last_mut() {
                Some(last) => last
                    .spans
                    .push(Span::styled(STREAMING_CURSOR, Style::default().fg(Color::Yellow))),
                None => body.push(Line::from(Span::styled(
                    STREAMING_CURSOR,
                    Style::default().fg(Color::Yellow),
                ))),
            }
        }

        let color = content_color(turn.role);
        for mut line in body {
            for span in &mut line.spans {
                if span.style.fg.is_none() {
                    span.style = span.style.fg(color);
                }
            }
            line.spans.insert(0, Span::raw("  "));
            lines.push(line);
        }
        lines.push(Line::default());
    }
    lines
}

fn header(turn: &VisualTurn) -> Line<'static> {
    let name = match turn.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    Line::from(vec![
        Span::styled(name, Style::default().fg(content_color(turn.role))),
        Span::styled(
            format!(" {} ", turn.created_at.format("%H:%M:%S")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled("─".repeat(20), Style::default().fg(Color::DarkGray)),
    ])
}

fn content_color(role: Role) -> Color {
    match role {
        Role::User => Color::Blue,
        Role::Assistant => Color::Green,
    }
}
