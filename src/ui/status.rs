use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};

use crate::reducer::Phase;
use crate::session::{Health, Session};

/// One-off message for the status bar. A newer notice replaces an older one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Animated dots, advancing every 300ms.
fn dots(elapsed_ms: u128) -> &'static str {
    match (elapsed_ms / 300) % 4 {
        0 => ".",
        1 => "..",
        2 => "...",
        _ => "",
    }
}

/// The bottom status line.
pub fn status_line(session: &Session, notice: Option<&Notice>, elapsed_ms: u128) -> Line<'static> {
    let separator = || Span::styled("  │  ", Style::default().fg(Color::DarkGray));
    let mut spans = Vec::new();

    match session.state().phase() {
        Phase::Idle => spans.push(Span::styled("Ready", Style::default().fg(Color::Gray))),
        Phase::AwaitingFirstChunk => spans.push(Span::styled(
            format!("Sending{}", dots(elapsed_ms)),
            Style::default().fg(Color::Yellow),
        )),
        Phase::Streaming => spans.push(Span::styled(
            format!("Receiving{}  (Esc to cancel)", dots(elapsed_ms)),
            Style::default().fg(Color::Yellow),
        )),
    }

    spans.push(separator());
    if session.is_uploading() {
        spans.push(Span::styled("Uploading...", Style::default().fg(Color::Yellow)));
    } else {
        match session.attachment().document_ref() {
            Some(id) => spans.push(Span::styled(format!("doc: {}", id), Style::default().fg(Color::Cyan))),
            None => spans.push(Span::styled("no document", Style::default().fg(Color::DarkGray))),
        }
    }

    spans.push(separator());
    spans.push(match session.health() {
        Health::Up => Span::styled("backend up", Style::default().fg(Color::Green)),
        Health::Down => Span::styled("backend down", Style::default().fg(Color::Red)),
        Health::Unknown => Span::styled("backend ?", Style::default().fg(Color::DarkGray)),
    });

    if let Some(notice) = notice {
        let color = if notice.is_error { Color::Red } else { Color::Gray };
        spans.push(separator());
        spans.push(Span::styled(notice.text.clone(), Style::default().fg(color)));
    }

    Line::from(spans)
}
