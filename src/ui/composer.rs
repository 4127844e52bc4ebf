use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

use crate::ui::commands::{command_entries, parse_slash_command, CommandEntry, ParsedCommand};

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    Submitted(String),
    Command(ParsedCommand),
    /// Enter was pressed on text while sending is disabled.
    Blocked,
    None,
}

/// Single-line text buffer with a cursor counted in characters.
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    content: String,
    cursor: usize,
}

impl TextAreaState {
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn set(&mut self, content: String) {
        self.cursor = content.chars().count();
        self.content = content;
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }

    fn byte_offset(&self, chars: usize) -> usize {
        self.content
            .char_indices()
            .nth(chars)
            .map(|(offset, _)| offset)
            .unwrap_or(self.content.len())
    }

    fn len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn insert(&mut self, c: char) {
        let offset = self.byte_offset(self.cursor);
        self.content.insert(offset, c);
        self.cursor += 1;
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let offset = self.byte_offset(self.cursor);
        self.content.remove(offset);
        true
    }

    /// Delete the character at the cursor.
    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.len() {
            return false;
        }
        let offset = self.byte_offset(self.cursor);
        self.content.remove(offset);
        true
    }

    /// Apply an editing or cursor key. Returns whether the content changed.
    pub fn edit(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert(c);
                true
            }
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                false
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.len());
                false
            }
            KeyCode::Home => {
                self.cursor = 0;
                false
            }
            KeyCode::End => {
                self.cursor = self.len();
                false
            }
            _ => false,
        }
    }

    /// Content with a cursor glyph, optionally masked.
    fn display(&self, masked: bool, show_cursor: bool) -> String {
        let mut text: String = if masked {
            "•".repeat(self.len())
        } else {
            self.content.clone()
        };
        if show_cursor {
            let offset = text
                .char_indices()
                .nth(self.cursor)
                .map(|(offset, _)| offset)
                .unwrap_or(text.len());
            text.insert(offset, '▌');
        }
        text
    }
}

/// Message composer with a slash-command palette.
pub struct Composer {
    state: TextAreaState,
    placeholder: String,
    has_focus: bool,
    enabled: bool,
    command_entries: Vec<CommandEntry>,
    filtered_commands: Vec<CommandEntry>,
    show_command_palette: bool,
    selected_command: Option<usize>,
}

impl Composer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            state: TextAreaState::default(),
            placeholder: placeholder.into(),
            has_focus: false,
            enabled: true,
            command_entries: command_entries(),
            filtered_commands: Vec::new(),
            show_command_palette: false,
            selected_command: None,
        }
    }

    /// Handle key input.
    ///
    /// Plain text is only submitted while enabled; commands always go through.
    /// A submitted message stays in the buffer until the caller clears it.
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if self.show_command_palette && self.apply_selected_command() {
                    return ComposerResult::None;
                }
                let content = self.state.content().trim().to_string();
                if content.is_empty() {
                    return ComposerResult::None;
                }
                if let Some(command) = parse_slash_command(&content) {
                    self.clear();
                    return ComposerResult::Command(command);
                }
                return if self.enabled {
                    ComposerResult::Submitted(content)
                } else {
                    ComposerResult::Blocked
                };
            }
            KeyCode::Up if self.show_command_palette => self.move_command_selection(-1),
            KeyCode::Down if self.show_command_palette => self.move_command_selection(1),
            KeyCode::Esc if self.show_command_palette => self.close_command_palette(),
            KeyCode::Tab if self.show_command_palette => {
                self.apply_selected_command();
            }
            _ => {
                if self.state.edit(key) {
                    self.sync_command_palette();
                }
            }
        }

        ComposerResult::None
    }

    pub fn is_palette_open(&self) -> bool {
        self.show_command_palette
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn content(&self) -> &str {
        self.state.content()
    }

    pub fn clear(&mut self) {
        self.state.clear();
        self.close_command_palette();
    }

    fn sync_command_palette(&mut self) {
        let content = self.state.content();
        if content.starts_with('/') && !content.contains(char::is_whitespace) {
            if !self.show_command_palette {
                self.show_command_palette = true;
                self.selected_command = Some(0);
            }
            self.refresh_command_palette();
        } else {
            self.close_command_palette();
        }
    }

    fn close_command_palette(&mut self) {
        self.show_command_palette = false;
        self.filtered_commands.clear();
        self.selected_command = None;
    }

    fn refresh_command_palette(&mut self) {
        let query = self.state.content().trim_start_matches('/').to_lowercase();
        self.filtered_commands = self
            .command_entries
            .iter()
            .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
            .copied()
            .collect();

        self.selected_command = if self.filtered_commands.is_empty() {
            None
        } else {
            let index = self.selected_command.unwrap_or(0);
            Some(index.min(self.filtered_commands.len() - 1))
        };
    }

    fn move_command_selection(&mut self, delta: isize) {
        if self.filtered_commands.is_empty() {
            self.selected_command = None;
            return;
        }

        let len = self.filtered_commands.len() as isize;
        let current = self.selected_command.unwrap_or(0) as isize;
        self.selected_command = Some((current + delta).rem_euclid(len) as usize);
    }

    fn apply_selected_command(&mut self) -> bool {
        let Some(entry) = self
            .selected_command
            .and_then(|index| self.filtered_commands.get(index))
            .copied()
        else {
            return false;
        };

        self.state.set(format!("/{} ", entry.keyword));
        self.close_command_palette();
        true
    }

    fn title(&self) -> &'static str {
        if self.enabled {
            "Message"
        } else {
            "Message (waiting)"
        }
    }
}

impl Widget for &Composer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title())
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });

        let inner_area = block.inner(area);
        block.render(area, buf);

        let line = if self.state.is_empty() && !self.has_focus {
            Line::from(Span::styled(self.placeholder.as_str(), Style::default().fg(Color::DarkGray)))
        } else {
            Line::raw(self.state.display(false, self.has_focus))
        };
        buf.set_line(inner_area.x, inner_area.y, &line, inner_area.width);

        if self.show_command_palette && !self.filtered_commands.is_empty() {
            let palette_height = (self.filtered_commands.len().min(5) + 2) as u16;
            let palette_area = Rect {
                x: area.x,
                y: area.y.saturating_sub(palette_height),
                width: area.width,
                height: palette_height.min(area.y),
            };

            Clear.render(palette_area, buf);
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Commands")
                .style(Style::default().fg(Color::Blue));
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            for (index, entry) in self.filtered_commands.iter().enumerate() {
                if index >= inner.height as usize {
                    break;
                }

                let style = if self.selected_command == Some(index) {
                    Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled("  ", Style::default()),
                    Span::styled(entry.description, Style::default().fg(Color::Gray)),
                ]);
                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}

/// Masked single-line field for the API key.
#[derive(Default)]
pub struct CredentialField {
    state: TextAreaState,
    has_focus: bool,
}

impl CredentialField {
    /// Returns whether the value changed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        key.kind == KeyEventKind::Press && self.state.edit(key)
    }

    pub fn value(&self) -> &str {
        self.state.content()
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }
}

impl Widget for &CredentialField {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("API key")
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });
        let inner = block.inner(area);
        block.render(area, buf);

        let line = if self.state.is_empty() && !self.has_focus {
            Line::from(Span::styled(
                "Required before sending (Tab to focus)",
                Style::default().fg(Color::DarkGray),
            ))
        } else {
            Line::raw(self.state.display(true, self.has_focus))
        };
        buf.set_line(inner.x, inner.y, &line, inner.width);
    }
}
