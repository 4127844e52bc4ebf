use std::path::PathBuf;
use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use tracing::debug;

use crate::projection::project;
use crate::session::Session;
use crate::ui::commands::{get_help_text, ParsedCommand, SlashCommand};
use crate::ui::composer::{ComposerResult, Composer, CredentialField};
use crate::ui::history::HistoryView;
use crate::ui::status::{status_line, Notice};

const PAGE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Credential,
    Composer,
}

pub struct App {
    session: Session,
    credential: CredentialField,
    composer: Composer,
    history: HistoryView,
    focus: Focus,
    show_help: bool,
    notice: Option<Notice>,
    should_quit: bool,
    started: Instant,
}

impl App {
    pub fn new(session: Session) -> Self {
        let mut app = Self {
            session,
            credential: CredentialField::default(),
            composer: Composer::new("Type a message, or / for commands"),
            history: HistoryView::new(),
            focus: Focus::Credential,
            show_help: false,
            notice: None,
            should_quit: false,
            started: Instant::now(),
        };
        app.apply_focus();
        app.sync_composer();
        app
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|notice| notice.text.as_str())
    }

    /// Apply pending background events. Returns whether anything changed.
    pub fn tick(&mut self) -> bool {
        let changed = self.session.pump();
        if let Some(error) = self.session.take_upload_error() {
            self.notice = Some(Notice::error(error));
        }
        if self.session.take_scroll_request() {
            self.history.scroll_to_bottom();
        }
        self.sync_composer();
        changed
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Esc if self.show_help => self.show_help = false,
            KeyCode::Esc if self.session.state().is_loading() => {
                self.session.cancel();
                self.notice = Some(Notice::info("Cancelled"));
            }
            KeyCode::Tab if !self.composer.is_palette_open() => {
                self.focus = match self.focus {
                    Focus::Credential => Focus::Composer,
                    Focus::Composer => Focus::Credential,
                };
                self.apply_focus();
            }
            KeyCode::PageUp => self.history.scroll_up(PAGE),
            KeyCode::PageDown => self.history.scroll_down(PAGE),
            _ => match self.focus {
                Focus::Credential => {
                    if key.code == KeyCode::Enter {
                        self.focus = Focus::Composer;
                        self.apply_focus();
                    } else if self.credential.handle_key(key) {
                        self.session.settings_mut().set_credential(self.credential.value());
                    }
                }
                Focus::Composer => match self.composer.handle_key(key) {
                    ComposerResult::Submitted(text) => self.submit(&text),
                    ComposerResult::Command(command) => self.run_command(command),
                    ComposerResult::Blocked => self.explain_blocked(),
                    ComposerResult::None => {}
                },
            },
        }

        self.sync_composer();
    }

    fn submit(&mut self, text: &str) {
        if self.session.submit(text) {
            self.composer.clear();
            self.notice = None;
            self.history.scroll_to_bottom();
        }
    }

    fn explain_blocked(&mut self) {
        let text = if !self.session.settings().has_credential() {
            "Enter an API key first"
        } else {
            "Wait for the reply, or press Esc to cancel"
        };
        self.notice = Some(Notice::info(text));
    }

    fn run_command(&mut self, command: ParsedCommand) {
        debug!(command = command.command.command(), "slash command");
        match command.command {
            SlashCommand::Upload => {
                let Some(path) = command.argument() else {
                    self.notice = Some(Notice::info("Usage: /upload <path>"));
                    return;
                };
                let path = expand_home(path);
                self.notice = if self.session.start_upload(path.clone()) {
                    Some(Notice::info(format!("Uploading {}", path.display())))
                } else {
                    Some(Notice::info("Enter an API key before uploading"))
                };
            }
            SlashCommand::Model => {
                let model = &mut self.session.settings_mut().model;
                match (command.position(), command.argument()) {
                    (Some(position), _) => {
                        if !model.select_position(position) {
                            self.notice = Some(Notice::info(format!("No model at position {}", position)));
                            return;
                        }
                    }
                    (None, Some(name)) => model.select_name(name),
                    (None, None) => model.cycle(),
                }
                self.notice = Some(Notice::info(format!("Model: {}", model.current())));
            }
            SlashCommand::Prompt => {
                let prompt = &mut self.session.settings_mut().developer_prompt;
                match (command.position(), command.argument()) {
                    (Some(position), _) => {
                        if !prompt.select_position(position) {
                            self.notice = Some(Notice::info(format!("No prompt at position {}", position)));
                            return;
                        }
                    }
                    (None, Some(_)) => {
                        self.notice = Some(Notice::info("Usage: /prompt [n]"));
                        return;
                    }
                    (None, None) => prompt.cycle(),
                }
                self.notice = Some(Notice::info(format!("Prompt {}", prompt.selected_index() + 1)));
            }
            SlashCommand::Help => self.show_help = !self.show_help,
            SlashCommand::Quit => self.should_quit = true,
        }
    }

    fn apply_focus(&mut self) {
        self.credential.set_focus(self.focus == Focus::Credential);
        self.composer.set_focus(self.focus == Focus::Composer);
    }

    /// The composer only sends while idle and with a credential.
    fn sync_composer(&mut self) {
        let enabled = !self.session.state().is_loading() && self.session.settings().has_credential();
        self.composer.set_enabled(enabled);
    }

    pub fn draw(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // API key
                Constraint::Length(1), // Selectors
                Constraint::Min(5),    // History
                Constraint::Length(3), // Composer
                Constraint::Length(1), // Status
            ])
            .split(frame.size());

        frame.render_widget(&self.credential, chunks[0]);
        frame.render_widget(Paragraph::new(self.selector_line()), chunks[1]);

        let turns = project(self.session.state().conversation(), self.session.state().open_turn());
        self.history.render(&turns, chunks[2], frame.buffer_mut());

        frame.render_widget(&self.composer, chunks[3]);

        let elapsed = self.started.elapsed().as_millis();
        frame.render_widget(
            Paragraph::new(status_line(&self.session, self.notice.as_ref(), elapsed)),
            chunks[4],
        );

        if self.show_help {
            let area = centered(frame.size(), 64, 22);
            frame.render_widget(Clear, area);
            frame.render_widget(
                Paragraph::new(get_help_text())
                    .wrap(Wrap { trim: false })
                    .block(Block::default().borders(Borders::ALL).title("Help (Esc to close)")),
                area,
            );
        }
    }

    fn selector_line(&self) -> Line<'static> {
        let settings = self.session.settings();
        let prompt = settings.developer_prompt.current();
        let label = Style::default().fg(Color::DarkGray);
        let value = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);

        Line::from(vec![
            Span::styled(" model ", label),
            Span::styled(settings.model.current().to_string(), value),
            Span::styled("  prompt ", label),
            Span::styled(
                format!(
                    "{}/{} ",
                    settings.developer_prompt.selected_index() + 1,
                    settings.developer_prompt.options().len()
                ),
                value,
            ),
            Span::styled(truncate(prompt, 60), Style::default().fg(Color::Gray)),
        ])
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::settings::Settings;
    use crate::transport::HttpTransport;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> App {
        let config = Config::default();
        let transport = HttpTransport::new(&config).unwrap();
        App::new(Session::new(transport, Settings::from_config(&config)))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(press(KeyCode::Char(c)));
        }
    }

    #[tokio::test]
    async fn typing_in_credential_field_sets_credential() {
        let mut app = app();
        assert_eq!(app.focus(), Focus::Credential);
        type_text(&mut app, "sk-1");
        assert!(app.session().settings().has_credential());
        app.handle_key(press(KeyCode::Tab));
        assert_eq!(app.focus(), Focus::Composer);
    }

    #[tokio::test]
    async fn submit_without_credential_keeps_text_and_explains() {
        let mut app = app();
        app.handle_key(press(KeyCode::Tab));
        type_text(&mut app, "Hello");
        app.handle_key(press(KeyCode::Enter));
        assert!(app.session().state().conversation().is_empty());
        assert_eq!(app.composer.content(), "Hello");
        assert_eq!(app.notice(), Some("Enter an API key first"));
    }

    #[tokio::test]
    async fn upload_error_is_shown_until_a_newer_notice() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app();
        type_text(&mut app, "sk-1");
        app.run_command(ParsedCommand {
            command: SlashCommand::Upload,
            argument: Some(dir.path().join("missing.pdf").display().to_string()),
        });
        assert!(app.session().is_uploading());

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while app.session().is_uploading() {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                app.tick();
            }
        })
        .await
        .unwrap();
        assert!(app.notice().unwrap().starts_with("Upload failed: could not read"));
        assert!(app.notice.as_ref().unwrap().is_error);

        app.run_command(ParsedCommand {
            command: SlashCommand::Model,
            argument: None,
        });
        app.tick();
        assert_eq!(app.notice(), Some("Model: gpt-4.1"));
        assert!(!app.notice.as_ref().unwrap().is_error);
    }

    #[tokio::test]
    async fn model_command_cycles_and_picks() {
        let mut app = app();
        app.run_command(ParsedCommand {
            command: SlashCommand::Model,
            argument: Some("2".to_string()),
        });
        assert_eq!(app.session().settings().model.current(), "gpt-4.1");
        app.run_command(ParsedCommand {
            command: SlashCommand::Model,
            argument: Some("custom-model".to_string()),
        });
        assert_eq!(app.session().settings().model.current(), "custom-model");
        assert_eq!(app.notice(), Some("Model: custom-model"));
    }

    #[tokio::test]
    async fn upload_without_credential_is_refused() {
        let mut app = app();
        app.run_command(ParsedCommand {
            command: SlashCommand::Upload,
            argument: Some("/tmp/a.pdf".to_string()),
        });
        assert!(!app.session().is_uploading());
        assert_eq!(app.notice(), Some("Enter an API key before uploading"));
    }

    #[tokio::test]
    async fn ctrl_c_quits() {
        let mut app = app();
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit());
    }

    #[test]
    fn long_prompts_are_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
