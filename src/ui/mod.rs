//! Terminal user interface
//!
//! Built with ratatui on crossterm. The event loop polls the keyboard with a
//! short timeout and applies stream and upload events between polls, so all
//! state changes happen on this task.

pub mod app;
pub mod commands;
pub mod composer;
pub mod history;
pub mod status;

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;

pub use app::App;

use crate::session::Session;

const POLL_INTERVAL: Duration = Duration::from_millis(40);

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

/// Initialize terminal
pub fn init_terminal() -> Result<Tui> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal
pub fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the chat UI until the user quits.
pub async fn run(session: Session) -> Result<()> {
    let mut terminal = init_terminal()?;
    let result = event_loop(&mut terminal, App::new(session)).await;
    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(terminal: &mut Tui, mut app: App) -> Result<()> {
    app.session().probe_health();

    loop {
        terminal.draw(|frame| app.draw(frame))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }
        app.tick();

        if app.should_quit() {
            info!("quit requested");
            return Ok(());
        }

        // Let spawned workers make progress on a current-thread runtime.
        tokio::task::yield_now().await;
    }
}
