//! Terminal views of a trace stream.

mod app;
pub mod plain;
mod render;
mod style;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind, MouseEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::client::{self, FetchEvent, TraceSource};
use crate::core::FlowRequest;

pub use app::{KeyAction, TraceView};

/// Interval between frames; also the pulse clock.
const FRAME: Duration = Duration::from_millis(50);

/// Run a request in the full-screen trace view.
///
/// # Errors
///
/// Returns an error if terminal initialization fails or the event loop encounters an error.
pub async fn run(source: TraceSource, request: FlowRequest, title: String) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut view = TraceView::new(title);
    let result = run_app(&mut terminal, &mut view, source, request).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    view: &mut TraceView,
    source: TraceSource,
    request: FlowRequest,
) -> anyhow::Result<()> {
    view.begin();
    let (handle, mut fetch) = client::spawn_fetch(source, request);
    let mut fetching = true;

    loop {
        terminal.draw(|f| render::draw(f, view))?;

        tokio::select! {
            () = tokio::time::sleep(FRAME) => {
                view.tick();
                while event::poll(Duration::from_millis(0))? {
                    match event::read()? {
                        Event::Key(key) if key.kind != KeyEventKind::Release => {
                            match view.handle_key(key.code, key.modifiers) {
                                KeyAction::None => {}
                                KeyAction::Cancel => {
                                    handle.abort();
                                    view.session.abort();
                                }
                                KeyAction::Quit => {
                                    handle.abort();
                                    return Ok(());
                                }
                            }
                        }
                        Event::Mouse(mouse) => match mouse.kind {
                            MouseEventKind::ScrollUp => view.scroll_up(3),
                            MouseEventKind::ScrollDown => view.scroll_down(3),
                            _ => {}
                        },
                        _ => {}
                    }
                }
            }

            event = fetch.recv(), if fetching => {
                match event {
                    Some(event) => {
                        let done = matches!(event, FetchEvent::Done | FetchEvent::Failed(_));
                        client::apply_fetch(&mut view.session, event);
                        fetching = !done;
                    }
                    None => fetching = false,
                }
            }
        }
    }
}
