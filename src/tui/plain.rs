//! Line-oriented output for non-interactive use.

use std::io::{self, IsTerminal, Write};

use crossterm::style::{Color, Stylize};

use super::style;
use crate::client::{self, TraceItem, TraceSession, TraceSource};
use crate::core::FlowRequest;

const TIME_FORMAT: &str = "%H:%M:%S";

/// Writes new trace items to one sink and answer deltas to another.
pub struct PlainRenderer<O, E> {
    out: O,
    err: E,
    expand: bool,
    color: bool,
    printed_items: usize,
    printed_answer: usize,
}

impl<O: Write, E: Write> PlainRenderer<O, E> {
    pub const fn new(out: O, err: E, expand: bool, color: bool) -> Self {
        Self {
            out,
            err,
            expand,
            color,
            printed_items: 0,
            printed_answer: 0,
        }
    }

    /// Print whatever the session gained since the last call.
    pub fn update(&mut self, session: &TraceSession) -> io::Result<()> {
        for item in &session.items()[self.printed_items..] {
            self.write_item(item)?;
        }
        self.printed_items = session.items().len();
        self.err.flush()?;

        let answer = session.answer();
        if answer.len() > self.printed_answer {
            self.out.write_all(answer[self.printed_answer..].as_bytes())?;
            self.printed_answer = answer.len();
            self.out.flush()?;
        }
        Ok(())
    }

    /// End the answer with a newline if anything was printed.
    pub fn close(&mut self) -> io::Result<()> {
        if self.printed_answer > 0 {
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    fn write_item(&mut self, item: &TraceItem) -> io::Result<()> {
        let mut rows = item.text.lines();
        let head = rows.next().unwrap_or_default();
        let line = format!(
            "{} [{}] {head}",
            style::icon(&item.kind),
            item.timestamp.format(TIME_FORMAT)
        );

        if self.color {
            let (r, g, b) = style::rgb(&item.kind);
            writeln!(self.err, "{}", line.with(Color::Rgb { r, g, b }))?;
        } else {
            writeln!(self.err, "{line}")?;
        }
        for row in rows {
            writeln!(self.err, "    {row}")?;
        }

        if let Some(details) = item.details.as_ref().filter(|_| self.expand) {
            for row in details.lines() {
                writeln!(self.err, "      {row}")?;
            }
        }
        Ok(())
    }
}

/// Run a request and print it as it streams. Ctrl-C cancels.
///
/// # Errors
///
/// Returns error if writing to the terminal fails.
pub async fn run(source: TraceSource, request: FlowRequest, expand: bool) -> anyhow::Result<()> {
    let color = io::stderr().is_terminal();
    let mut renderer = PlainRenderer::new(io::stdout(), io::stderr(), expand, color);
    let mut session = TraceSession::new();
    session.begin();

    let (handle, mut events) = client::spawn_fetch(source, request);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                client::apply_fetch(&mut session, event);
            }
            _ = tokio::signal::ctrl_c() => {
                handle.abort();
                session.abort();
                renderer.update(&session)?;
                break;
            }
        }
        renderer.update(&session)?;
    }

    renderer.close()?;
    Ok(())
}
