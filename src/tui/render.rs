//! Drawing the answer and trace panes.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use super::app::TraceView;
use super::style::{self, DIMMED, SELECTION_BG};
use crate::client::TraceItem;

const TIME_FORMAT: &str = "%H:%M:%S";
const HELP: &str = " ↑↓ select · enter toggle · e/c expand/collapse · esc cancel · q quit ";

pub fn draw(frame: &mut Frame, view: &mut TraceView) {
    let [answer_area, trace_area] = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .areas(frame.area());

    draw_answer(frame, answer_area, view);
    draw_traces(frame, trace_area, view);
}

fn draw_answer(frame: &mut Frame, area: Rect, view: &TraceView) {
    let status = match view.session.total_tokens() {
        Some(tokens) => format!(" {tokens} tokens "),
        None if view.session.is_loading() => " streaming… ".to_string(),
        None => String::new(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(DIMMED))
        .title(format!(" {} ", view.title))
        .title_bottom(Line::from(status).right_aligned());

    let paragraph = Paragraph::new(view.session.answer())
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn draw_traces(frame: &mut Frame, area: Rect, view: &mut TraceView) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(DIMMED))
        .title(" Trace ")
        .title_bottom(Line::from(HELP).style(Style::default().fg(DIMMED)));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let width = usize::from(inner.width.max(1));
    let last = view.session.items().len().checked_sub(1);
    let pulse = view.session.is_loading() && view.pulse_on();

    let mut lines = Vec::new();
    let mut selected_span = None;
    for (index, item) in view.session.items().iter().enumerate() {
        let top = lines.len();
        let state = ItemState {
            selected: view.selected == Some(index),
            pulsing: view.session.is_loading() && Some(index) == last,
            bright: pulse,
        };
        lines.extend(item_lines(item, state, width));
        if state.selected {
            selected_span = Some((top, lines.len()));
        }
    }

    let height = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    view.update_dimensions(height, inner.height);
    let follow = std::mem::take(&mut view.follow_selection);
    if let Some((top, bottom)) = selected_span.filter(|_| follow) {
        view.reveal(
            u16::try_from(top).unwrap_or(u16::MAX),
            u16::try_from(bottom).unwrap_or(u16::MAX),
            inner.height,
        );
    }

    frame.render_widget(Paragraph::new(lines).scroll((view.scroll, 0)), inner);
}

#[derive(Debug, Clone, Copy)]
struct ItemState {
    selected: bool,
    pulsing: bool,
    bright: bool,
}

/// Lines of one item, pre-wrapped so the pane can count them.
fn item_lines(item: &TraceItem, state: ItemState, width: usize) -> Vec<Line<'static>> {
    let color = style::color(&item.kind);
    let mut text_style = Style::default();
    if state.pulsing {
        text_style = if state.bright {
            text_style.add_modifier(Modifier::BOLD)
        } else {
            text_style.add_modifier(Modifier::DIM)
        };
    }
    let bg = if state.selected {
        SELECTION_BG
    } else {
        Color::Reset
    };

    let marker = match (item.has_details(), item.expanded) {
        (false, _) => " ",
        (true, false) => "▸",
        (true, true) => "▾",
    };
    let header = format!(
        "{} {} {marker} ",
        style::icon(&item.kind),
        item.timestamp.format(TIME_FORMAT)
    );
    let indent = " ".repeat(4);
    let text_width = width.saturating_sub(2 + display_width(&header)).max(1);

    let mut rows: Vec<String> = item
        .text
        .lines()
        .flat_map(|line| wrap(line, text_width))
        .collect();
    if rows.is_empty() {
        rows.push(String::new());
    }

    let mut lines = Vec::new();
    for (n, row) in rows.into_iter().enumerate() {
        let lead = if n == 0 {
            Span::styled(header.clone(), Style::default().fg(DIMMED))
        } else {
            Span::raw(" ".repeat(display_width(&header)))
        };
        lines.push(
            Line::from(vec![
                Span::styled("│ ", Style::default().fg(color)),
                lead,
                Span::styled(row, text_style),
            ])
            .style(Style::default().bg(bg)),
        );
    }

    if let Some(details) = item.details.as_ref().filter(|_| item.expanded) {
        let detail_width = width.saturating_sub(2 + indent.len()).max(1);
        for row in details.lines().flat_map(|line| wrap(line, detail_width)) {
            lines.push(
                Line::from(vec![
                    Span::styled("│ ", Style::default().fg(color)),
                    Span::raw(indent.clone()),
                    Span::styled(row, Style::default().fg(DIMMED)),
                ])
                .style(Style::default().bg(bg)),
            );
        }
    }

    lines
}

fn display_width(text: &str) -> usize {
    Span::raw(text).width()
}

/// Hard-wrap a line to a display width.
fn wrap(line: &str, width: usize) -> Vec<String> {
    let mut rows = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;
    let mut buf = [0u8; 4];

    for ch in line.chars() {
        let w = display_width(ch.encode_utf8(&mut buf));
        if current_width + w > width && !current.is_empty() {
            rows.push(std::mem::take(&mut current));
            current_width = 0;
        }
        current.push(ch);
        current_width += w;
    }
    rows.push(current);
    rows
}
