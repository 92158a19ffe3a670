//! Trace view state and key handling.

use crossterm::event::{KeyCode, KeyModifiers};

use crate::client::TraceSession;

/// Ticks per pulse phase of the last item.
const PULSE_TICKS: u64 = 8;

/// What the event loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    None,
    /// Abort the in-flight request.
    Cancel,
    Quit,
}

/// State behind the trace view.
#[derive(Debug)]
pub struct TraceView {
    pub session: TraceSession,
    pub title: String,
    /// Index of the selected item.
    pub selected: Option<usize>,
    /// First visible line of the trace pane.
    pub scroll: u16,
    pub max_scroll: u16,
    /// Follow new items. Cleared when the user scrolls away.
    pub auto_scroll: bool,
    /// Bring the selected item into view on the next frame.
    pub follow_selection: bool,
    tick: u64,
}

impl TraceView {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            session: TraceSession::new(),
            title: title.into(),
            selected: None,
            scroll: 0,
            max_scroll: 0,
            auto_scroll: true,
            follow_selection: false,
            tick: 0,
        }
    }

    /// Start a new request.
    pub fn begin(&mut self) {
        self.session.begin();
        self.selected = None;
        self.scroll = 0;
        self.max_scroll = 0;
        self.auto_scroll = true;
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> KeyAction {
        match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
            KeyCode::Char('q') => KeyAction::Quit,
            KeyCode::Esc if self.session.is_loading() => KeyAction::Cancel,
            KeyCode::Up | KeyCode::Char('k') => {
                self.select_prev();
                KeyAction::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.select_next();
                KeyAction::None
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                self.toggle_selected();
                KeyAction::None
            }
            KeyCode::Char('e') => {
                self.session.set_all_expanded(true);
                KeyAction::None
            }
            KeyCode::Char('c') => {
                self.session.set_all_expanded(false);
                KeyAction::None
            }
            KeyCode::PageUp => {
                self.scroll_up(10);
                KeyAction::None
            }
            KeyCode::PageDown => {
                self.scroll_down(10);
                KeyAction::None
            }
            _ => KeyAction::None,
        }
    }

    fn last_index(&self) -> Option<usize> {
        self.session.items().len().checked_sub(1)
    }

    pub fn select_prev(&mut self) {
        let Some(last) = self.last_index() else {
            return;
        };
        self.selected = Some(self.selected.map_or(last, |i| i.saturating_sub(1)));
        self.auto_scroll = self.selected == Some(last);
        self.follow_selection = true;
    }

    pub fn select_next(&mut self) {
        let Some(last) = self.last_index() else {
            return;
        };
        self.selected = Some(self.selected.map_or(last, |i| (i + 1).min(last)));
        self.auto_scroll = self.selected == Some(last);
        self.follow_selection = true;
    }

    /// Toggle the selected item if it has details.
    pub fn toggle_selected(&mut self) {
        let Some(id) = self
            .selected
            .and_then(|i| self.session.items().get(i))
            .map(|item| item.id)
        else {
            return;
        };
        self.session.toggle(id);
    }

    pub const fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.auto_scroll = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll);
        if self.scroll >= self.max_scroll {
            self.auto_scroll = true;
        }
    }

    /// Recompute scroll bounds for the trace pane.
    ///
    /// A pending scroll request from the session moves the view to the
    /// bottom unless the user has scrolled away.
    pub fn update_dimensions(&mut self, content_height: u16, visible_height: u16) {
        self.max_scroll = content_height.saturating_sub(visible_height);
        let requested = self.session.take_scroll_request();
        if requested && self.auto_scroll {
            self.scroll = self.max_scroll;
        }
        self.scroll = self.scroll.min(self.max_scroll);
    }

    /// Scroll just enough to show lines `top..bottom` of the trace pane.
    pub fn reveal(&mut self, top: u16, bottom: u16, visible_height: u16) {
        if top < self.scroll {
            self.scroll = top;
        } else if bottom > self.scroll.saturating_add(visible_height) {
            self.scroll = bottom.saturating_sub(visible_height).min(self.max_scroll);
        }
    }

    pub const fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    /// Whether the last item is in the bright phase of its pulse.
    #[must_use]
    pub const fn pulse_on(&self) -> bool {
        (self.tick / PULSE_TICKS) % 2 == 0
    }
}
