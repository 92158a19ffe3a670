//! Icons and colors per trace category.

use ratatui::style::Color;

use crate::client::TraceCategory;

const BLUE: (u8, u8, u8) = (59, 130, 246);
const YELLOW: (u8, u8, u8) = (234, 179, 8);
const ORANGE: (u8, u8, u8) = (249, 115, 22);
const PURPLE: (u8, u8, u8) = (160, 100, 200);
const INDIGO: (u8, u8, u8) = (99, 102, 241);
const GREEN: (u8, u8, u8) = (34, 197, 94);
const TEAL: (u8, u8, u8) = (77, 201, 176);
const DARK_GREEN: (u8, u8, u8) = (21, 128, 61);
const DARK_BLUE: (u8, u8, u8) = (30, 64, 175);
const RED: (u8, u8, u8) = (220, 80, 80);
const GRAY: (u8, u8, u8) = (120, 120, 130);

pub const DIMMED: Color = Color::Rgb(100, 100, 110);
pub const SELECTION_BG: Color = Color::Rgb(40, 44, 52);

#[must_use]
pub const fn icon(kind: &TraceCategory) -> &'static str {
    match kind {
        TraceCategory::Thinking => "🤔",
        TraceCategory::ToolCall => "🛠️",
        TraceCategory::ToolResult => "📋",
        TraceCategory::Observation => "👁️",
        TraceCategory::Reasoning => "🧠",
        TraceCategory::SearchStart => "🔍",
        TraceCategory::SearchComplete => "✅",
        TraceCategory::Tokens => "📊",
        TraceCategory::Initial => "🚀",
        TraceCategory::Error => "⚠️",
        TraceCategory::Cancelled => "⏹️",
        _ => "📝",
    }
}

/// Border color as RGB, shared by the TUI and the plain renderer.
#[must_use]
pub const fn rgb(kind: &TraceCategory) -> (u8, u8, u8) {
    match kind {
        TraceCategory::Thinking => BLUE,
        TraceCategory::ToolCall => YELLOW,
        TraceCategory::ToolResult => ORANGE,
        TraceCategory::Observation => PURPLE,
        TraceCategory::Reasoning => INDIGO,
        TraceCategory::SearchStart => GREEN,
        TraceCategory::SearchComplete => TEAL,
        TraceCategory::Completed | TraceCategory::Tokens => DARK_GREEN,
        TraceCategory::Initial => DARK_BLUE,
        TraceCategory::Error | TraceCategory::Cancelled => RED,
        _ => GRAY,
    }
}

#[must_use]
pub const fn color(kind: &TraceCategory) -> Color {
    let (r, g, b) = rgb(kind);
    Color::Rgb(r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_its_icon() {
        assert_eq!(icon(&TraceCategory::Thinking), "🤔");
        assert_eq!(icon(&TraceCategory::SearchComplete), "✅");
        assert_eq!(icon(&TraceCategory::Cancelled), "⏹️");
        assert_eq!(icon(&TraceCategory::Completed), "📝");
        assert_eq!(icon(&TraceCategory::Custom("step".to_string())), "📝");
    }

    #[test]
    fn related_categories_share_colors() {
        assert_eq!(
            color(&TraceCategory::Completed),
            color(&TraceCategory::Tokens)
        );
        assert_eq!(color(&TraceCategory::Error), color(&TraceCategory::Cancelled));
        assert_eq!(color(&TraceCategory::Other), Color::Rgb(120, 120, 130));
        assert_ne!(
            color(&TraceCategory::SearchStart),
            color(&TraceCategory::SearchComplete)
        );
    }
}
