//! Tree panel rendering: takes the container's flat row projection and
//! draws it with depth guides, expand glyphs, and load-state markers.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::container::{TreeContainer, TreeRow};

const GUIDE_STYLE: Style = Style::new().fg(Color::DarkGray);
const SELECTED_BG: Color = Color::Gray;

/// Render the tree panel into the given area.
pub fn render_tree(frame: &mut Frame, area: Rect, container: &TreeContainer, focused: bool) {
    let border_color = if focused { Color::Blue } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Documents ");

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let rows = container.visible_rows();
    if rows.is_empty() {
        let empty = Paragraph::new("  No documents open. Press 'o' to open.")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, inner);
        return;
    }

    let selected = rows.iter().position(|row| row.selected).unwrap_or(0);
    let visible_lines = inner.height as usize;

    // Keep the selected row in view.
    let scroll_offset = if selected >= visible_lines {
        selected - visible_lines + 1
    } else {
        0
    };

    let lines: Vec<Line> = rows
        .iter()
        .skip(scroll_offset)
        .take(visible_lines)
        .map(|row| render_row_line(row, inner.width))
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_row_line(row: &TreeRow, area_width: u16) -> Line<'static> {
    let base_style = if row.selected {
        Style::default()
            .bg(SELECTED_BG)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else if row.error.is_some() {
        Style::default().fg(Color::Red)
    } else if row.loading {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::DIM)
    } else if row.has_children {
        Style::default().fg(Color::Blue)
    } else {
        Style::default().fg(Color::White)
    };

    let mut spans: Vec<Span<'static>> = Vec::new();

    for d in 0..row.depth {
        let has_guide = row.guide_depths.get(d).copied().unwrap_or(false);
        if has_guide {
            let guide_style = if row.selected {
                GUIDE_STYLE.bg(SELECTED_BG)
            } else {
                GUIDE_STYLE
            };
            spans.push(Span::styled("\u{2502} ", guide_style));
        } else {
            spans.push(Span::styled("  ", base_style));
        }
    }

    let icon: &str = if row.error.is_some() {
        "\u{2717} "
    } else if row.loading {
        "\u{2026} "
    } else if row.has_children {
        if row.expanded {
            "\u{25BC} "
        } else {
            "\u{25B6} "
        }
    } else {
        "\u{25CF} "
    };
    spans.push(Span::styled(icon.to_string(), base_style));
    spans.push(Span::styled(row.name.clone(), base_style));

    if row.selected {
        let content_width: usize = spans.iter().map(|s| s.content.width()).sum();
        let remaining = (area_width as usize).saturating_sub(content_width);
        if remaining > 0 {
            spans.push(Span::styled(
                " ".repeat(remaining),
                Style::default().bg(SELECTED_BG),
            ));
        }
    }

    Line::from(spans)
}
