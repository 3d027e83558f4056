//! Detail panel: shows the selected node's content, kept current purely by
//! listening to the channel. Selecting a loading node shows its placeholder;
//! the re-broadcast on load completion fills the panel in without the panel
//! knowing anything about fetches.

use std::cell::RefCell;
use std::rc::Rc;

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use strata_core::channel::{
    EventChannel, EventDetail, ListenerHandle, NODE_DATA_UPDATED, NODE_DESELECTED, NODE_SELECTED,
};
use strata_core::content::NodeContent;
use strata_core::path::NodePath;

const MAX_TABLE_ROWS: usize = 8;
const MAX_SAMPLES: usize = 6;

#[derive(Default)]
struct DetailState {
    current: Option<(NodePath, NodeContent)>,
    scroll: usize,
}

pub struct DetailPanel {
    state: Rc<RefCell<DetailState>>,
    channel: Rc<EventChannel>,
    handles: Vec<ListenerHandle>,
}

impl DetailPanel {
    pub fn new(channel: Rc<EventChannel>) -> Self {
        let state = Rc::new(RefCell::new(DetailState::default()));
        let mut handles = Vec::new();

        let sink = Rc::downgrade(&state);
        handles.push(channel.add_listener(NODE_SELECTED, move |envelope| {
            let Some(state) = sink.upgrade() else { return };
            if let EventDetail::Node { path, content } = &*envelope.detail {
                let mut state = state.borrow_mut();
                state.scroll = 0;
                state.current = Some((path.clone(), content.clone()));
            }
        }));

        let sink = Rc::downgrade(&state);
        handles.push(channel.add_listener(NODE_DATA_UPDATED, move |envelope| {
            let Some(state) = sink.upgrade() else { return };
            if let EventDetail::Node { path, content } = &*envelope.detail {
                let mut state = state.borrow_mut();
                // Updates for other nodes leave the panel alone.
                if matches!(&state.current, Some((shown, _)) if shown == path) {
                    state.current = Some((path.clone(), content.clone()));
                }
            }
        }));

        let sink = Rc::downgrade(&state);
        handles.push(channel.add_listener(NODE_DESELECTED, move |envelope| {
            let Some(state) = sink.upgrade() else { return };
            if let EventDetail::Path { path } = &*envelope.detail {
                let mut state = state.borrow_mut();
                if matches!(&state.current, Some((shown, _)) if shown == path) {
                    state.current = None;
                    state.scroll = 0;
                }
            }
        }));

        Self {
            state,
            channel,
            handles,
        }
    }

    pub fn scroll_down(&self) {
        let mut state = self.state.borrow_mut();
        state.scroll = state.scroll.saturating_add(1);
    }

    pub fn scroll_up(&self) {
        let mut state = self.state.borrow_mut();
        state.scroll = state.scroll.saturating_sub(1);
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let state = self.state.borrow();

        let border_color = if focused { Color::Blue } else { Color::DarkGray };
        let title = match &state.current {
            Some((_, content)) => format!(" {} ", content.display_name),
            None => " Details ".to_string(),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .title(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some((_, content)) = &state.current else {
            let empty = Paragraph::new("  Nothing selected.")
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(empty, inner);
            return;
        };

        let lines = content_lines(content);
        let widget = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((state.scroll as u16, 0));
        frame.render_widget(widget, inner);
    }
}

impl Drop for DetailPanel {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            self.channel.remove_listener(handle);
        }
    }
}

fn content_lines(content: &NodeContent) -> Vec<Line<'static>> {
    let label_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let key_style = Style::default().fg(Color::Blue);
    let dim = Style::default().fg(Color::DarkGray);

    let mut lines: Vec<Line> = Vec::new();

    if !content.parameters.is_empty() {
        lines.push(Line::from(Span::styled("Parameters", label_style)));
        for param in &content.parameters {
            lines.push(Line::from(vec![
                Span::styled(format!("  {}: ", param.key), key_style),
                Span::raw(param.value.to_string()),
            ]));
        }
        lines.push(Line::from(""));
    }

    if !content.metadata.is_empty() {
        lines.push(Line::from(Span::styled("Metadata", label_style)));
        for (key, value) in &content.metadata {
            lines.push(Line::from(vec![
                Span::styled(format!("  {key}: "), key_style),
                Span::raw(value.to_string()),
            ]));
        }
        lines.push(Line::from(""));
    }

    if !content.samples.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Samples ({})", content.samples.len()),
            label_style,
        )));
        for sample in content.samples.iter().take(MAX_SAMPLES) {
            lines.push(Line::from(format!("  x={}  y={}", sample.x, sample.y)));
        }
        if content.samples.len() > MAX_SAMPLES {
            lines.push(Line::from(Span::styled(
                format!("  … {} more", content.samples.len() - MAX_SAMPLES),
                dim,
            )));
        }
        lines.push(Line::from(""));
    }

    if !content.table.is_empty() {
        lines.push(Line::from(Span::styled("Table", label_style)));
        let header = content
            .table
            .columns
            .iter()
            .map(|c| c.label.as_str())
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(Line::from(Span::styled(format!("  {header}"), key_style)));
        for row in content.table.rows.iter().take(MAX_TABLE_ROWS) {
            let cells = content
                .table
                .columns
                .iter()
                .map(|c| {
                    row.get(&c.key)
                        .map(render_cell)
                        .unwrap_or_default()
                })
                .collect::<Vec<_>>()
                .join("  ");
            lines.push(Line::from(format!("  {cells}")));
        }
        if content.table.rows.len() > MAX_TABLE_ROWS {
            lines.push(Line::from(Span::styled(
                format!("  … {} more rows", content.table.rows.len() - MAX_TABLE_ROWS),
                dim,
            )));
        }
        lines.push(Line::from(""));
    }

    if !content.children.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Children ({})", content.children.len()),
            label_style,
        )));
        for child in &content.children {
            lines.push(Line::from(format!("  {child}")));
        }
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled("No data.", dim)));
    }

    lines
}

fn render_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
