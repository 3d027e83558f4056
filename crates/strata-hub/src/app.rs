use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use strata_core::channel::{
    EventChannel, EventDetail, ListenerHandle, DEFAULT_CHANNEL, EVENT_ERROR, EVENT_WARNING,
};
use strata_core::fetch::{FetchCmd, FetchOutcome, FetchPool};
use strata_core::provider::ProviderHandle;
use strata_tree::{ui as tree_ui, TreeContainer};

use crate::detail::DetailPanel;

/// Which pane receives j/k style keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Tree,
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
struct Notice {
    level: NoticeLevel,
    message: String,
}

/// The main application state.
pub struct App {
    channel: Rc<EventChannel>,
    pool: FetchPool,
    container: TreeContainer,
    detail: DetailPanel,
    /// Status-bar notices, newest last. Errors and warnings arrive through
    /// the channel; informational notices are pushed directly.
    notices: Rc<RefCell<Vec<Notice>>>,
    /// Export target paths keyed by request token.
    pending_exports: HashMap<u64, PathBuf>,
    next_token: u64,
    focus: Pane,
    pub should_quit: bool,
    notice_handles: Vec<ListenerHandle>,
}

impl App {
    pub fn new() -> Self {
        let channel = EventChannel::named(DEFAULT_CHANNEL);
        let pool = FetchPool::spawn();
        let container = TreeContainer::new(channel.clone(), pool.sender());
        let detail = DetailPanel::new(channel.clone());

        let notices: Rc<RefCell<Vec<Notice>>> = Rc::new(RefCell::new(Vec::new()));
        let mut notice_handles = Vec::new();
        for (event, level) in [(EVENT_ERROR, NoticeLevel::Error), (EVENT_WARNING, NoticeLevel::Warning)] {
            let sink = Rc::downgrade(&notices);
            notice_handles.push(channel.add_listener(event, move |envelope| {
                let Some(notices) = sink.upgrade() else { return };
                if let EventDetail::Message { message } = &*envelope.detail {
                    notices.borrow_mut().push(Notice {
                        level,
                        message: message.clone(),
                    });
                }
            }));
        }

        Self {
            channel,
            pool,
            container,
            detail,
            notices,
            pending_exports: HashMap::new(),
            next_token: 0,
            focus: Pane::Tree,
            should_quit: false,
            notice_handles,
        }
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.borrow_mut().push(Notice {
            level,
            message: message.into(),
        });
    }

    /// Ask the pool to open a document; the root is added when the `Opened`
    /// outcome comes back successful.
    pub fn open_document(&mut self, provider: ProviderHandle) {
        let token = self.next_token;
        self.next_token += 1;
        if self
            .pool
            .send(FetchCmd::Open { token, provider })
            .is_err()
        {
            log::error!("fetch pool is gone; cannot open document");
        }
    }

    /// Drain pool outcomes (called every tick). Open and export results are
    /// handled here; content and close results belong to the container.
    pub fn tick(&mut self) {
        while let Some(outcome) = self.pool.try_recv() {
            match outcome {
                FetchOutcome::Opened {
                    provider, result, ..
                } => match result {
                    Ok(()) => self.container.add_root(provider),
                    Err(message) => {
                        log::error!("open failed: {message}");
                        self.channel
                            .dispatch_message(EVENT_ERROR, format!("open failed: {message}"));
                    }
                },
                FetchOutcome::Exported { token, result } => self.finish_export(token, result),
                other => self.container.apply(other),
            }
        }
    }

    fn finish_export(&mut self, token: u64, result: Result<Vec<u8>, String>) {
        let Some(target) = self.pending_exports.remove(&token) else {
            log::warn!("export outcome for unknown token {token}");
            return;
        };
        let written = result.and_then(|bytes| {
            std::fs::write(&target, bytes).map_err(|e| e.to_string())
        });
        match written {
            Ok(()) => self.notify(
                NoticeLevel::Info,
                format!("exported to {}", target.display()),
            ),
            Err(message) => {
                log::error!("export failed: {message}");
                self.channel
                    .dispatch_message(EVENT_ERROR, format!("export failed: {message}"));
            }
        }
    }

    fn export_selected(&mut self) {
        let Some(provider) = self.container.selected_provider() else {
            self.notify(NoticeLevel::Warning, "nothing selected to export");
            return;
        };
        let token = self.next_token;
        self.next_token += 1;
        let target = PathBuf::from(format!("strata-export-{token}.json"));
        self.pending_exports.insert(token, target);
        if self
            .pool
            .send(FetchCmd::Export {
                token,
                format: "json".to_string(),
                provider,
            })
            .is_err()
        {
            log::error!("fetch pool is gone; cannot export");
        }
    }

    /// Handle a terminal event.
    pub fn handle_event(&mut self, event: Event) {
        if let Event::Key(key) = event {
            // Ctrl-c always quits
            if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
                self.should_quit = true;
                return;
            }
            self.handle_key(key);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Pane::Tree => Pane::Detail,
                    Pane::Detail => Pane::Tree,
                };
            }
            KeyCode::Char('j') | KeyCode::Down => match self.focus {
                Pane::Tree => self.container.select_next(),
                Pane::Detail => self.detail.scroll_down(),
            },
            KeyCode::Char('k') | KeyCode::Up => match self.focus {
                Pane::Tree => self.container.select_prev(),
                Pane::Detail => self.detail.scroll_up(),
            },
            KeyCode::Char('l') | KeyCode::Right if self.focus == Pane::Tree => {
                self.container.expand_selected();
            }
            KeyCode::Char('h') | KeyCode::Left if self.focus == Pane::Tree => {
                self.container.collapse_selected();
            }
            KeyCode::Enter if self.focus == Pane::Tree => self.container.activate(),
            KeyCode::Char('r') => self.container.refresh_selected(),
            KeyCode::Char('e') => self.export_selected(),
            KeyCode::Char('d') if self.focus == Pane::Tree => {
                match self.container.remove_selected() {
                    Some(path) => self.notify(
                        NoticeLevel::Info,
                        format!("closed {}", path.display_name()),
                    ),
                    None => self.notify(NoticeLevel::Warning, "nothing selected to close"),
                }
            }
            KeyCode::Char('D') if self.focus == Pane::Tree => {
                let removed = self.container.remove_all();
                self.notify(
                    NoticeLevel::Info,
                    format!("closed {} document(s)", removed.len()),
                );
            }
            _ => {}
        }
    }

    /// Render the whole application: tree on the left, detail on the right,
    /// one status line at the bottom.
    pub fn render(&mut self, frame: &mut Frame) {
        let [content_area, status_area] =
            Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]).areas(frame.area());
        let [tree_area, detail_area] =
            Layout::horizontal([Constraint::Percentage(40), Constraint::Fill(1)])
                .areas(content_area);

        tree_ui::render_tree(frame, tree_area, &self.container, self.focus == Pane::Tree);
        self.detail
            .render(frame, detail_area, self.focus == Pane::Detail);
        self.render_status(frame, status_area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let path = self
            .container
            .selected_path()
            .map(|p| format!("{p} "))
            .unwrap_or_default();
        let [message_area, path_area] = Layout::horizontal([
            Constraint::Fill(1),
            Constraint::Length(path.len() as u16),
        ])
        .areas(area);
        frame.render_widget(
            Paragraph::new(Span::styled(path, Style::default().fg(Color::DarkGray))),
            path_area,
        );

        let notices = self.notices.borrow();
        let line = match notices.last() {
            Some(notice) => {
                let style = match notice.level {
                    NoticeLevel::Info => Style::default().fg(Color::Green),
                    NoticeLevel::Warning => Style::default().fg(Color::Yellow),
                    NoticeLevel::Error => Style::default()
                        .fg(Color::Red)
                        .add_modifier(Modifier::BOLD),
                };
                Line::from(Span::styled(format!(" {}", notice.message), style))
            }
            None => Line::from(Span::styled(
                " j/k: move  Enter: toggle  l/h: expand/collapse  r: refresh  e: export  d: close  q: quit",
                Style::default().fg(Color::DarkGray),
            )),
        };
        frame.render_widget(Paragraph::new(line), message_area);
    }
}

impl Drop for App {
    fn drop(&mut self) {
        for handle in self.notice_handles.drain(..) {
            self.channel.remove_listener(handle);
        }
    }
}
