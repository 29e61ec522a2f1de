//! Viewer + chat screen: composes the viewer controller and chat session
//! into one terminal UI

mod chat_view;
mod page_view;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, info};
use ratatui::{
    Frame, Terminal,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::chat::{ChatBackend, ChatSession, SendOutcome};
use crate::event_source::EventSource;
use crate::pdf::{EngineFactory, PageRenderer, Phase, ViewerController};
use crate::source::{DocumentReference, DocumentSource};
use crate::theme::{Base16Palette, current_theme};

pub use page_view::{CellSize, PageView, PageViewCache};

const NO_DOCUMENT_TEXT: &str = "No PDF URL provided.";
const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

/// External collaborators the screen talks to
#[derive(Clone)]
pub struct ScreenServices {
    pub source: Arc<dyn DocumentSource>,
    pub engine: EngineFactory,
    pub chat: Arc<dyn ChatBackend>,
}

/// Layout parameters for the screen
#[derive(Clone, Copy, Debug)]
pub struct ScreenConfig {
    pub margin_px: u32,
    pub cell_size: CellSize,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            margin_px: crate::pdf::DEFAULT_MARGIN_PX,
            cell_size: CellSize::new(8, 16),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Viewer,
    Chat,
}

pub struct ViewerChatScreen {
    viewer: ViewerController,
    chat: ChatSession,
    focus: Focus,
    config: ScreenConfig,
    page_cache: PageViewCache,
    page_scroll: u16,
    page_rows: u16,
    tick_count: usize,
    should_quit: bool,
}

impl ViewerChatScreen {
    /// Build the screen and start loading the referenced document
    #[must_use]
    pub fn mount(
        reference: Option<String>,
        services: ScreenServices,
        config: ScreenConfig,
    ) -> Self {
        let reference = DocumentReference::from_optional(reference).ok();
        let mut viewer = ViewerController::new(
            reference,
            services.source,
            services.engine,
            PageRenderer::new(config.margin_px),
        );
        viewer.mount();
        info!("Screen mounted");

        Self {
            viewer,
            chat: ChatSession::new(services.chat),
            focus: Focus::default(),
            config,
            page_cache: PageViewCache::default(),
            page_scroll: 0,
            page_rows: 0,
            tick_count: 0,
            should_quit: false,
        }
    }

    /// Apply finished background work. Returns true if a redraw is needed.
    pub fn tick(&mut self) -> bool {
        self.tick_count = self.tick_count.wrapping_add(1);
        let viewer_changed = self.viewer.poll();
        let chat_changed = self.chat.poll();
        viewer_changed || chat_changed || self.is_busy()
    }

    fn is_busy(&self) -> bool {
        let state = self.viewer.state();
        state.is_document_loading || state.is_page_loading || self.chat.is_awaiting_reply()
    }

    pub fn handle_event(&mut self, event: &Event) {
        if let Event::Key(key) = event {
            if key.kind == KeyEventKind::Press {
                self.handle_key(*key);
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.focus {
            Focus::Viewer => self.handle_viewer_key(key),
            Focus::Chat => self.handle_chat_key(key),
        }
    }

    fn handle_viewer_key(&mut self, key: KeyEvent) {
        let page_before = self.viewer.state().current_page;
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => self.focus = Focus::Chat,
            KeyCode::Char('n' | 'l') | KeyCode::Right | KeyCode::PageDown => {
                self.viewer.next_page();
            }
            KeyCode::Char('p' | 'h') | KeyCode::Left | KeyCode::PageUp => {
                self.viewer.previous_page();
            }
            KeyCode::Char('g') => self.viewer.go_to_page(1),
            KeyCode::Char('G') => self.viewer.go_to_page(usize::MAX),
            KeyCode::Char('+' | '=') => self.viewer.zoom_in(),
            KeyCode::Char('-') => self.viewer.zoom_out(),
            KeyCode::Char('0') => self.viewer.reset_zoom(),
            KeyCode::Char('j') | KeyCode::Down => self.scroll_page(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_page(-1),
            _ => {}
        }
        if self.viewer.state().current_page != page_before {
            self.page_scroll = 0;
        }
    }

    fn handle_chat_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Tab | KeyCode::Esc => self.focus = Focus::Viewer,
            _ if self.chat.is_awaiting_reply() => {}
            KeyCode::Enter => self.submit_chat(),
            KeyCode::Backspace => self.chat.backspace(),
            KeyCode::Char(c) => self.chat.push_char(c),
            _ => {}
        }
    }

    fn submit_chat(&mut self) {
        let Some(reference) = self.viewer.reference().cloned() else {
            debug!("Chat submit ignored: no document");
            return;
        };
        let page = self.viewer.state().current_page;
        let outcome = self.chat.submit(&reference, page);
        debug!("Chat submit: {outcome:?}");
        if outcome == SendOutcome::Busy {
            debug!("Reply still pending, message kept in input");
        }
    }

    fn scroll_page(&mut self, delta: i16) {
        let max = self.page_rows.saturating_sub(1);
        self.page_scroll = self.page_scroll.saturating_add_signed(delta).min(max);
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let palette = current_theme();
        let area = f.area();

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(area);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[0]);

        self.draw_viewer(f, columns[0], palette);
        chat_view::render_chat(f, columns[1], &self.chat, self.focus == Focus::Chat, palette);
        self.draw_help(f, rows[1], palette);
    }

    fn draw_viewer(&mut self, f: &mut Frame, area: Rect, palette: &Base16Palette) {
        let border = if self.focus == Focus::Viewer {
            palette.base_0c
        } else {
            palette.base_02
        };
        let block = Block::default()
            .title(" Document ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border));
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);
        let page_area = chunks[0];
        let status_area = chunks[1];

        let container_px = u32::from(page_area.width) * u32::from(self.config.cell_size.width);
        self.viewer.set_container_width(container_px);

        match self.viewer.phase() {
            Phase::NoDocument => {
                self.draw_message(f, page_area, NO_DOCUMENT_TEXT, palette.base_08);
            }
            Phase::Failed => {
                let text = self.viewer.load_error().map_or_else(
                    || "No document: loading failed.".to_string(),
                    |e| format!("No document: {e}"),
                );
                self.draw_message(f, page_area, &text, palette.base_08);
            }
            Phase::Unmounted => {}
            Phase::Idle | Phase::DocumentLoading => {
                let text = format!("{} Loading document...", self.spinner());
                self.draw_message(f, page_area, &text, palette.base_04);
            }
            Phase::DocumentReady => {
                self.draw_page(f, page_area, palette);
                self.draw_status(f, status_area, palette);
            }
        }
    }

    fn draw_page(&mut self, f: &mut Frame, area: Rect, palette: &Base16Palette) {
        let surface = self.viewer.surface();
        if surface.is_valid() {
            let cells = self.page_cache.cells(
                surface,
                self.viewer.committed_renders(),
                self.config.cell_size,
            );
            self.page_rows = PageView::rows(cells);
            self.page_scroll = self.page_scroll.min(self.page_rows.saturating_sub(1));
            f.render_widget(PageView::new(cells, self.page_scroll), area);
        } else if let Some(error) = self.viewer.page_error() {
            let text = format!("Could not render page: {error}");
            self.draw_message(f, area, &text, palette.base_08);
        }
    }

    fn draw_status(&self, f: &mut Frame, area: Rect, palette: &Base16Palette) {
        let state = self.viewer.state();
        let mut spans = vec![Span::styled(
            format!(
                "Page {} of {} \u{b7} zoom {}%",
                state.current_page,
                state.page_count,
                state.zoom.percent()
            ),
            Style::default().fg(palette.base_05),
        )];
        if state.is_page_loading {
            spans.push(Span::styled(
                format!("  {} rendering\u{2026}", self.spinner()),
                Style::default().fg(palette.base_0a),
            ));
        } else if self.viewer.page_error().is_some() {
            spans.push(Span::styled(
                "  render failed - change page or zoom to retry",
                Style::default().fg(palette.base_08),
            ));
        }
        f.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_message(&self, f: &mut Frame, area: Rect, text: &str, color: ratatui::style::Color) {
        let paragraph = Paragraph::new(text.to_string())
            .style(Style::default().fg(color))
            .alignment(ratatui::layout::Alignment::Center)
            .wrap(Wrap { trim: true });
        let y = area.y + area.height / 2;
        let line_area = Rect::new(area.x, y, area.width, area.bottom().saturating_sub(y));
        f.render_widget(paragraph, line_area);
    }

    fn draw_help(&self, f: &mut Frame, area: Rect, palette: &Base16Palette) {
        let enabled = Style::default().fg(palette.base_04);
        let disabled = Style::default()
            .fg(palette.base_02)
            .add_modifier(Modifier::DIM);

        let spans = match self.focus {
            Focus::Viewer => {
                let state = self.viewer.state();
                let ready = self.viewer.phase() == Phase::DocumentReady;
                let prev = if ready && !state.is_first_page() {
                    enabled
                } else {
                    disabled
                };
                let next = if ready && !state.is_last_page() {
                    enabled
                } else {
                    disabled
                };
                vec![
                    Span::styled("p: Previous", prev),
                    Span::styled(" | ", enabled),
                    Span::styled("n: Next", next),
                    Span::styled(" | +/-/0: Zoom | j/k: Scroll | Tab: Chat | q: Quit", enabled),
                ]
            }
            Focus::Chat => vec![Span::styled(
                "Enter: Send | Esc/Tab: Document | Ctrl+C: Quit",
                enabled,
            )],
        };
        f.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn spinner(&self) -> &'static str {
        SPINNER[self.tick_count % SPINNER.len()]
    }

    #[must_use]
    pub fn viewer(&self) -> &ViewerController {
        &self.viewer
    }

    #[must_use]
    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    #[must_use]
    pub fn focus(&self) -> Focus {
        self.focus
    }

    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }
}

impl Drop for ViewerChatScreen {
    fn drop(&mut self) {
        self.viewer.unmount();
        info!("Screen unmounted");
    }
}

/// Drive the screen until it asks to quit
pub fn run_screen_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    screen: &mut ViewerChatScreen,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let tick_rate = Duration::from_millis(50);
    let mut needs_redraw = true;

    loop {
        if screen.tick() {
            needs_redraw = true;
        }
        if needs_redraw {
            terminal.draw(|f| screen.draw(f))?;
            needs_redraw = false;
        }

        let mut events_processed = 0;
        if event_source.poll(tick_rate)? {
            while events_processed < 50 {
                let event = event_source.read()?;
                events_processed += 1;
                screen.handle_event(&event);
                if screen.should_quit() || !event_source.poll(Duration::ZERO)? {
                    break;
                }
            }
            needs_redraw = true;
        }

        if screen.should_quit() {
            return Ok(());
        }
    }
}
