use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::chat::{ChatSession, Role};
use crate::theme::Base16Palette;

const INPUT_PLACEHOLDER: &str = "Ask about the document...";

/// Wrap the transcript to `width` columns and keep the newest `height` lines
fn transcript_lines(
    session: &ChatSession,
    width: usize,
    height: usize,
    palette: &Base16Palette,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let width = width.max(8);

    for message in session.transcript().iter() {
        let (label, color) = match message.role {
            Role::User => ("You", palette.base_0d),
            Role::Assistant => ("Assistant", palette.base_0b),
        };
        lines.push(Line::from(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        for wrapped in textwrap::wrap(&message.content, width) {
            lines.push(Line::from(Span::styled(
                format!("  {wrapped}"),
                Style::default().fg(palette.base_05),
            )));
        }
        lines.push(Line::default());
    }

    if session.is_awaiting_reply() {
        lines.push(Line::from(Span::styled(
            "Assistant is typing...",
            Style::default()
                .fg(palette.base_03)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    let skip = lines.len().saturating_sub(height);
    lines.split_off(skip)
}

pub fn render_chat(
    f: &mut Frame,
    area: Rect,
    session: &ChatSession,
    focused: bool,
    palette: &Base16Palette,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let border = if focused {
        palette.base_0c
    } else {
        palette.base_02
    };

    let inner_width = usize::from(chunks[0].width.saturating_sub(4));
    let inner_height = usize::from(chunks[0].height.saturating_sub(2));
    let transcript = Paragraph::new(transcript_lines(session, inner_width, inner_height, palette))
        .block(
            Block::default()
                .title(" Chat ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        );
    f.render_widget(transcript, chunks[0]);

    let input_style = if session.is_awaiting_reply() {
        Style::default().fg(palette.base_03)
    } else {
        Style::default().fg(palette.base_05)
    };
    let input_text = if session.pending_input().is_empty() && !focused {
        Span::styled(INPUT_PLACEHOLDER, Style::default().fg(palette.base_03))
    } else {
        Span::styled(session.pending_input().to_string(), input_style)
    };
    let input = Paragraph::new(Line::from(vec![Span::raw("> "), input_text])).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border)),
    );
    f.render_widget(input, chunks[1]);

    if focused && !session.is_awaiting_reply() {
        let typed = u16::try_from(session.pending_input().chars().count()).unwrap_or(u16::MAX);
        let x = chunks[1]
            .x
            .saturating_add(3)
            .saturating_add(typed)
            .min(chunks[1].right().saturating_sub(2));
        f.set_cursor_position((x, chunks[1].y + 1));
    }
}
