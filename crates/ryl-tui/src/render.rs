//! Renders the transcript and the prompt.
//!
//! Pure view over [`AppState`]: one paragraph, bottom-anchored so the
//! prompt is always in view. Frozen blocks get `>>> ` / `... ` gutters,
//! results render as ` => value` lines, stderr and errors in red, and
//! recovered protocol failures get their own marker style.

use ratatui::Frame;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ryl_core::{ResultKind, StreamKind, TranscriptItem};
use unicode_width::UnicodeWidthStr;

use crate::state::AppState;

const HEAD_GUTTER: &str = ">>> ";
const CONT_GUTTER: &str = "... ";

pub fn draw(frame: &mut Frame, app: &AppState) {
    let area = frame.area();
    let mut lines = transcript_lines(app);
    let prompt_start = lines.len();
    prompt_lines(app, &mut lines);

    let total = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    let scroll = total.saturating_sub(area.height);
    frame.render_widget(Paragraph::new(lines).scroll((scroll, 0)), area);

    if let Some((x, y)) = cursor_position(app, prompt_start) {
        let y = y.saturating_sub(usize::from(scroll));
        if let (Ok(x), Ok(y)) = (u16::try_from(x), u16::try_from(y))
            && y < area.height
        {
            frame.set_cursor_position((x, y));
        }
    }
}

fn transcript_lines(app: &AppState) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for item in app.session.transcript().items() {
        match item {
            TranscriptItem::Block(block) => {
                for (n, text) in block.lines.iter().enumerate() {
                    let gutter = if n == 0 { HEAD_GUTTER } else { CONT_GUTTER };
                    lines.push(Line::from(vec![
                        Span::styled(gutter.to_string(), Style::default().fg(Color::DarkGray)),
                        Span::raw(text.clone()),
                    ]));
                }
                if let Some(result) = &block.result {
                    let style = match block.result_kind {
                        ResultKind::Error => Style::default().fg(Color::Red),
                        ResultKind::Value | ResultKind::None => {
                            Style::default().fg(Color::Cyan)
                        }
                    };
                    for (n, part) in result.split('\n').enumerate() {
                        let prefix = if n == 0 { " => " } else { "    " };
                        lines.push(Line::styled(format!("{prefix}{part}"), style));
                    }
                }
            }
            TranscriptItem::Stream { kind, text } => {
                let style = match kind {
                    StreamKind::Out => Style::default(),
                    StreamKind::Err => Style::default().fg(Color::Red),
                };
                push_text(&mut lines, text, style);
            }
            TranscriptItem::ProtocolFailure { note } => {
                lines.push(Line::styled(
                    format!("!! {note}"),
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                ));
            }
        }
    }
    lines
}

fn prompt_lines(app: &AppState, lines: &mut Vec<Line<'static>>) {
    if let Some(prompt) = &app.input_prompt {
        let text = app
            .editor
            .active()
            .map(crate::editor::TextBuffer::text)
            .unwrap_or_default();
        lines.push(Line::from(vec![
            Span::styled(
                prompt.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(text),
        ]));
        return;
    }
    if let Some(buffer) = app.editor.active() {
        for (n, text) in buffer.lines().iter().enumerate() {
            let gutter = if n == 0 { HEAD_GUTTER } else { CONT_GUTTER };
            lines.push(Line::from(vec![
                Span::styled(gutter.to_string(), Style::default().fg(Color::Green)),
                Span::raw(text.clone()),
            ]));
        }
    } else if app.awaiting() {
        lines.push(Line::styled(
            "...".to_string(),
            Style::default().fg(Color::DarkGray),
        ));
    }
}

/// Cursor cell within the composed lines, before scrolling.
fn cursor_position(app: &AppState, prompt_start: usize) -> Option<(usize, usize)> {
    let buffer = app.editor.active()?;
    let (row, col) = buffer.cursor();
    let before: String = buffer.lines()[row].chars().take(col).collect();
    let gutter_width = match &app.input_prompt {
        Some(prompt) => prompt.width(),
        None => HEAD_GUTTER.len(),
    };
    Some((gutter_width + before.width(), prompt_start + row))
}

fn push_text(lines: &mut Vec<Line<'static>>, text: &str, style: Style) {
    let trimmed = text.strip_suffix('\n').unwrap_or(text);
    for part in trimmed.split('\n') {
        lines.push(Line::styled(part.to_string(), style));
    }
}
