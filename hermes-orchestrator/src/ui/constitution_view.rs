//! Project constitution view

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, ConstitutionState};

pub fn render_constitution(f: &mut Frame, area: Rect, app: &App) {
    let state = app
        .constitution
        .lock()
        .map(|state| state.clone())
        .unwrap_or(ConstitutionState::Idle);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Constitution: {} ", app.project_root.display()));

    let paragraph = match state {
        ConstitutionState::Idle => Paragraph::new(Line::from(Span::styled(
            "Press [R] to generate the project constitution",
            Style::default().fg(Color::DarkGray),
        ))),
        ConstitutionState::Loading => Paragraph::new(Line::from(Span::styled(
            "Generating constitution...",
            Style::default().fg(Color::Yellow),
        ))),
        ConstitutionState::Ready(text) => Paragraph::new(
            text.lines()
                .map(markdown_line)
                .collect::<Vec<_>>(),
        )
        .scroll((app.scroll_offset, 0)),
        ConstitutionState::Failed(error) => {
            let mut lines = vec![
                Line::from(Span::styled(
                    "✗ Failed to generate constitution",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
            ];
            lines.extend(error.lines().map(|l| Line::from(l.to_string())));
            Paragraph::new(lines)
        }
    };

    f.render_widget(paragraph.block(block).wrap(Wrap { trim: false }), area);
}

/// Headings stand out; everything else is shown verbatim
fn markdown_line(line: &str) -> Line<'static> {
    if line.starts_with('#') {
        Line::from(Span::styled(
            line.to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
    } else {
        Line::from(line.to_string())
    }
}
