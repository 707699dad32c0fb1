//! Header, footer and status bar rendering

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use hermes_sdk::WorkflowStatus;

use crate::app::{App, View};

pub fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let title = match app.current_view {
        View::Status => "Hermes v0.1.0 - Workflow Status",
        View::Output => "Hermes v0.1.0 - Agent Output",
        View::Constitution => "Hermes v0.1.0 - Project Constitution",
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("      "),
        Span::styled("[Q]", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("uit"),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

/// One-line indicator fed by the push subscription
pub fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let indicator = app
        .indicator
        .lock()
        .map(|indicator| indicator.clone())
        .unwrap_or_default();

    let color = match indicator.status {
        None => Color::DarkGray,
        Some(WorkflowStatus::Pending) => Color::Yellow,
        Some(WorkflowStatus::Running) => Color::Cyan,
        Some(WorkflowStatus::Completed) => Color::Green,
        Some(WorkflowStatus::Failed) => Color::Red,
    };

    let bar = Paragraph::new(Line::from(vec![
        Span::styled(" ● ", Style::default().fg(color)),
        Span::styled(indicator.text, Style::default().fg(color)),
    ]));
    f.render_widget(bar, area);
}

pub fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let key = |k: &'static str| Span::styled(k, Style::default().add_modifier(Modifier::BOLD));

    let footer_text = if app.is_editing {
        Line::from(vec![
            Span::styled(
                "TYPE",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" a task  "),
            key("[Enter]"),
            Span::raw(" Start  "),
            key("[Esc]"),
            Span::raw(" Cancel  "),
            key("[Backspace]"),
            Span::raw(" Delete"),
        ])
    } else {
        let mut spans = vec![
            key("[N]"),
            Span::raw(" New task  "),
            key("[1/2/3]"),
            Span::raw(" Status/Output/Constitution  "),
            key("[Tab]"),
            Span::raw(" Switch  "),
        ];
        match app.current_view {
            View::Status => {}
            View::Output => {
                spans.push(key("[↑↓/jk]"));
                spans.push(Span::raw(" Scroll  "));
            }
            View::Constitution => {
                spans.push(key("[↑↓/jk]"));
                spans.push(Span::raw(" Scroll  "));
                spans.push(key("[R]"));
                spans.push(Span::raw(" Refresh  "));
            }
        }
        spans.push(key("[X]"));
        spans.push(Span::raw(" Dismiss  "));
        spans.push(key("[Q]"));
        spans.push(Span::raw(" Quit"));
        Line::from(spans)
    };

    let footer = Paragraph::new(footer_text).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}
