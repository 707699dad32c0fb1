//! Overlays and helpers shared by the views

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame,
};

use crate::app::App;

/// Transient progress report, shown in the top right while a run is active
pub fn render_progress_popup(f: &mut Frame, area: Rect, app: &App) {
    let update = match app.progress.lock() {
        Ok(guard) => match guard.as_ref() {
            Some(update) => update.clone(),
            None => return,
        },
        Err(_) => return,
    };

    let width = area.width.min(50);
    let popup = Rect {
        x: area.right().saturating_sub(width + 1),
        y: area.y + 1,
        width,
        height: 3.min(area.height),
    };

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Running Hermes Workflow "),
        )
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
        .percent(u16::from(update.progress.min(100)))
        .label(format!("{} ({}%)", update.message, update.progress));

    f.render_widget(Clear, popup);
    f.render_widget(gauge, popup);
}

/// Task description prompt
pub fn render_input_box(f: &mut Frame, area: Rect, app: &App) {
    let popup = centered_rect(70, 20, area);
    let popup = Rect {
        height: popup.height.max(3),
        ..popup
    };

    let input = Paragraph::new(Line::from(vec![
        Span::raw(app.input.as_str()),
        Span::styled("█", Style::default().fg(Color::Yellow)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Describe the coding task "),
    )
    .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup);
    f.render_widget(input, popup);
}

/// Blocking error, dismissed with Enter or Esc
pub fn render_error_modal(f: &mut Frame, area: Rect, message: &str) {
    let popup = centered_rect(60, 30, area);

    let mut lines = vec![Line::from(Span::styled(
        "✗ Cannot start workflow",
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    ))];
    lines.push(Line::from(""));
    lines.extend(message.lines().map(|l| Line::from(l.to_string())));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "[Enter/Esc] Dismiss",
        Style::default().fg(Color::DarkGray),
    )));

    let modal = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" Error "),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(Clear, popup);
    f.render_widget(modal, popup);
}

/// Helper to create a centered rect
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
