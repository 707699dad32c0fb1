//! Status tree and agent output views

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use hermes_sdk::OutputStream;

use crate::app::{App, NodeState, TreeRow};

/// Lines of output shown under the status tree
const OUTPUT_TAIL: usize = 8;

pub fn render_status(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(OUTPUT_TAIL as u16 + 2)])
        .split(area);

    // Poll-driven, so it may lag the indicator by up to one interval
    let rows = app
        .status_tree
        .lock()
        .map(|rows| rows.clone())
        .unwrap_or_default();

    let items: Vec<ListItem> = rows.iter().map(tree_item).collect();
    let tree = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Hermes Workflow "),
    );
    f.render_widget(tree, chunks[0]);

    let tail: Vec<Line> = app
        .orchestrator
        .recent_output(Some(OUTPUT_TAIL))
        .into_iter()
        .map(|line| output_line(line.stream, line.line))
        .collect();
    let output = Paragraph::new(tail).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Latest Output "),
    );
    f.render_widget(output, chunks[1]);
}

pub fn render_output(f: &mut Frame, area: Rect, app: &App) {
    let lines: Vec<Line> = app
        .orchestrator
        .recent_output(None)
        .into_iter()
        .map(|line| output_line(line.stream, line.line))
        .collect();

    let title = format!(" Agent Output ({} lines) ", lines.len());
    let output = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .scroll((app.scroll_offset, 0));
    f.render_widget(output, area);
}

fn tree_item(row: &TreeRow) -> ListItem<'static> {
    let (icon, color) = match row.state {
        NodeState::Info => ("•", Color::Gray),
        NodeState::Waiting => ("○", Color::DarkGray),
        NodeState::Active => ("▶", Color::Cyan),
        NodeState::Done => ("✓", Color::Green),
        NodeState::Failed => ("✗", Color::Red),
    };

    let label_style = if row.depth == 0 {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(color)
    };

    let mut spans = vec![
        Span::raw("  ".repeat(row.depth)),
        Span::styled(format!("{} ", icon), Style::default().fg(color)),
        Span::styled(row.label.clone(), label_style),
    ];
    if let Some(detail) = &row.detail {
        spans.push(Span::styled(
            format!("  {}", detail),
            Style::default().fg(Color::DarkGray),
        ));
    }
    ListItem::new(Line::from(spans))
}

fn output_line(stream: OutputStream, text: String) -> Line<'static> {
    match stream {
        OutputStream::Stdout => Line::from(text),
        OutputStream::Stderr => Line::from(Span::styled(text, Style::default().fg(Color::Red))),
    }
}
