//! UI rendering for the Hermes TUI
//!
//! Rendering only reads from [`App`]; every surface is a projection of the
//! status board snapshot or of the constitution fetch result.

use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use crate::app::{App, View};

mod components;
mod constitution_view;
mod header_footer;
mod notifications;
mod status_view;

pub use components::{centered_rect, render_error_modal, render_input_box, render_progress_popup};
pub use constitution_view::render_constitution;
pub use header_footer::{render_footer, render_header, render_status_bar};
pub use notifications::render_notifications;
pub use status_view::{render_output, render_status};

/// Main UI rendering function
pub fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, chunks[0], app);

    match app.current_view {
        View::Status => render_status(f, chunks[1], app),
        View::Output => render_output(f, chunks[1], app),
        View::Constitution => render_constitution(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
    render_footer(f, chunks[3], app);

    // Overlays, lowest first
    render_progress_popup(f, chunks[1], app);
    render_notifications(f, app, chunks[1]);

    if app.is_editing {
        render_input_box(f, f.area(), app);
    }

    if let Some(message) = &app.modal_error {
        render_error_modal(f, f.area(), message);
    }
}
