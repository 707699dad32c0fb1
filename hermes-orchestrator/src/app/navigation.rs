//! Key handling and view navigation

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::*;

impl App {
    pub async fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        // Blocking errors swallow every key until dismissed
        if self.modal_error.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q')) {
                self.modal_error = None;
            }
            return;
        }

        if self.is_editing {
            self.handle_input_key(key).await;
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Char('n') | KeyCode::Char('i') => self.begin_editing(),
            KeyCode::Char('1') => self.switch_view(View::Status),
            KeyCode::Char('2') => self.switch_view(View::Output),
            KeyCode::Char('3') | KeyCode::Char('c') => {
                self.switch_view(View::Constitution);
                let needs_fetch = matches!(
                    *lock(&self.constitution),
                    ConstitutionState::Idle | ConstitutionState::Failed(_)
                );
                if needs_fetch {
                    self.request_constitution();
                }
            }
            KeyCode::Char('r') if self.current_view == View::Constitution => {
                self.request_constitution()
            }
            KeyCode::Tab => self.next_view(),
            KeyCode::Down | KeyCode::Char('j') => self.scroll_down(1),
            KeyCode::Up | KeyCode::Char('k') => self.scroll_up(1),
            KeyCode::PageDown => self.scroll_down(10),
            KeyCode::PageUp => self.scroll_up(10),
            KeyCode::Char('x') => self.notifications.dismiss_latest(),
            _ => {}
        }
    }

    async fn handle_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                let description = std::mem::take(&mut self.input);
                self.is_editing = false;
                self.start_workflow(&description).await;
            }
            KeyCode::Esc => {
                self.input.clear();
                self.is_editing = false;
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
    }

    pub fn begin_editing(&mut self) {
        self.is_editing = true;
        self.input.clear();
    }

    pub fn switch_view(&mut self, view: View) {
        if self.current_view != view {
            self.current_view = view;
            self.scroll_offset = 0;
        }
    }

    pub fn next_view(&mut self) {
        let next = match self.current_view {
            View::Status => View::Output,
            View::Output => View::Constitution,
            View::Constitution => View::Status,
        };
        self.switch_view(next);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }
}
