use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use diffnav::action::Action;
use diffnav::keymap::{self, Command};
use diffnav::viewer::DiffViewer;

use crate::event::Event;

pub struct App {
    pub viewer: DiffViewer,
    /// One-off feedback such as "Copied URL".
    pub status: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(viewer: DiffViewer) -> Self {
        Self {
            viewer,
            status: None,
            should_quit: false,
        }
    }

    pub fn handle_event(&self, event: Event) -> Action {
        match event {
            Event::Key(key) => self.handle_key(key),
            _ => Action::None,
        }
    }

    fn handle_key(&self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('d') => Action::PageDown,
                KeyCode::Char('u') => Action::PageUp,
                _ => Action::None,
            };
        }

        match key.code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Esc => {
                if self.viewer.banner().is_some() {
                    Action::DismissBanner
                } else {
                    Action::Quit
                }
            }
            KeyCode::Down => Action::ScrollDown,
            KeyCode::Up => Action::ScrollUp,
            KeyCode::PageDown => Action::PageDown,
            KeyCode::PageUp => Action::PageUp,
            KeyCode::Backspace => Action::Back,
            KeyCode::Enter => Action::Command(Command::Recenter),
            KeyCode::Char('y') => Action::YankUrl,
            KeyCode::Char('o') => Action::OpenInBrowser,
            KeyCode::Char('w') => Action::ToggleWhitespace,
            KeyCode::Char('e') => Action::ShowDeleted,
            KeyCode::Char('}') => Action::NextPage,
            KeyCode::Char('{') => Action::PreviousPage,
            KeyCode::Char(c @ '1'..='9') => {
                let tip = c.to_digit(10).unwrap_or(1);
                if tip <= self.viewer.latest_revision() {
                    Action::SelectRevision { base: 0, tip }
                } else {
                    Action::None
                }
            }
            KeyCode::Char(c) => keymap::command_for_char(c)
                .map(Action::Command)
                .unwrap_or(Action::None),
            _ => Action::None,
        }
    }

    pub fn update(&mut self, action: Action) {
        if !matches!(action, Action::FragmentLoaded { .. } | Action::ContextLoaded { .. }) {
            self.status = None;
        }

        match action {
            Action::Quit => {
                self.should_quit = true;
            }
            Action::YankUrl => self.yank_url(),
            Action::OpenInBrowser => {
                if let Some(url) = self.viewer.web_url() {
                    if let Err(e) = open::that(&url) {
                        self.viewer.error = Some(format!("Could not open browser: {}", e));
                    }
                }
            }
            action => self.viewer.update(action),
        }
    }

    fn yank_url(&mut self) {
        let Some(url) = self.viewer.web_url() else {
            return;
        };
        match arboard::Clipboard::new() {
            Ok(mut clipboard) => {
                if let Err(e) = clipboard.set_text(url.clone()) {
                    self.viewer.error = Some(format!("Clipboard error: {}", e));
                } else {
                    self.status = Some(format!("Copied {}", url));
                }
            }
            Err(e) => {
                self.viewer.error = Some(format!("Clipboard unavailable: {}", e));
            }
        }
    }
}
