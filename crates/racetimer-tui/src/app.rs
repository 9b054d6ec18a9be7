//! Application state management

use crossterm::event::KeyCode;
use racetimer_client::store::StoreError;
use racetimer_client::sync::{Command, CommandEvent, Confirmation};
use racetimer_core::clock::{format_countdown, format_elapsed};
use racetimer_core::models::{DisplayState, Roster, RosterEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Role {
    /// Can start, stop and reset the stopwatch and edit the roster
    Admin,
    /// Read-only display
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    AddName,
    AddCar,
    AddTeam,
    ConfirmReset,
    ConfirmDelete,
    ConfirmClear,
}

impl InputMode {
    pub fn is_text_input(&self) -> bool {
        matches!(self, InputMode::AddName | InputMode::AddCar | InputMode::AddTeam)
    }

    pub fn is_confirmation(&self) -> bool {
        matches!(
            self,
            InputMode::ConfirmReset | InputMode::ConfirmDelete | InputMode::ConfirmClear
        )
    }
}

/// Work the main loop performs on behalf of a key press
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Start,
    Stop,
    Reset(Confirmation),
    AddDriver(RosterEntry),
    DeleteDriver(String),
    ClearRoster,
}

#[derive(Debug, Default)]
struct DriverDraft {
    name: String,
    car: String,
}

pub struct App {
    pub role: Role,
    pub display: DisplayState,
    /// Seconds left before a pending start is written
    pub countdown: Option<u32>,
    pub roster: Vec<(String, RosterEntry)>,
    pub roster_available: bool,
    pub selected_index: usize,
    pub input_mode: InputMode,
    pub input_buffer: String,
    draft: DriverDraft,
    pub status_message: String,
    pub should_quit: bool,
}

impl App {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            display: DisplayState::default(),
            countdown: None,
            roster: Vec::new(),
            roster_available: true,
            selected_index: 0,
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            draft: DriverDraft::default(),
            status_message: String::new(),
            should_quit: false,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn formatted_time(&self) -> String {
        format_elapsed(self.display.displayed_ms)
    }

    pub fn set_display(&mut self, display: DisplayState) {
        self.display = display;
    }

    pub fn apply_roster(&mut self, roster: Roster) {
        self.roster = roster.into_iter().collect();
        self.roster_available = true;
        if self.selected_index >= self.roster.len() {
            self.selected_index = self.roster.len().saturating_sub(1);
        }
    }

    /// Keep the last roster on screen and flag it as stale
    pub fn roster_unavailable(&mut self, error: &StoreError) {
        tracing::warn!("Roster subscription error: {}", error);
        self.roster_available = false;
    }

    pub fn selected_entry(&self) -> Option<&(String, RosterEntry)> {
        self.roster.get(self.selected_index)
    }

    pub fn select_next(&mut self) {
        if !self.roster.is_empty() {
            self.selected_index = (self.selected_index + 1).min(self.roster.len() - 1);
        }
    }

    pub fn select_previous(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    pub fn countdown_text(&self) -> Option<String> {
        self.countdown.map(format_countdown)
    }

    pub fn apply_command_event(&mut self, event: CommandEvent) {
        match event {
            CommandEvent::CountdownTick { remaining } => {
                self.countdown = Some(remaining);
                self.status_message = format_countdown(remaining);
            }
            CommandEvent::Applied { command, .. } => {
                self.clear_countdown(command);
                self.status_message = match command {
                    Command::Start => "Timer started".to_string(),
                    Command::Stop => "Timer stopped".to_string(),
                    Command::Reset => "Timer reset".to_string(),
                };
            }
            CommandEvent::Skipped { command } => {
                self.clear_countdown(command);
                self.status_message = match command {
                    Command::Start => "Timer is already running".to_string(),
                    Command::Stop => "Timer is not running".to_string(),
                    Command::Reset => String::new(),
                };
            }
            CommandEvent::Aborted { command } => {
                self.clear_countdown(command);
                self.status_message = "Cancelled".to_string();
            }
            CommandEvent::Failed { command, message } => {
                self.clear_countdown(command);
                self.status_message = format!("Could not {}: {}", command, message);
            }
        }
    }

    fn clear_countdown(&mut self, command: Command) {
        if command == Command::Start {
            self.countdown = None;
        }
    }

    /// Update state for a key press and return the work it asks for
    pub fn handle_key(&mut self, code: KeyCode) -> Option<Action> {
        if self.input_mode.is_text_input() {
            return self.handle_text_key(code);
        }
        if self.input_mode.is_confirmation() {
            return self.handle_confirmation_key(code);
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.select_next();
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.select_previous();
                None
            }
            KeyCode::Char(c @ ('s' | 'x' | 'r' | 'a' | 'd' | 'C')) => {
                if !self.is_admin() {
                    self.status_message = "Read-only viewer".to_string();
                    return None;
                }
                self.handle_admin_key(c)
            }
            _ => None,
        }
    }

    fn handle_admin_key(&mut self, c: char) -> Option<Action> {
        self.status_message.clear();
        match c {
            's' => Some(Action::Start),
            'x' => Some(Action::Stop),
            'r' => {
                self.input_mode = InputMode::ConfirmReset;
                None
            }
            'a' => {
                self.draft = DriverDraft::default();
                self.input_buffer.clear();
                self.input_mode = InputMode::AddName;
                None
            }
            'd' => {
                if self.selected_entry().is_some() {
                    self.input_mode = InputMode::ConfirmDelete;
                } else {
                    self.status_message = "No driver selected".to_string();
                }
                None
            }
            'C' => {
                if self.roster.is_empty() {
                    self.status_message = "Roster is already empty".to_string();
                } else {
                    self.input_mode = InputMode::ConfirmClear;
                }
                None
            }
            _ => None,
        }
    }

    fn handle_confirmation_key(&mut self, code: KeyCode) -> Option<Action> {
        let confirmed = match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => true,
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => false,
            _ => return None,
        };

        let mode = self.input_mode;
        self.input_mode = InputMode::Normal;

        match (mode, confirmed) {
            (InputMode::ConfirmReset, true) => Some(Action::Reset(Confirmation::Confirmed)),
            (InputMode::ConfirmReset, false) => Some(Action::Reset(Confirmation::Declined)),
            (InputMode::ConfirmDelete, true) => self
                .selected_entry()
                .map(|(key, _)| Action::DeleteDriver(key.clone())),
            (InputMode::ConfirmClear, true) => Some(Action::ClearRoster),
            _ => {
                self.status_message = "Cancelled".to_string();
                None
            }
        }
    }

    fn handle_text_key(&mut self, code: KeyCode) -> Option<Action> {
        match code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
                self.status_message = "Cancelled".to_string();
                None
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
                None
            }
            KeyCode::Char(c) => {
                self.input_buffer.push(c);
                None
            }
            KeyCode::Enter => self.submit_input(),
            _ => None,
        }
    }

    fn submit_input(&mut self) -> Option<Action> {
        let value = self.input_buffer.trim().to_string();
        if value.is_empty() {
            self.status_message = format!("{} is required", self.input_prompt());
            return None;
        }
        self.input_buffer.clear();
        self.status_message.clear();

        match self.input_mode {
            InputMode::AddName => {
                self.draft.name = value;
                self.input_mode = InputMode::AddCar;
                None
            }
            InputMode::AddCar => {
                self.draft.car = value;
                self.input_mode = InputMode::AddTeam;
                None
            }
            InputMode::AddTeam => {
                self.input_mode = InputMode::Normal;
                let draft = std::mem::take(&mut self.draft);
                match RosterEntry::new(&draft.name, &draft.car, &value) {
                    Ok(entry) => Some(Action::AddDriver(entry)),
                    Err(e) => {
                        self.status_message = e.to_string();
                        None
                    }
                }
            }
            _ => None,
        }
    }

    pub fn input_prompt(&self) -> &'static str {
        match self.input_mode {
            InputMode::AddName => "Driver name",
            InputMode::AddCar => "Car number",
            InputMode::AddTeam => "Team",
            _ => "Input",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use racetimer_core::models::TimerRecord;

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            assert_eq!(app.handle_key(KeyCode::Char(c)), None);
        }
    }

    fn roster_with(names: &[&str]) -> Roster {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                (
                    format!("key-{}", i),
                    RosterEntry::new(name, &i.to_string(), "Team").unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_viewer_cannot_issue_commands() {
        let mut app = App::new(Role::Viewer);
        for c in ['s', 'x', 'r', 'a', 'd', 'C'] {
            assert_eq!(app.handle_key(KeyCode::Char(c)), None);
            assert_eq!(app.input_mode, InputMode::Normal);
        }
        assert_eq!(app.status_message, "Read-only viewer");
    }

    #[test]
    fn test_start_and_stop_keys() {
        let mut app = App::new(Role::Admin);
        assert_eq!(app.handle_key(KeyCode::Char('s')), Some(Action::Start));
        assert_eq!(app.handle_key(KeyCode::Char('x')), Some(Action::Stop));
    }

    #[test]
    fn test_reset_confirmation() {
        let mut app = App::new(Role::Admin);
        assert_eq!(app.handle_key(KeyCode::Char('r')), None);
        assert_eq!(app.input_mode, InputMode::ConfirmReset);

        // Unrelated keys leave the prompt open
        assert_eq!(app.handle_key(KeyCode::Char('s')), None);
        assert_eq!(app.input_mode, InputMode::ConfirmReset);

        assert_eq!(
            app.handle_key(KeyCode::Char('n')),
            Some(Action::Reset(Confirmation::Declined))
        );
        assert_eq!(app.input_mode, InputMode::Normal);

        app.handle_key(KeyCode::Char('r'));
        assert_eq!(
            app.handle_key(KeyCode::Char('y')),
            Some(Action::Reset(Confirmation::Confirmed))
        );
    }

    #[test]
    fn test_add_driver_prompts() {
        let mut app = App::new(Role::Admin);
        app.handle_key(KeyCode::Char('a'));
        assert_eq!(app.input_mode, InputMode::AddName);

        // Blank input is refused
        app.handle_key(KeyCode::Char(' '));
        assert_eq!(app.handle_key(KeyCode::Enter), None);
        assert_eq!(app.input_mode, InputMode::AddName);
        assert_eq!(app.status_message, "Driver name is required");
        app.handle_key(KeyCode::Backspace);

        type_text(&mut app, "Charles");
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.input_mode, InputMode::AddCar);

        type_text(&mut app, "16");
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.input_mode, InputMode::AddTeam);

        type_text(&mut app, "Ferrari ");
        match app.handle_key(KeyCode::Enter) {
            Some(Action::AddDriver(entry)) => {
                assert_eq!(entry.name, "Charles");
                assert_eq!(entry.car, "16");
                assert_eq!(entry.team, "Ferrari");
            }
            other => panic!("Expected AddDriver, got {:?}", other),
        }
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_add_driver_escape_cancels() {
        let mut app = App::new(Role::Admin);
        app.handle_key(KeyCode::Char('a'));
        type_text(&mut app, "George");
        assert_eq!(app.handle_key(KeyCode::Esc), None);
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.input_buffer.is_empty());
        assert!(!app.should_quit);
    }

    #[test]
    fn test_delete_selected_driver() {
        let mut app = App::new(Role::Admin);
        assert_eq!(app.handle_key(KeyCode::Char('d')), None);
        assert_eq!(app.status_message, "No driver selected");

        app.apply_roster(roster_with(&["A", "B", "C"]));
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Down);
        assert_eq!(app.selected_index, 2);

        app.handle_key(KeyCode::Char('d'));
        assert_eq!(app.input_mode, InputMode::ConfirmDelete);
        assert_eq!(
            app.handle_key(KeyCode::Char('y')),
            Some(Action::DeleteDriver("key-2".to_string()))
        );

        // Selection follows a shrinking roster
        app.apply_roster(roster_with(&["A"]));
        assert_eq!(app.selected_index, 0);
    }

    #[test]
    fn test_clear_roster_needs_confirmation() {
        let mut app = App::new(Role::Admin);
        app.handle_key(KeyCode::Char('C'));
        assert_eq!(app.input_mode, InputMode::Normal);

        app.apply_roster(roster_with(&["A", "B"]));
        app.handle_key(KeyCode::Char('C'));
        assert_eq!(app.input_mode, InputMode::ConfirmClear);
        assert_eq!(app.handle_key(KeyCode::Esc), None);
        assert_eq!(app.status_message, "Cancelled");

        app.handle_key(KeyCode::Char('C'));
        assert_eq!(app.handle_key(KeyCode::Char('Y')), Some(Action::ClearRoster));
    }

    #[test]
    fn test_countdown_events() {
        let mut app = App::new(Role::Admin);
        app.apply_command_event(CommandEvent::CountdownTick { remaining: 5 });
        assert_eq!(app.countdown_text().as_deref(), Some("Starting in 5..."));

        app.apply_command_event(CommandEvent::Applied {
            command: Command::Start,
            record: TimerRecord::zero(),
        });
        assert_eq!(app.countdown, None);
        assert_eq!(app.status_message, "Timer started");

        app.apply_command_event(CommandEvent::Failed {
            command: Command::Stop,
            message: "offline".to_string(),
        });
        assert_eq!(app.status_message, "Could not stop: offline");
    }

    #[test]
    fn test_quit() {
        let mut app = App::new(Role::Viewer);
        app.handle_key(KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
