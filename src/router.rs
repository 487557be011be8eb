//! # Command Router
//!
//! Pure classification of inbound events. Button tokens are matched by
//! namespace prefix, first match wins. Free text is matched in strict
//! priority order: main-menu labels beat any in-flight session state, so a
//! menu tap always abandons the current flow and stale text can never
//! re-enter it.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use crate::session::SessionState;

/// Fixed reply-keyboard labels of the main menu.
pub const MENU_NOTES: &str = "📝 Notes";
pub const MENU_TASKS: &str = "✅ Tasks";
pub const MENU_REMINDERS: &str = "⏰ Reminders";
pub const MENU_DIGEST: &str = "🌞 Daily digest";
pub const MENU_SETTINGS: &str = "⚙️ Settings";

pub const START_COMMAND: &str = "/start";

const NOTE_PREFIXES: &[&str] = &["add_note_prompt", "edit_note_", "delete_note_", "notes_menu"];
const TASK_PREFIXES: &[&str] = &[
    "add_task_prompt",
    "edit_task_",
    "keep_current_text_",
    "keep_current_deadline_",
    "toggle_task_status_",
    "delete_task_",
    "tasks_menu",
];
const REMINDER_PREFIXES: &[&str] = &[
    "add_reminder_prompt",
    "toggle_reminder_type_",
    "delete_reminder_",
    "reminders_menu",
];

/// Controller a button token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonTarget {
    Notes,
    Tasks,
    Reminders,
    MainMenu,
}

/// Classify a button token by its namespace prefix. Unknown tokens yield
/// None and are dropped by the caller.
pub fn route_button(token: &str) -> Option<ButtonTarget> {
    if NOTE_PREFIXES.iter().any(|p| token.starts_with(p)) {
        return Some(ButtonTarget::Notes);
    }
    if TASK_PREFIXES.iter().any(|p| token.starts_with(p)) {
        return Some(ButtonTarget::Tasks);
    }
    if REMINDER_PREFIXES.iter().any(|p| token.starts_with(p)) {
        return Some(ButtonTarget::Reminders);
    }
    if token == "main_menu" {
        return Some(ButtonTarget::MainMenu);
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuLabel {
    Notes,
    Tasks,
    Reminders,
    Digest,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRoute {
    /// A main-menu label; always wins and clears any in-flight flow.
    MainMenu(MenuLabel),
    /// Text belongs to the controller owning the active session state.
    Flow(ButtonTarget),
    Start,
    Unhandled,
}

/// Classify free text against the fixed priority order.
pub fn route_text(text: &str, state: Option<&SessionState>) -> TextRoute {
    match text {
        MENU_NOTES => return TextRoute::MainMenu(MenuLabel::Notes),
        MENU_TASKS => return TextRoute::MainMenu(MenuLabel::Tasks),
        MENU_REMINDERS => return TextRoute::MainMenu(MenuLabel::Reminders),
        MENU_DIGEST => return TextRoute::MainMenu(MenuLabel::Digest),
        MENU_SETTINGS => return TextRoute::MainMenu(MenuLabel::Settings),
        _ => {}
    }

    match state {
        Some(SessionState::Note(_)) => return TextRoute::Flow(ButtonTarget::Notes),
        Some(SessionState::Task(_)) => return TextRoute::Flow(ButtonTarget::Tasks),
        Some(SessionState::Reminder(_)) => return TextRoute::Flow(ButtonTarget::Reminders),
        None => {}
    }

    if text == START_COMMAND {
        return TextRoute::Start;
    }

    TextRoute::Unhandled
}

/// Parse the numeric id suffix of a namespaced token, e.g.
/// `delete_note_17` with prefix `delete_note_` yields 17.
pub fn token_id(token: &str, prefix: &str) -> Option<i64> {
    token.strip_prefix(prefix)?.parse().ok()
}
