//! Keyboard markup builders
//!
//! Produces the opaque markup values attached to outbound messages: the
//! persistent main reply keyboard and the per-list inline keyboards whose
//! callback tokens the router classifies.

use serde_json::{json, Value};

use crate::database::{Note, Reminder, Task};
use crate::router;

/// Persistent reply keyboard with the five main-menu labels.
pub fn main_reply_keyboard() -> Value {
    json!({
        "keyboard": [
            [{ "text": router::MENU_NOTES }, { "text": router::MENU_TASKS }],
            [{ "text": router::MENU_REMINDERS }, { "text": router::MENU_DIGEST }],
            [{ "text": router::MENU_SETTINGS }],
        ],
        "resize_keyboard": true,
        "one_time_keyboard": false,
    })
}

pub fn notes_keyboard(notes: &[Note]) -> Value {
    let mut rows: Vec<Value> = notes
        .iter()
        .map(|note| {
            json!([
                { "text": format!("✏️ {}", note.id), "callback_data": format!("edit_note_{}", note.id) },
                { "text": format!("🗑️ {}", note.id), "callback_data": format!("delete_note_{}", note.id) },
            ])
        })
        .collect();
    rows.push(json!([{ "text": "➕ Add note", "callback_data": "add_note_prompt" }]));
    json!({ "inline_keyboard": rows })
}

pub fn tasks_keyboard(tasks: &[Task]) -> Value {
    let mut rows: Vec<Value> = tasks
        .iter()
        .map(|task| {
            let status = if task.is_completed { "✅ Done" } else { "⏳ Open" };
            json!([
                { "text": format!("✏️ {}", task.id), "callback_data": format!("edit_task_{}", task.id) },
                { "text": status, "callback_data": format!("toggle_task_status_{}", task.id) },
                { "text": format!("🗑️ {}", task.id), "callback_data": format!("delete_task_{}", task.id) },
            ])
        })
        .collect();
    rows.push(json!([{ "text": "➕ Add task", "callback_data": "add_task_prompt" }]));
    json!({ "inline_keyboard": rows })
}

pub fn reminders_keyboard(reminders: &[Reminder]) -> Value {
    let mut rows: Vec<Value> = reminders
        .iter()
        .map(|reminder| {
            let kind = if reminder.is_recurring { "🔄 Daily" } else { "📅 One-off" };
            json!([
                { "text": kind, "callback_data": format!("toggle_reminder_type_{}", reminder.id) },
                { "text": format!("🗑️ {}", reminder.id), "callback_data": format!("delete_reminder_{}", reminder.id) },
            ])
        })
        .collect();
    rows.push(json!([{ "text": "➕ Add reminder", "callback_data": "add_reminder_prompt" }]));
    json!({ "inline_keyboard": rows })
}

/// Single cancel button returning to the given menu token.
pub fn cancel_keyboard(target_menu: &str) -> Value {
    json!({
        "inline_keyboard": [[{ "text": "❌ Cancel", "callback_data": target_menu }]]
    })
}

pub fn keep_current_text_keyboard(task_id: i64) -> Value {
    json!({
        "inline_keyboard": [
            [{ "text": "Keep current text", "callback_data": format!("keep_current_text_{task_id}") }],
            [{ "text": "❌ Cancel", "callback_data": "tasks_menu" }],
        ]
    })
}

pub fn keep_current_deadline_keyboard(task_id: i64) -> Value {
    json!({
        "inline_keyboard": [
            [{ "text": "Keep current deadline", "callback_data": format!("keep_current_deadline_{task_id}") }],
            [{ "text": "❌ Cancel", "callback_data": "tasks_menu" }],
        ]
    })
}
