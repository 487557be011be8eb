//! # Feature: Reminders
//!
//! Time-based reminders with free-text time input and a background dispatch
//! scheduler. The add flow has an extra sub-state for time entry: the text
//! is collected first, then the time expression is parsed; a failed parse
//! re-prompts without losing the collected text.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 1.1.0: Recurrence toggle button
//! - 1.0.0: Initial release with add/delete flows and dispatch scheduler

pub mod scheduler;
pub mod timeparse;

pub use scheduler::ReminderScheduler;
pub use timeparse::parse_remind_time;

use anyhow::Result;
use chrono::Local;
use log::{debug, info, warn};

use crate::context::BotContext;
use crate::database::Reminder;
use crate::features::notes::truncate;
use crate::router::token_id;
use crate::session::{ReminderFlow, SessionState, SessionStore};
use crate::transport::{ButtonEvent, TextEvent};
use crate::ui;

const TIME_FORMATS_HELP: &str =
    "When should I remind you?\nI understand: `30 min`, `2 h`, `18:15`, `tomorrow 10:00`, `15 october`.";

pub struct RemindersController;

impl RemindersController {
    pub async fn handle_button(
        &self,
        ctx: &BotContext,
        sessions: &mut SessionStore,
        event: &ButtonEvent,
    ) -> Result<()> {
        let ButtonEvent { chat_id, user_id, message_id, token } = event;

        if token == "add_reminder_prompt" {
            sessions.set(*user_id, *chat_id, SessionState::Reminder(ReminderFlow::AwaitingText));
            ctx.transport
                .send(
                    *chat_id,
                    "What should I remind you about?",
                    Some(&ui::cancel_keyboard("reminders_menu")),
                )
                .await?;
        } else if let Some(reminder_id) = token_id(token, "toggle_reminder_type_") {
            ctx.database.toggle_reminder_type(*user_id, reminder_id)?;
            self.edit_list(ctx, *chat_id, *message_id, *user_id).await?;
        } else if let Some(reminder_id) = token_id(token, "delete_reminder_") {
            ctx.database.delete_reminder(*user_id, reminder_id)?;
            info!("deleted reminder {reminder_id} for user {user_id}");
            self.edit_list(ctx, *chat_id, *message_id, *user_id).await?;
        } else if token == "reminders_menu" {
            sessions.clear(*user_id, *chat_id);
            self.edit_list(ctx, *chat_id, *message_id, *user_id).await?;
        } else {
            warn!("unparsable reminders token dropped: {token}");
        }
        Ok(())
    }

    pub async fn handle_text(
        &self,
        ctx: &BotContext,
        sessions: &mut SessionStore,
        event: &TextEvent,
    ) -> Result<()> {
        let TextEvent { chat_id, user_id, text } = event;
        let trimmed = text.trim();

        let Some(SessionState::Reminder(flow)) = sessions.get(*user_id, *chat_id).cloned() else {
            debug!("reminder text from user {user_id} with no reminder flow active");
            return Ok(());
        };

        match flow {
            ReminderFlow::AwaitingText => {
                if trimmed.is_empty() {
                    ctx.transport
                        .send(
                            *chat_id,
                            "Reminder text cannot be empty. Try again:",
                            Some(&ui::cancel_keyboard("reminders_menu")),
                        )
                        .await?;
                    return Ok(());
                }
                sessions.set(
                    *user_id,
                    *chat_id,
                    SessionState::Reminder(ReminderFlow::AwaitingTime {
                        text: trimmed.to_string(),
                    }),
                );
                ctx.transport
                    .send(*chat_id, TIME_FORMATS_HELP, Some(&ui::cancel_keyboard("reminders_menu")))
                    .await?;
            }
            ReminderFlow::AwaitingTime { text: reminder_text } => {
                let now = Local::now().naive_local();
                match parse_remind_time(trimmed, now, ctx.reminder_default_time) {
                    Some(remind_at) => {
                        let id = ctx
                            .database
                            .add_reminder(*user_id, &reminder_text, remind_at, false)?;
                        info!("added reminder {id} for user {user_id} at {remind_at}");
                        sessions.clear(*user_id, *chat_id);
                        self.send_list(ctx, *chat_id, *user_id).await?;
                    }
                    None => {
                        // Parse failure re-prompts in the same state
                        ctx.transport
                            .send(
                                *chat_id,
                                &format!("I couldn't understand that time.\n{TIME_FORMATS_HELP}"),
                                Some(&ui::cancel_keyboard("reminders_menu")),
                            )
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn send_list(&self, ctx: &BotContext, chat_id: i64, user_id: i64) -> Result<()> {
        let reminders = ctx.database.list_reminders(user_id)?;
        ctx.transport
            .send(chat_id, &format_reminders(&reminders), Some(&ui::reminders_keyboard(&reminders)))
            .await
    }

    async fn edit_list(
        &self,
        ctx: &BotContext,
        chat_id: i64,
        message_id: i64,
        user_id: i64,
    ) -> Result<()> {
        let reminders = ctx.database.list_reminders(user_id)?;
        ctx.transport
            .edit(
                chat_id,
                message_id,
                &format_reminders(&reminders),
                Some(&ui::reminders_keyboard(&reminders)),
            )
            .await
    }
}

pub(crate) fn format_reminders(reminders: &[Reminder]) -> String {
    if reminders.is_empty() {
        return "You have no reminders yet.".to_string();
    }
    reminders
        .iter()
        .map(|reminder| {
            let kind = if reminder.is_recurring { "🔄" } else { "📅" };
            format!(
                "{kind} {}. {} — {}",
                reminder.id,
                truncate(&reminder.text, 100),
                reminder.remind_at.format("%d.%m.%Y %H:%M"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
