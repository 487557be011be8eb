//! # Feature: Notes
//!
//! Per-user free-text notes with add/edit/delete flows. Add and edit span
//! two exchanges (prompt, then text) tracked in the session store; delete is
//! a single button press with no confirmation.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use anyhow::Result;
use log::{debug, info, warn};

use crate::context::BotContext;
use crate::database::Note;
use crate::router::token_id;
use crate::session::{NoteFlow, SessionState, SessionStore};
use crate::transport::{ButtonEvent, TextEvent};
use crate::ui;

pub struct NotesController;

impl NotesController {
    pub async fn handle_button(
        &self,
        ctx: &BotContext,
        sessions: &mut SessionStore,
        event: &ButtonEvent,
    ) -> Result<()> {
        let ButtonEvent { chat_id, user_id, message_id, token } = event;

        if token == "add_note_prompt" {
            sessions.set(*user_id, *chat_id, SessionState::Note(NoteFlow::AwaitingAddText));
            ctx.transport
                .send(
                    *chat_id,
                    "Send the text for the new note:",
                    Some(&ui::cancel_keyboard("notes_menu")),
                )
                .await?;
        } else if let Some(note_id) = token_id(token, "edit_note_") {
            sessions.set(
                *user_id,
                *chat_id,
                SessionState::Note(NoteFlow::AwaitingEditText { note_id }),
            );
            ctx.transport
                .send(
                    *chat_id,
                    &format!("Send the new text for note {note_id}:"),
                    Some(&ui::cancel_keyboard("notes_menu")),
                )
                .await?;
        } else if let Some(note_id) = token_id(token, "delete_note_") {
            ctx.database.delete_note(*user_id, note_id)?;
            info!("deleted note {note_id} for user {user_id}");
            self.edit_list(ctx, *chat_id, *message_id, *user_id).await?;
        } else if token == "notes_menu" {
            sessions.clear(*user_id, *chat_id);
            self.edit_list(ctx, *chat_id, *message_id, *user_id).await?;
        } else {
            warn!("unparsable notes token dropped: {token}");
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

        let Some(SessionState::Note(flow)) = sessions.get(*user_id, *chat_id).cloned() else {
            debug!("note text from user {user_id} with no note flow active");
            return Ok(());
        };

        if trimmed.is_empty() {
            // Re-prompt, state unchanged
            ctx.transport
                .send(
                    *chat_id,
                    "Note text cannot be empty. Try again:",
                    Some(&ui::cancel_keyboard("notes_menu")),
                )
                .await?;
            return Ok(());
        }

        match flow {
            NoteFlow::AwaitingAddText => {
                let note_id = ctx.database.add_note(*user_id, trimmed)?;
                info!("added note {note_id} for user {user_id}");
            }
            NoteFlow::AwaitingEditText { note_id } => {
                ctx.database.update_note(*user_id, note_id, trimmed)?;
                info!("updated note {note_id} for user {user_id}");
            }
        }
        sessions.clear(*user_id, *chat_id);
        self.send_list(ctx, *chat_id, *user_id).await
    }

    pub async fn send_list(&self, ctx: &BotContext, chat_id: i64, user_id: i64) -> Result<()> {
        let notes = ctx.database.list_notes(user_id)?;
        ctx.transport
            .send(chat_id, &format_notes(&notes), Some(&ui::notes_keyboard(&notes)))
            .await
    }

    async fn edit_list(
        &self,
        ctx: &BotContext,
        chat_id: i64,
        message_id: i64,
        user_id: i64,
    ) -> Result<()> {
        let notes = ctx.database.list_notes(user_id)?;
        ctx.transport
            .edit(chat_id, message_id, &format_notes(&notes), Some(&ui::notes_keyboard(&notes)))
            .await
    }
}

fn format_notes(notes: &[Note]) -> String {
    if notes.is_empty() {
        return "You have no notes yet.".to_string();
    }
    notes
        .iter()
        .map(|note| format!("{}. {}", note.id, truncate(&note.text, 100)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Char-boundary-safe prefix of at most `max` characters.
pub(crate) fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
