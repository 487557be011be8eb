//! # Feature: Tasks
//!
//! Per-user task list with completion state and free-form deadlines. The
//! edit flow is two-stage (text, then deadline); each stage offers a "keep
//! current value" shortcut button that completes the stage without consuming
//! free text. Completion toggling is a single stateless button press.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use anyhow::Result;
use log::{debug, info, warn};

use crate::context::BotContext;
use crate::database::Task;
use crate::features::notes::truncate;
use crate::router::token_id;
use crate::session::{SessionState, SessionStore, TaskFlow};
use crate::transport::{ButtonEvent, TextEvent};
use crate::ui;

pub struct TasksController;

impl TasksController {
    pub async fn handle_button(
        &self,
        ctx: &BotContext,
        sessions: &mut SessionStore,
        event: &ButtonEvent,
    ) -> Result<()> {
        let ButtonEvent { chat_id, user_id, message_id, token } = event;

        if token == "add_task_prompt" {
            sessions.set(*user_id, *chat_id, SessionState::Task(TaskFlow::AwaitingAddText));
            ctx.transport
                .send(
                    *chat_id,
                    "Send the text for the new task:",
                    Some(&ui::cancel_keyboard("tasks_menu")),
                )
                .await?;
        } else if let Some(task_id) = token_id(token, "edit_task_") {
            sessions.set(
                *user_id,
                *chat_id,
                SessionState::Task(TaskFlow::AwaitingEditText { task_id }),
            );
            ctx.transport
                .send(
                    *chat_id,
                    &format!("Send the new text for task {task_id}:"),
                    Some(&ui::keep_current_text_keyboard(task_id)),
                )
                .await?;
        } else if let Some(task_id) = token_id(token, "keep_current_text_") {
            sessions.set(
                *user_id,
                *chat_id,
                SessionState::Task(TaskFlow::AwaitingEditDeadline { task_id, new_text: None }),
            );
            ctx.transport
                .send(
                    *chat_id,
                    &format!("Send the new deadline for task {task_id}:"),
                    Some(&ui::keep_current_deadline_keyboard(task_id)),
                )
                .await?;
        } else if let Some(task_id) = token_id(token, "keep_current_deadline_") {
            match sessions.get(*user_id, *chat_id) {
                Some(SessionState::Task(TaskFlow::AwaitingEditDeadline {
                    task_id: pending_id,
                    new_text,
                })) if *pending_id == task_id => {
                    if let Some(text) = new_text.clone() {
                        ctx.database.update_task(*user_id, task_id, Some(&text), None, None)?;
                        info!("updated task {task_id} text for user {user_id}");
                    }
                    sessions.clear(*user_id, *chat_id);
                    self.edit_list(ctx, *chat_id, *message_id, *user_id).await?;
                }
                _ => debug!("stale keep_current_deadline press for task {task_id}, ignored"),
            }
        } else if let Some(task_id) = token_id(token, "toggle_task_status_") {
            ctx.database.toggle_task_status(*user_id, task_id)?;
            self.edit_list(ctx, *chat_id, *message_id, *user_id).await?;
        } else if let Some(task_id) = token_id(token, "delete_task_") {
            ctx.database.delete_task(*user_id, task_id)?;
            info!("deleted task {task_id} for user {user_id}");
            self.edit_list(ctx, *chat_id, *message_id, *user_id).await?;
        } else if token == "tasks_menu" {
            sessions.clear(*user_id, *chat_id);
            self.edit_list(ctx, *chat_id, *message_id, *user_id).await?;
        } else {
            warn!("unparsable tasks token dropped: {token}");
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

        let Some(SessionState::Task(flow)) = sessions.get(*user_id, *chat_id).cloned() else {
            debug!("task text from user {user_id} with no task flow active");
            return Ok(());
        };

        match flow {
            TaskFlow::AwaitingAddText => {
                if trimmed.is_empty() {
                    ctx.transport
                        .send(
                            *chat_id,
                            "Task text cannot be empty. Try again:",
                            Some(&ui::cancel_keyboard("tasks_menu")),
                        )
                        .await?;
                    return Ok(());
                }
                let task_id = ctx.database.add_task(*user_id, trimmed, None)?;
                info!("added task {task_id} for user {user_id}");
                sessions.clear(*user_id, *chat_id);
                self.send_list(ctx, *chat_id, *user_id).await?;
            }
            TaskFlow::AwaitingEditText { task_id } => {
                if trimmed.is_empty() {
                    ctx.transport
                        .send(
                            *chat_id,
                            "Task text cannot be empty. Try again:",
                            Some(&ui::keep_current_text_keyboard(task_id)),
                        )
                        .await?;
                    return Ok(());
                }
                sessions.set(
                    *user_id,
                    *chat_id,
                    SessionState::Task(TaskFlow::AwaitingEditDeadline {
                        task_id,
                        new_text: Some(trimmed.to_string()),
                    }),
                );
                ctx.transport
                    .send(
                        *chat_id,
                        &format!("Send the new deadline for task {task_id}:"),
                        Some(&ui::keep_current_deadline_keyboard(task_id)),
                    )
                    .await?;
            }
            TaskFlow::AwaitingEditDeadline { task_id, new_text } => {
                if trimmed.is_empty() {
                    ctx.transport
                        .send(
                            *chat_id,
                            "Deadline cannot be empty. Try again:",
                            Some(&ui::keep_current_deadline_keyboard(task_id)),
                        )
                        .await?;
                    return Ok(());
                }
                ctx.database.update_task(
                    *user_id,
                    task_id,
                    new_text.as_deref(),
                    Some(trimmed),
                    None,
                )?;
                info!("updated task {task_id} for user {user_id}");
                sessions.clear(*user_id, *chat_id);
                self.send_list(ctx, *chat_id, *user_id).await?;
            }
        }
        Ok(())
    }

    pub async fn send_list(&self, ctx: &BotContext, chat_id: i64, user_id: i64) -> Result<()> {
        let tasks = ctx.database.list_tasks(user_id)?;
        ctx.transport
            .send(chat_id, &format_tasks(&tasks), Some(&ui::tasks_keyboard(&tasks)))
            .await
    }

    async fn edit_list(
        &self,
        ctx: &BotContext,
        chat_id: i64,
        message_id: i64,
        user_id: i64,
    ) -> Result<()> {
        let tasks = ctx.database.list_tasks(user_id)?;
        ctx.transport
            .edit(chat_id, message_id, &format_tasks(&tasks), Some(&ui::tasks_keyboard(&tasks)))
            .await
    }
}

pub(crate) fn format_tasks(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "You have no tasks yet.".to_string();
    }
    tasks
        .iter()
        .map(|task| {
            let status = if task.is_completed { "✅" } else { "⏳" };
            let deadline = match &task.deadline {
                Some(deadline) => format!(" (due {deadline})"),
                None => " (no deadline)".to_string(),
            };
            format!("{status} {}. {}{deadline}", task.id, truncate(&task.text, 100))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use chrono::NaiveTime;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn test_ctx() -> (tempfile::TempDir, BotContext, Arc<MockTransport>) {
        let dir = tempdir().unwrap();
        let database = crate::database::Database::new(dir.path().join("test.db")).unwrap();
        let transport = Arc::new(MockTransport::new());
        let ctx = BotContext::new(
            database,
            transport.clone(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        );
        (dir, ctx, transport)
    }

    fn button(user_id: i64, token: impl Into<String>) -> ButtonEvent {
        ButtonEvent { chat_id: 10, user_id, message_id: 5, token: token.into() }
    }

    fn text(user_id: i64, body: &str) -> TextEvent {
        TextEvent { chat_id: 10, user_id, text: body.to_string() }
    }

    #[tokio::test]
    async fn test_add_flow() {
        let (_dir, ctx, _) = test_ctx();
        let controller = TasksController;
        let mut sessions = SessionStore::new();

        controller
            .handle_button(&ctx, &mut sessions, &button(1, "add_task_prompt"))
            .await
            .unwrap();
        controller
            .handle_text(&ctx, &mut sessions, &text(1, "write report"))
            .await
            .unwrap();

        let tasks = ctx.database.list_tasks(1).unwrap();
        assert_eq!(tasks[0].text, "write report");
        assert!(tasks[0].deadline.is_none());
        assert!(sessions.get(1, 10).is_none());
    }

    #[tokio::test]
    async fn test_edit_flow_text_then_deadline() {
        let (_dir, ctx, _) = test_ctx();
        let controller = TasksController;
        let mut sessions = SessionStore::new();
        let task_id = ctx.database.add_task(1, "old", Some("yesterday")).unwrap();

        controller
            .handle_button(&ctx, &mut sessions, &button(1, format!("edit_task_{task_id}")))
            .await
            .unwrap();
        controller.handle_text(&ctx, &mut sessions, &text(1, "new text")).await.unwrap();
        controller.handle_text(&ctx, &mut sessions, &text(1, "friday")).await.unwrap();

        let task = &ctx.database.list_tasks(1).unwrap()[0];
        assert_eq!(task.text, "new text");
        assert_eq!(task.deadline.as_deref(), Some("friday"));
        assert!(sessions.get(1, 10).is_none());
    }

    #[tokio::test]
    async fn test_keep_both_values_completes_without_mutation() {
        let (_dir, ctx, _) = test_ctx();
        let controller = TasksController;
        let mut sessions = SessionStore::new();
        let task_id = ctx.database.add_task(1, "untouched", Some("monday")).unwrap();

        controller
            .handle_button(&ctx, &mut sessions, &button(1, format!("edit_task_{task_id}")))
            .await
            .unwrap();
        controller
            .handle_button(&ctx, &mut sessions, &button(1, format!("keep_current_text_{task_id}")))
            .await
            .unwrap();
        controller
            .handle_button(
                &ctx,
                &mut sessions,
                &button(1, format!("keep_current_deadline_{task_id}")),
            )
            .await
            .unwrap();

        let task = &ctx.database.list_tasks(1).unwrap()[0];
        assert_eq!(task.text, "untouched");
        assert_eq!(task.deadline.as_deref(), Some("monday"));
        assert!(sessions.get(1, 10).is_none());
    }

    #[tokio::test]
    async fn test_new_text_then_keep_deadline() {
        let (_dir, ctx, _) = test_ctx();
        let controller = TasksController;
        let mut sessions = SessionStore::new();
        let task_id = ctx.database.add_task(1, "old", Some("monday")).unwrap();

        controller
            .handle_button(&ctx, &mut sessions, &button(1, format!("edit_task_{task_id}")))
            .await
            .unwrap();
        controller.handle_text(&ctx, &mut sessions, &text(1, "renamed")).await.unwrap();
        controller
            .handle_button(
                &ctx,
                &mut sessions,
                &button(1, format!("keep_current_deadline_{task_id}")),
            )
            .await
            .unwrap();

        let task = &ctx.database.list_tasks(1).unwrap()[0];
        assert_eq!(task.text, "renamed");
        assert_eq!(task.deadline.as_deref(), Some("monday"));
    }

    #[tokio::test]
    async fn test_stale_keep_deadline_press_is_ignored() {
        let (_dir, ctx, transport) = test_ctx();
        let controller = TasksController;
        let mut sessions = SessionStore::new();
        let task_id = ctx.database.add_task(1, "task", None).unwrap();

        // No edit flow in progress
        controller
            .handle_button(
                &ctx,
                &mut sessions,
                &button(1, format!("keep_current_deadline_{task_id}")),
            )
            .await
            .unwrap();

        assert!(transport.edited.lock().unwrap().is_empty());
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_is_stateless() {
        let (_dir, ctx, transport) = test_ctx();
        let controller = TasksController;
        let mut sessions = SessionStore::new();
        let task_id = ctx.database.add_task(1, "flip me", None).unwrap();

        controller
            .handle_button(&ctx, &mut sessions, &button(1, format!("toggle_task_status_{task_id}")))
            .await
            .unwrap();

        assert!(ctx.database.list_tasks(1).unwrap()[0].is_completed);
        assert!(sessions.get(1, 10).is_none());
        assert_eq!(transport.edited.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_format_tasks() {
        let empty: Vec<Task> = Vec::new();
        assert_eq!(format_tasks(&empty), "You have no tasks yet.");
    }
}
