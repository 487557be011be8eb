//! # Update Ingestion Loop
//!
//! The single consumer of inbound events. Long-polls the transport from a
//! durable cursor, processes each update fully (all side effects) before
//! advancing, and persists the cursor to a file after every routed event so
//! a restart resumes where it left off. At-least-once: a crash between side
//! effect and cursor write replays the event.
//!
//! The loop owns the session store by value. Nothing else can touch
//! conversation state, so flows never race.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use anyhow::Result;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::context::BotContext;
use crate::features::{NotesController, RemindersController, TasksController};
use crate::router::{self, route_button, route_text, ButtonTarget, MenuLabel, TextRoute};
use crate::session::SessionStore;
use crate::transport::{Event, Update};
use crate::ui;

const POLL_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_BACKOFF: Duration = Duration::from_secs(10);

const GREETING: &str = "👋 Hi! I'm your personal assistant.\n\
    I keep your notes, tasks and reminders. Pick a section below.";

pub struct UpdateLoop {
    ctx: BotContext,
    sessions: SessionStore,
    notes: NotesController,
    tasks: TasksController,
    reminders: RemindersController,
    cursor_path: PathBuf,
    cursor: i64,
}

impl UpdateLoop {
    pub fn new(ctx: BotContext, cursor_path: impl Into<PathBuf>) -> Self {
        let cursor_path = cursor_path.into();
        let cursor = load_cursor(&cursor_path);
        UpdateLoop {
            ctx,
            sessions: SessionStore::new(),
            notes: NotesController,
            tasks: TasksController,
            reminders: RemindersController,
            cursor_path,
            cursor,
        }
    }

    /// Poll forever. Transport failures back off with the cursor unchanged.
    pub async fn run(mut self) {
        info!("📨 Update loop started (cursor {})", self.cursor);
        loop {
            let updates = match self.ctx.transport.poll(self.cursor, POLL_TIMEOUT).await {
                Ok(updates) => updates,
                Err(e) => {
                    error!("poll failed, retrying in {}s: {e}", RETRY_BACKOFF.as_secs());
                    tokio::time::sleep(RETRY_BACKOFF).await;
                    continue;
                }
            };

            for update in updates {
                let id = update.id;
                if let Err(e) = self.handle_event(update).await {
                    error!("failed to handle update {id}: {e}");
                }
                self.cursor = id;
                if let Err(e) = store_cursor(&self.cursor_path, self.cursor) {
                    error!("failed to persist cursor {id}: {e}");
                }
            }
        }
    }

    async fn handle_event(&mut self, update: Update) -> Result<()> {
        match update.event {
            Event::Button(event) => {
                let Some(target) = route_button(&event.token) else {
                    debug!("dropping unroutable button token: {}", event.token);
                    return Ok(());
                };
                match target {
                    ButtonTarget::Notes => {
                        self.notes.handle_button(&self.ctx, &mut self.sessions, &event).await
                    }
                    ButtonTarget::Tasks => {
                        self.tasks.handle_button(&self.ctx, &mut self.sessions, &event).await
                    }
                    ButtonTarget::Reminders => {
                        self.reminders.handle_button(&self.ctx, &mut self.sessions, &event).await
                    }
                    ButtonTarget::MainMenu => {
                        self.sessions.clear(event.user_id, event.chat_id);
                        self.ctx
                            .transport
                            .send(event.chat_id, GREETING, Some(&ui::main_reply_keyboard()))
                            .await
                    }
                }
            }
            Event::Text(event) => {
                let state = self.sessions.get(event.user_id, event.chat_id);
                match route_text(&event.text, state) {
                    TextRoute::MainMenu(label) => {
                        // A menu tap abandons whatever flow was in flight
                        self.sessions.clear(event.user_id, event.chat_id);
                        self.open_menu(label, event.chat_id, event.user_id).await
                    }
                    TextRoute::Flow(ButtonTarget::Notes) => {
                        self.notes.handle_text(&self.ctx, &mut self.sessions, &event).await
                    }
                    TextRoute::Flow(ButtonTarget::Tasks) => {
                        self.tasks.handle_text(&self.ctx, &mut self.sessions, &event).await
                    }
                    TextRoute::Flow(ButtonTarget::Reminders) => {
                        self.reminders.handle_text(&self.ctx, &mut self.sessions, &event).await
                    }
                    TextRoute::Flow(ButtonTarget::MainMenu) => Ok(()),
                    TextRoute::Start => {
                        info!("user {} started the bot", event.user_id);
                        self.ctx
                            .transport
                            .send(event.chat_id, GREETING, Some(&ui::main_reply_keyboard()))
                            .await
                    }
                    TextRoute::Unhandled => {
                        debug!("dropping unhandled text from user {}", event.user_id);
                        Ok(())
                    }
                }
            }
        }
    }

    async fn open_menu(&mut self, label: MenuLabel, chat_id: i64, user_id: i64) -> Result<()> {
        match label {
            MenuLabel::Notes => self.notes.send_list(&self.ctx, chat_id, user_id).await,
            MenuLabel::Tasks => self.tasks.send_list(&self.ctx, chat_id, user_id).await,
            MenuLabel::Reminders => self.reminders.send_list(&self.ctx, chat_id, user_id).await,
            MenuLabel::Digest => {
                let settings = self.ctx.database.get_settings(user_id)?;
                let text = match (settings.daily_digest_enabled, settings.daily_digest_time) {
                    (true, Some(at)) => {
                        format!("🌞 Daily digest is on. I'll send it every day at {at}.")
                    }
                    _ => "🌞 Daily digest is off.".to_string(),
                };
                self.ctx.transport.send(chat_id, &text, None).await
            }
            MenuLabel::Settings => {
                let settings = self.ctx.database.get_settings(user_id)?;
                let digest = match (settings.daily_digest_enabled, &settings.daily_digest_time) {
                    (true, Some(at)) => format!("on, at {at}"),
                    _ => "off".to_string(),
                };
                let text = format!(
                    "⚙️ Your settings:\n📍 Default location: {}\n🌞 Daily digest: {digest}",
                    settings.default_location,
                );
                self.ctx.transport.send(chat_id, &text, None).await
            }
        }
    }
}

/// Read the persisted resume cursor; absent or unreadable means start fresh.
fn load_cursor(path: &Path) -> i64 {
    match std::fs::read_to_string(path) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("cursor file {} is corrupt, starting from 0", path.display());
            0
        }),
        Err(_) => 0,
    }
}

fn store_cursor(path: &Path, cursor: i64) -> Result<()> {
    std::fs::write(path, cursor.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::session::{SessionState, TaskFlow};
    use crate::transport::{ButtonEvent, MockTransport, TextEvent};
    use chrono::NaiveTime;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, UpdateLoop, Arc<MockTransport>) {
        let dir = tempdir().unwrap();
        let database = Database::new(dir.path().join("test.db")).unwrap();
        let transport = Arc::new(MockTransport::new());
        let ctx = BotContext::new(
            database,
            transport.clone(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        );
        let cursor_path = dir.path().join("cursor.txt");
        let update_loop = UpdateLoop::new(ctx, cursor_path);
        (dir, update_loop, transport)
    }

    fn text_update(id: i64, body: &str) -> Update {
        Update {
            id,
            event: Event::Text(TextEvent { chat_id: 10, user_id: 1, text: body.to_string() }),
        }
    }

    fn button_update(id: i64, token: &str) -> Update {
        Update {
            id,
            event: Event::Button(ButtonEvent {
                chat_id: 10,
                user_id: 1,
                message_id: 5,
                token: token.to_string(),
            }),
        }
    }

    #[test]
    fn test_cursor_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cursor.txt");
        assert_eq!(load_cursor(&path), 0);

        store_cursor(&path, 42).unwrap();
        assert_eq!(load_cursor(&path), 42);

        std::fs::write(&path, "not a number").unwrap();
        assert_eq!(load_cursor(&path), 0);
    }

    #[tokio::test]
    async fn test_start_sends_greeting() {
        let (_dir, mut update_loop, transport) = setup();
        update_loop.handle_event(text_update(1, "/start")).await.unwrap();
        assert!(transport.sent_texts()[0].contains("personal assistant"));
    }

    #[tokio::test]
    async fn test_menu_tap_abandons_flow_and_stale_text_is_dropped() {
        let (_dir, mut update_loop, transport) = setup();

        // user starts adding a task...
        update_loop.handle_event(button_update(1, "add_task_prompt")).await.unwrap();
        assert_eq!(
            update_loop.sessions.get(1, 10),
            Some(&SessionState::Task(TaskFlow::AwaitingAddText))
        );

        // ...then taps a main-menu label instead of answering
        update_loop.handle_event(text_update(2, router::MENU_NOTES)).await.unwrap();
        assert!(update_loop.sessions.get(1, 10).is_none());
        assert!(transport.sent_texts().last().unwrap().contains("no notes"));

        // the text that would have named the task no longer reaches the flow
        update_loop.handle_event(text_update(3, "buy a boat")).await.unwrap();
        assert!(update_loop.ctx.database.list_tasks(1).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_button_is_dropped_silently() {
        let (_dir, mut update_loop, transport) = setup();
        update_loop.handle_event(button_update(1, "weather_forecast")).await.unwrap();
        assert!(transport.sent_texts().is_empty());
        assert!(transport.edited.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_idle_free_text_is_dropped() {
        let (_dir, mut update_loop, transport) = setup();
        update_loop.handle_event(text_update(1, "hello?")).await.unwrap();
        assert!(transport.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn test_flow_text_reaches_owning_controller() {
        let (_dir, mut update_loop, _transport) = setup();
        update_loop.handle_event(button_update(1, "add_note_prompt")).await.unwrap();
        update_loop.handle_event(text_update(2, "remember the milk")).await.unwrap();

        let notes = update_loop.ctx.database.list_notes(1).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "remember the milk");
    }

    #[tokio::test]
    async fn test_digest_menu_renders_configuration() {
        let (_dir, mut update_loop, transport) = setup();
        update_loop.handle_event(text_update(1, router::MENU_DIGEST)).await.unwrap();
        assert!(transport.sent_texts()[0].contains("Daily digest is off"));

        update_loop
            .ctx
            .database
            .set_setting(1, crate::database::SettingKey::DailyDigestTime, "09:00")
            .unwrap();
        update_loop
            .ctx
            .database
            .set_setting(1, crate::database::SettingKey::DailyDigestEnabled, "1")
            .unwrap();
        update_loop.handle_event(text_update(2, router::MENU_DIGEST)).await.unwrap();
        assert!(transport.sent_texts()[1].contains("every day at 09:00"));
    }

    #[tokio::test]
    async fn test_settings_menu_renders_defaults() {
        let (_dir, mut update_loop, transport) = setup();
        update_loop.handle_event(text_update(1, router::MENU_SETTINGS)).await.unwrap();
        let sent = transport.sent_texts();
        assert!(sent[0].contains("Default location: London"));
        assert!(sent[0].contains("Daily digest: off"));
    }
}
