//! # Feature: Daily Digest
//!
//! Once-a-day summary of open tasks and today's reminders, sent at a per-user
//! HH:MM time. A background loop compares each enabled user's send time
//! against the current wall-clock minute; deliveries are spawned so one slow
//! send cannot hold up the others, and a per-user last-fired-date guard stops
//! a minute-straddling cycle from firing twice.
//!
//! - **Version**: 1.0.1
//! - **Since**: 0.2.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 1.0.1: Compose failures contained per user
//! - 1.0.0: Initial release with minute matching and supervised dispatch

use anyhow::Result;
use chrono::{Local, NaiveDate, NaiveDateTime};
use log::{error, info};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::database::Database;
use crate::features::notes::truncate;
use crate::transport::Transport;

pub struct DigestScheduler {
    database: Database,
    transport: Arc<dyn Transport>,
    interval: Duration,
    last_fired: HashMap<i64, NaiveDate>,
}

impl DigestScheduler {
    pub fn new(database: Database, transport: Arc<dyn Transport>, interval_secs: u64) -> Self {
        DigestScheduler {
            database,
            transport,
            interval: Duration::from_secs(interval_secs),
            last_fired: HashMap::new(),
        }
    }

    /// Run forever. Cycle errors are logged and never end the loop.
    pub async fn run(mut self) {
        info!(
            "🌞 Digest scheduler started ({}s interval)",
            self.interval.as_secs()
        );
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let now = Local::now().naive_local();
            if let Err(e) = self.tick(now).await {
                error!("digest scheduler cycle failed: {e}");
            }
        }
    }

    /// One matching cycle at the given instant. Public for tests.
    pub async fn tick(&mut self, now: NaiveDateTime) -> Result<()> {
        let minute = now.format("%H:%M").to_string();
        let today = now.date();
        let mut deliveries = JoinSet::new();

        for (user_id, send_at) in self.database.digest_recipients()? {
            if send_at != minute {
                continue;
            }
            if self.last_fired.get(&user_id) == Some(&today) {
                continue;
            }

            // Per-user containment: a compose failure must not abort the
            // rest of the cycle, and the user stays unmarked so the digest
            // goes out once the store recovers.
            let text = match self.compose(user_id, today) {
                Ok(text) => text,
                Err(e) => {
                    error!("failed to compose digest for user {user_id}: {e}");
                    continue;
                }
            };
            self.last_fired.insert(user_id, today);

            let transport = self.transport.clone();
            deliveries.spawn(async move {
                // Private-chat convention: the chat id equals the user id
                (user_id, transport.send(user_id, &text, None).await)
            });
        }

        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok((user_id, Ok(()))) => info!("delivered digest to user {user_id}"),
                Ok((user_id, Err(e))) => error!("failed to deliver digest to user {user_id}: {e}"),
                Err(e) => error!("digest delivery task panicked: {e}"),
            }
        }
        Ok(())
    }

    fn compose(&self, user_id: i64, today: NaiveDate) -> Result<String> {
        let open_tasks: Vec<_> = self
            .database
            .list_tasks(user_id)?
            .into_iter()
            .filter(|task| !task.is_completed)
            .collect();
        let todays_reminders: Vec<_> = self
            .database
            .list_reminders(user_id)?
            .into_iter()
            .filter(|reminder| reminder.remind_at.date() == today)
            .collect();

        if open_tasks.is_empty() && todays_reminders.is_empty() {
            return Ok("🌞 Good morning! Nothing on your plate today.".to_string());
        }

        let mut lines = vec!["🌞 Your daily digest".to_string()];
        if !open_tasks.is_empty() {
            lines.push(String::new());
            lines.push("⏳ Open tasks:".to_string());
            for task in &open_tasks {
                match &task.deadline {
                    Some(deadline) => {
                        lines.push(format!("• {} (due {deadline})", truncate(&task.text, 100)))
                    }
                    None => lines.push(format!("• {}", truncate(&task.text, 100))),
                }
            }
        }
        if !todays_reminders.is_empty() {
            lines.push(String::new());
            lines.push("⏰ Today's reminders:".to_string());
            for reminder in &todays_reminders {
                lines.push(format!(
                    "• {} — {}",
                    truncate(&reminder.text, 100),
                    reminder.remind_at.format("%H:%M"),
                ));
            }
        }
        Ok(lines.join("\n"))
    }
}
