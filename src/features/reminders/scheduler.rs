//! Reminder dispatch scheduler
//!
//! Background loop that fires due reminders. Each cycle loads everything
//! with `remind_at <= now` and fires only the reminders inside the trailing
//! window `(now - interval, now]`; anything older was missed during an
//! outage and is deliberately left alone rather than re-fired in bulk.
//! Recurring reminders advance by exactly one day relative to their
//! original remind_at, one-off reminders are deleted after delivery.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

use crate::database::{Database, Reminder};
use crate::transport::Transport;

pub struct ReminderScheduler {
    database: Database,
    transport: Arc<dyn Transport>,
    interval: Duration,
}

impl ReminderScheduler {
    pub fn new(database: Database, transport: Arc<dyn Transport>, interval_secs: u64) -> Self {
        ReminderScheduler {
            database,
            transport,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Run forever. Cycle errors are logged and never end the loop.
    pub async fn run(self) {
        info!(
            "⏰ Reminder scheduler started ({}s interval)",
            self.interval.as_secs()
        );
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let now = Local::now().naive_local();
            if let Err(e) = self.tick(now).await {
                error!("reminder scheduler cycle failed: {e}");
            }
        }
    }

    /// One dispatch cycle at the given instant. Public for tests.
    pub async fn tick(&self, now: NaiveDateTime) -> Result<()> {
        let window_start = now
            - ChronoDuration::from_std(self.interval)
                .unwrap_or_else(|_| ChronoDuration::seconds(30));

        for reminder in self.database.due_reminders(now)? {
            if reminder.remind_at <= window_start {
                // Overdue from before the trailing window; skipped until its
                // next natural occurrence.
                continue;
            }
            if let Err(e) = self.fire(&reminder).await {
                error!(
                    "failed to deliver reminder {} to user {}: {e}",
                    reminder.id, reminder.user_id
                );
            }
        }
        Ok(())
    }

    async fn fire(&self, reminder: &Reminder) -> Result<()> {
        // Private-chat convention: the chat id equals the user id
        self.transport
            .send(reminder.user_id, &format!("⏰ Reminder: {}", reminder.text), None)
            .await?;
        info!(
            "delivered reminder {} to user {}",
            reminder.id, reminder.user_id
        );

        if reminder.is_recurring {
            let next = reminder.remind_at + ChronoDuration::days(1);
            self.database
                .reschedule_reminder(reminder.user_id, reminder.id, next)?;
        } else {
            self.database.delete_reminder(reminder.user_id, reminder.id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    const INTERVAL_SECS: u64 = 30;

    fn setup() -> (tempfile::TempDir, Database, Arc<MockTransport>, ReminderScheduler) {
        let dir = tempdir().unwrap();
        let database = Database::new(dir.path().join("test.db")).unwrap();
        let transport = Arc::new(MockTransport::new());
        let scheduler =
            ReminderScheduler::new(database.clone(), transport.clone(), INTERVAL_SECS);
        (dir, database, transport, scheduler)
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_due_one_off_fires_exactly_once_and_is_deleted() {
        let (_dir, database, transport, scheduler) = setup();
        let now = now();
        database
            .add_reminder(1, "stretch", now - ChronoDuration::seconds(5), false)
            .unwrap();

        scheduler.tick(now).await.unwrap();
        assert_eq!(transport.sent_texts(), vec!["⏰ Reminder: stretch".to_string()]);
        assert!(database.list_reminders(1).unwrap().is_empty());

        // A later cycle has nothing left to fire
        scheduler.tick(now + ChronoDuration::seconds(30)).await.unwrap();
        assert_eq!(transport.sent_texts().len(), 1);
    }

    #[tokio::test]
    async fn test_reminder_outside_trailing_window_is_skipped() {
        let (_dir, database, transport, scheduler) = setup();
        let now = now();
        database
            .add_reminder(1, "too old", now - ChronoDuration::seconds(40), false)
            .unwrap();

        scheduler.tick(now).await.unwrap();

        assert!(transport.sent_texts().is_empty());
        // not deleted either: it is skipped, not consumed
        assert_eq!(database.list_reminders(1).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recurring_advances_one_day_from_original_time() {
        let (_dir, database, transport, scheduler) = setup();
        let now = now();
        let original = now - ChronoDuration::seconds(25);
        database.add_reminder(1, "daily walk", original, true).unwrap();

        scheduler.tick(now).await.unwrap();

        assert_eq!(transport.sent_texts().len(), 1);
        let reminders = database.list_reminders(1).unwrap();
        assert_eq!(reminders.len(), 1, "recurring reminders are never deleted");
        // exactly +1 day from the original remind_at, independent of now
        assert_eq!(reminders[0].remind_at, original + ChronoDuration::days(1));
    }

    #[tokio::test]
    async fn test_boundary_remind_at_equals_now_fires() {
        let (_dir, database, transport, scheduler) = setup();
        let now = now();
        database.add_reminder(1, "on the dot", now, false).unwrap();

        scheduler.tick(now).await.unwrap();
        assert_eq!(transport.sent_texts().len(), 1);
    }

    #[tokio::test]
    async fn test_boundary_remind_at_equals_window_start_is_skipped() {
        let (_dir, database, transport, scheduler) = setup();
        let now = now();
        database
            .add_reminder(
                1,
                "exactly one interval old",
                now - ChronoDuration::seconds(INTERVAL_SECS as i64),
                false,
            )
            .unwrap();

        scheduler.tick(now).await.unwrap();
        assert!(transport.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn test_multiple_users_fired_in_one_cycle() {
        let (_dir, database, transport, scheduler) = setup();
        let now = now();
        database
            .add_reminder(1, "first", now - ChronoDuration::seconds(10), false)
            .unwrap();
        database
            .add_reminder(2, "second", now - ChronoDuration::seconds(5), false)
            .unwrap();

        scheduler.tick(now).await.unwrap();

        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, 1);
        assert_eq!(sent[1].0, 2);
    }
}
