//! Shared context for domain controllers
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use chrono::NaiveTime;
use std::sync::Arc;

use crate::database::Database;
use crate::transport::Transport;

/// Services every controller needs: persistence, the outbound channel, and
/// the default time-of-day for date-only reminder input.
#[derive(Clone)]
pub struct BotContext {
    pub database: Database,
    pub transport: Arc<dyn Transport>,
    pub reminder_default_time: NaiveTime,
}

impl BotContext {
    pub fn new(
        database: Database,
        transport: Arc<dyn Transport>,
        reminder_default_time: NaiveTime,
    ) -> Self {
        Self {
            database,
            transport,
            reminder_default_time,
        }
    }
}
