//! Environment-driven configuration
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::{Context, Result};
use chrono::NaiveTime;
use std::env;

/// Runtime configuration, loaded once at startup from environment variables
/// (a `.env` file is honored via dotenvy in the binary).
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat transport bot token (required)
    pub bot_token: String,
    /// Path to the SQLite database file
    pub database_path: String,
    /// Path to the persisted update cursor file
    pub cursor_path: String,
    /// Default log filter for env_logger
    pub log_level: String,
    /// Reminder dispatch check period, seconds
    pub reminder_interval_secs: u64,
    /// Daily digest check period, seconds
    pub digest_interval_secs: u64,
    /// Time of day used for date-only reminder input ("15 october")
    pub reminder_default_time: NaiveTime,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN")
            .context("BOT_TOKEN environment variable must be set")?;

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "valet.db".to_string());
        let cursor_path =
            env::var("CURSOR_PATH").unwrap_or_else(|_| "update_cursor.txt".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let reminder_interval_secs = parse_var("REMINDER_INTERVAL_SECS", 30)?;
        let digest_interval_secs = parse_var("DIGEST_INTERVAL_SECS", 60)?;

        let default_time_str =
            env::var("REMINDER_DEFAULT_TIME").unwrap_or_else(|_| "09:00".to_string());
        let reminder_default_time = NaiveTime::parse_from_str(&default_time_str, "%H:%M")
            .with_context(|| {
                format!("REMINDER_DEFAULT_TIME must be HH:MM, got '{default_time_str}'")
            })?;

        Ok(Config {
            bot_token,
            database_path,
            cursor_path,
            log_level,
            reminder_interval_secs,
            digest_interval_secs,
            reminder_default_time,
        })
    }
}

fn parse_var(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{name} must be an integer, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_default_when_unset() {
        std::env::remove_var("VALET_TEST_UNSET");
        assert_eq!(parse_var("VALET_TEST_UNSET", 30).unwrap(), 30);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        std::env::set_var("VALET_TEST_GARBAGE", "soon");
        assert!(parse_var("VALET_TEST_GARBAGE", 30).is_err());
        std::env::remove_var("VALET_TEST_GARBAGE");
    }
}
