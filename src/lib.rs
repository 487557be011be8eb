// Core layer - shared types and configuration
pub mod core;

// Features layer - all feature modules
pub mod features;

// Infrastructure
pub mod database;
pub mod transport;

// Application layer
pub mod context;
pub mod ingest;
pub mod router;
pub mod session;
pub mod ui;

// Re-export core config
pub use core::Config;

pub use context::BotContext;
pub use database::Database;
pub use features::{DigestScheduler, ReminderScheduler};
pub use ingest::UpdateLoop;
