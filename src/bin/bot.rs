use anyhow::Result;
use dotenvy::dotenv;
use log::info;
use std::sync::Arc;

use valet::features::{DigestScheduler, ReminderScheduler};
use valet::transport::http::HttpTransport;
use valet::{BotContext, Config, Database, UpdateLoop};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting Valet assistant bot...");

    // Database startup failure is the only fatal error
    let database = Database::new(&config.database_path)?;

    let transport = Arc::new(HttpTransport::new(&config.bot_token));
    let ctx = BotContext::new(
        database.clone(),
        transport.clone(),
        config.reminder_default_time,
    );

    let reminder_scheduler = ReminderScheduler::new(
        database.clone(),
        transport.clone(),
        config.reminder_interval_secs,
    );
    tokio::spawn(reminder_scheduler.run());

    let digest_scheduler =
        DigestScheduler::new(database, transport, config.digest_interval_secs);
    tokio::spawn(digest_scheduler.run());

    // The update loop owns all session state and runs on the main task
    UpdateLoop::new(ctx, &config.cursor_path).run().await;

    Ok(())
}
