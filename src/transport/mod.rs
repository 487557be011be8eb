//! # Chat Transport
//!
//! The seam between the assistant and the chat platform. The rest of the
//! crate only sees the [`Transport`] trait and the platform-neutral
//! [`Update`]/[`Event`] wire model; the HTTP long-poll client lives in
//! [`http`].
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod http;

pub use http::HttpTransport;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Opaque keyboard/button markup attached to an outbound message.
pub type Markup = serde_json::Value;

/// One inbound update with its monotonically increasing cursor id.
#[derive(Debug, Clone)]
pub struct Update {
    pub id: i64,
    pub event: Event,
}

#[derive(Debug, Clone)]
pub enum Event {
    /// Free-text message typed by the user (includes reply-keyboard taps,
    /// which arrive as plain text).
    Text(TextEvent),
    /// Inline button press carrying an opaque callback token.
    Button(ButtonEvent),
}

#[derive(Debug, Clone)]
pub struct TextEvent {
    pub chat_id: i64,
    pub user_id: i64,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ButtonEvent {
    pub chat_id: i64,
    pub user_id: i64,
    /// Message the button was attached to; used for in-place edits.
    pub message_id: i64,
    pub token: String,
}

/// Outbound/inbound chat channel.
///
/// Implementations must be safe to share across tasks; the update loop and
/// both schedulers hold the same instance.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Long-poll for updates strictly after `cursor`, in order.
    async fn poll(&self, cursor: i64, timeout: Duration) -> Result<Vec<Update>>;

    /// Send a new message to a chat.
    async fn send(&self, chat_id: i64, text: &str, markup: Option<&Markup>) -> Result<()>;

    /// Edit a previously sent message in place.
    async fn edit(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        markup: Option<&Markup>,
    ) -> Result<()>;
}

/// Recording transport used by scheduler and controller tests.
#[cfg(test)]
pub struct MockTransport {
    pub sent: std::sync::Mutex<Vec<(i64, String)>>,
    pub edited: std::sync::Mutex<Vec<(i64, i64, String)>>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            sent: std::sync::Mutex::new(Vec::new()),
            edited: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for MockTransport {
    async fn poll(&self, _cursor: i64, _timeout: Duration) -> Result<Vec<Update>> {
        Ok(Vec::new())
    }

    async fn send(&self, chat_id: i64, text: &str, _markup: Option<&Markup>) -> Result<()> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn edit(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        _markup: Option<&Markup>,
    ) -> Result<()> {
        self.edited
            .lock()
            .unwrap()
            .push((chat_id, message_id, text.to_string()));
        Ok(())
    }
}
