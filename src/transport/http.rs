//! Bot-API-style HTTP long-poll transport
//!
//! Speaks the JSON shape of the hosted bot gateway: `getUpdates` with an
//! offset cursor, `sendMessage` / `editMessageText` for output, and
//! `answerCallbackQuery` to acknowledge button presses.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{ButtonEvent, Event, Markup, TextEvent, Transport, Update};

/// Extra slack on top of the server-side long-poll timeout.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    update_id: i64,
    message: Option<RawMessage>,
    callback_query: Option<RawCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    message_id: i64,
    from: Option<RawUser>,
    chat: RawChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCallbackQuery {
    id: String,
    from: RawUser,
    message: Option<RawMessage>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

impl HttpTransport {
    pub fn new(token: &str) -> Self {
        HttpTransport {
            http: reqwest::Client::new(),
            base_url: format!("https://api.telegram.org/bot{token}"),
        }
    }

    async fn post(&self, method: &str, payload: serde_json::Value) -> Result<()> {
        let url = format!("{}/{method}", self.base_url);
        let response: ApiResponse<serde_json::Value> = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("network error calling {method}"))?
            .json()
            .await
            .with_context(|| format!("malformed response from {method}"))?;

        if !response.ok {
            return Err(anyhow!(
                "{method} rejected: {}",
                response.description.unwrap_or_else(|| "no description".to_string())
            ));
        }
        Ok(())
    }

    /// Acknowledge a button press so the client stops its spinner. Failure
    /// here is cosmetic and never fails the poll.
    async fn ack_callback(&self, callback_id: &str) {
        let payload = json!({ "callback_query_id": callback_id });
        if let Err(e) = self.post("answerCallbackQuery", payload).await {
            warn!("failed to ack callback query {callback_id}: {e}");
        }
    }

    async fn convert(&self, raw: RawUpdate) -> Option<Update> {
        if let Some(callback) = raw.callback_query {
            self.ack_callback(&callback.id).await;
            let message = callback.message?;
            let token = callback.data?;
            return Some(Update {
                id: raw.update_id,
                event: Event::Button(ButtonEvent {
                    chat_id: message.chat.id,
                    user_id: callback.from.id,
                    message_id: message.message_id,
                    token,
                }),
            });
        }

        if let Some(message) = raw.message {
            let user = message.from?;
            let text = message.text?;
            return Some(Update {
                id: raw.update_id,
                event: Event::Text(TextEvent {
                    chat_id: message.chat.id,
                    user_id: user.id,
                    text,
                }),
            });
        }

        debug!("dropping update {} with no usable payload", raw.update_id);
        None
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn poll(&self, cursor: i64, timeout: Duration) -> Result<Vec<Update>> {
        let url = format!("{}/getUpdates", self.base_url);
        let response: ApiResponse<Vec<RawUpdate>> = self
            .http
            .get(&url)
            .query(&[("offset", cursor + 1), ("timeout", timeout.as_secs() as i64)])
            .timeout(timeout + REQUEST_TIMEOUT_MARGIN)
            .send()
            .await
            .context("network error calling getUpdates")?
            .json()
            .await
            .context("malformed response from getUpdates")?;

        if !response.ok {
            return Err(anyhow!(
                "getUpdates rejected: {}",
                response.description.unwrap_or_else(|| "no description".to_string())
            ));
        }

        let mut updates = Vec::new();
        for raw in response.result.unwrap_or_default() {
            if let Some(update) = self.convert(raw).await {
                updates.push(update);
            }
        }
        Ok(updates)
    }

    async fn send(&self, chat_id: i64, text: &str, markup: Option<&Markup>) -> Result<()> {
        let mut payload = json!({ "chat_id": chat_id, "text": text });
        if let Some(markup) = markup {
            payload["reply_markup"] = markup.clone();
        }
        self.post("sendMessage", payload).await
    }

    async fn edit(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        markup: Option<&Markup>,
    ) -> Result<()> {
        let mut payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        if let Some(markup) = markup {
            payload["reply_markup"] = markup.clone();
        }
        self.post("editMessageText", payload).await
    }
}
