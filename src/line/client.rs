//! LINE Messaging API client

use crate::runtime::{
    fallback_display_name, DeliveryError, DisplayNameResolver, ReplyToken, Responder,
};
use crate::state_machine::{Choice, ListItem};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://api.line.me/v2/bot";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// LINE rejects quick-reply labels longer than this
const MAX_LABEL_CHARS: usize = 20;
/// And more than this many quick-reply buttons
const MAX_QUICK_REPLIES: usize = 13;

#[derive(Debug, Error)]
pub enum LineError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LINE API returned {status}: {body}")]
    Api { status: u16, body: String },
}

impl From<LineError> for DeliveryError {
    fn from(err: LineError) -> Self {
        DeliveryError(err.to_string())
    }
}

/// Client for the reply, push and profile endpoints
pub struct LineClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl LineClient {
    pub fn new(access_token: impl Into<String>) -> Result<Self, LineError> {
        Self::with_base_url(access_token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        access_token: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, LineError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            access_token: access_token.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, path: &str, payload: &impl Serialize) -> Result<(), LineError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LineError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn reply(&self, reply: &ReplyToken, message: OutboundMessage) -> Result<(), LineError> {
        let payload = ReplyRequest {
            reply_token: reply.as_str(),
            messages: vec![message],
        };
        self.post("/message/reply", &payload).await
    }

    async fn push(&self, to: &str, message: OutboundMessage) -> Result<(), LineError> {
        let payload = PushRequest {
            to,
            messages: vec![message],
        };
        self.post("/message/push", &payload).await
    }

    async fn profile(&self, user_id: &str) -> Result<Profile, LineError> {
        let response = self
            .client
            .get(format!("{}/profile/{user_id}", self.base_url))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LineError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Responder for LineClient {
    async fn send_text(&self, reply: &ReplyToken, text: &str) -> Result<(), DeliveryError> {
        Ok(self.reply(reply, OutboundMessage::text(text)).await?)
    }

    async fn send_choice_prompt(
        &self,
        reply: &ReplyToken,
        prompt: &str,
        options: &[Choice],
    ) -> Result<(), DeliveryError> {
        let message = OutboundMessage::Text {
            text: prompt.to_string(),
            quick_reply: Some(QuickReply::from_choices(options)),
        };
        Ok(self.reply(reply, message).await?)
    }

    async fn send_list(
        &self,
        reply: &ReplyToken,
        header: &str,
        items: &[ListItem],
    ) -> Result<(), DeliveryError> {
        Ok(self.reply(reply, list_bubble(header, items)).await?)
    }

    async fn push_notify(&self, user_id: &str, text: &str) -> Result<(), DeliveryError> {
        Ok(self.push(user_id, OutboundMessage::text(text)).await?)
    }
}

#[async_trait]
impl DisplayNameResolver for LineClient {
    async fn resolve(&self, user_id: &str) -> String {
        match self.profile(user_id).await {
            Ok(profile) => profile.display_name,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Profile lookup failed");
                fallback_display_name(user_id)
            }
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    #[serde(rename = "replyToken")]
    reply_token: &'a str,
    messages: Vec<OutboundMessage>,
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: Vec<OutboundMessage>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(rename = "displayName")]
    display_name: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OutboundMessage {
    Text {
        text: String,
        #[serde(rename = "quickReply", skip_serializing_if = "Option::is_none")]
        quick_reply: Option<QuickReply>,
    },
    Flex {
        #[serde(rename = "altText")]
        alt_text: String,
        contents: Value,
    },
}

impl OutboundMessage {
    fn text(text: &str) -> Self {
        OutboundMessage::Text {
            text: text.to_string(),
            quick_reply: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct QuickReply {
    items: Vec<QuickReplyItem>,
}

impl QuickReply {
    fn from_choices(choices: &[Choice]) -> Self {
        let items = choices
            .iter()
            .take(MAX_QUICK_REPLIES)
            .map(|choice| QuickReplyItem {
                kind: "action",
                action: MessageAction::from(choice),
            })
            .collect();
        Self { items }
    }
}

#[derive(Debug, Serialize)]
struct QuickReplyItem {
    #[serde(rename = "type")]
    kind: &'static str,
    action: MessageAction,
}

/// Tapping sends `text` back as if the user typed it
#[derive(Debug, Serialize)]
struct MessageAction {
    #[serde(rename = "type")]
    kind: &'static str,
    label: String,
    text: String,
}

impl From<&Choice> for MessageAction {
    fn from(choice: &Choice) -> Self {
        Self {
            kind: "message",
            label: choice.label.chars().take(MAX_LABEL_CHARS).collect(),
            text: choice.text.clone(),
        }
    }
}

/// One bubble: header, then each item with its own button
fn list_bubble(header: &str, items: &[ListItem]) -> OutboundMessage {
    let rows: Vec<Value> = items
        .iter()
        .map(|item| {
            let mut contents = vec![json!({
                "type": "text",
                "text": item.text,
                "wrap": true,
                "size": "sm",
            })];
            if let Some(action) = &item.action {
                contents.push(json!({
                    "type": "button",
                    "style": "primary",
                    "color": "#dc3545",
                    "height": "sm",
                    "action": MessageAction::from(action),
                }));
            }
            json!({
                "type": "box",
                "layout": "vertical",
                "spacing": "sm",
                "contents": contents,
            })
        })
        .collect();

    OutboundMessage::Flex {
        alt_text: header.to_string(),
        contents: json!({
            "type": "bubble",
            "body": {
                "type": "box",
                "layout": "vertical",
                "spacing": "md",
                "contents": [
                    { "type": "text", "text": header, "weight": "bold", "size": "lg" },
                    { "type": "separator" },
                    { "type": "box", "layout": "vertical", "spacing": "md", "contents": rows },
                ],
            },
        }),
    }
}
