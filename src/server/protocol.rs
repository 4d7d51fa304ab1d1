//! JSON messages exchanged over the WebSocket and HTTP endpoints

use crate::types::{Event, PublisherId};
use serde::{Deserialize, Serialize};

/// Frame sent by a publishing client
///
/// `{"action": "send", "data": <any>}` publishes `data`;
/// `{"action": "close"}` ends the session. Other actions are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// What a publish frame asks the server to do
#[derive(Debug, Clone, PartialEq)]
pub enum PublishAction {
    Send(serde_json::Value),
    Close,
    Ignore,
}

impl PublishRequest {
    /// Decode a text or binary frame
    pub fn parse(frame: &[u8]) -> serde_json::Result<PublishAction> {
        let request: PublishRequest = serde_json::from_slice(frame)?;
        Ok(request.into_action())
    }

    pub fn into_action(self) -> PublishAction {
        match self.action.as_deref() {
            Some("send") => PublishAction::Send(self.data),
            Some("close") => PublishAction::Close,
            _ => PublishAction::Ignore,
        }
    }
}

/// Frame pushed to a subscribing client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    /// A delivered event
    Event {
        sender: PublisherId,
        data: &'a serde_json::Value,
    },
}

impl<'a> From<&'a Event> for ServerMessage<'a> {
    fn from(event: &'a Event) -> Self {
        ServerMessage::Event {
            sender: event.sender,
            data: &event.payload,
        }
    }
}

/// Body of `GET /status`
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(rename = "_status")]
    pub status: u16,
    pub message: String,
}

/// Body of `GET /topic/:topic`
#[derive(Debug, Serialize, Deserialize)]
pub struct TopicInfo {
    /// Whether the topic already exists
    pub active: bool,
    #[serde(rename = "publishWS")]
    pub publish_ws: String,
    #[serde(rename = "subscribeWS")]
    pub subscribe_ws: String,
}
