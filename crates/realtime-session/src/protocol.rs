//! Wire-format types for the realtime conversational API.
//!
//! The schema is fixed by the upstream provider; only the handful of events
//! the turn machinery reacts to are modeled. Everything else parses to
//! [`ServerEvent::Other`] and is ignored.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionProps },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
    #[serde(rename = "response.create")]
    ResponseCreate,
    #[serde(rename = "response.cancel")]
    ResponseCancel { response_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionProps {
    pub instructions: String,
    pub voice: String,
    pub modalities: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ConversationItem {
    #[serde(rename = "message")]
    Message {
        role: String,
        content: Vec<ContentPart>,
    },
    #[serde(rename = "function_call_output")]
    FunctionCallOutput { call_id: String, output: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "input_text")]
    InputText { text: String },
}

impl ClientEvent {
    pub fn configure(instructions: &str, voice: &str) -> Self {
        Self::SessionUpdate {
            session: SessionProps {
                instructions: instructions.to_string(),
                voice: voice.to_string(),
                modalities: vec!["text".to_string(), "audio".to_string()],
            },
        }
    }

    pub fn user_text(text: &str) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem::Message {
                role: "user".to_string(),
                content: vec![ContentPart::InputText {
                    text: text.to_string(),
                }],
            },
        }
    }

    pub fn tool_output(call_id: &str, output: &str) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput {
                call_id: call_id.to_string(),
                output: output.to_string(),
            },
        }
    }

    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Server events the session coordinator reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    SessionUpdated,
    ResponseCreated { response_id: String },
    ResponseDone { response_id: String },
    AudioDelta,
    Error { message: String },
    /// Anything unknown or unparseable; logged and ignored.
    Other(String),
}

pub fn parse_server_event(raw: &str) -> ServerEvent {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => return ServerEvent::Other("unparseable".to_string()),
    };

    let response_id = |value: &Value| {
        value
            .get("response")
            .and_then(|r| r.get("id"))
            .and_then(|id| id.as_str())
            .unwrap_or_default()
            .to_string()
    };

    match value.get("type").and_then(|t| t.as_str()) {
        Some("session.updated") => ServerEvent::SessionUpdated,
        Some("response.created") => ServerEvent::ResponseCreated {
            response_id: response_id(&value),
        },
        Some("response.done") => ServerEvent::ResponseDone {
            response_id: response_id(&value),
        },
        Some("response.audio.delta") => ServerEvent::AudioDelta,
        Some("error") => ServerEvent::Error {
            message: value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string(),
        },
        Some(other) => ServerEvent::Other(other.to_string()),
        None => ServerEvent::Other("missing type".to_string()),
    }
}
