use serde::{ Serialize, Deserialize };
use chrono::{ DateTime, Utc };

use super::chat::ChatMessage;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "clear")] Clear {
        #[serde(default)]
        confirm: bool,
    },
    #[serde(rename = "history")]
    History,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "snapshot")] Snapshot {
        messages: Vec<ChatMessage>,
        loading: bool,
    },
    #[serde(rename = "appended")] Appended {
        message: ChatMessage,
    },
    #[serde(rename = "partial")] Partial {
        id: String,
        content: String,
        delta: String,
    },
    #[serde(rename = "done")] Done {
        id: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "error")] Error {
        id: Option<String>,
        message: String,
    },
    /// `loading` stays true when a reply was still streaming at the time of
    /// the clear; it is reported by the `done`/`error` that ends that turn.
    #[serde(rename = "cleared")] Cleared {
        messages: Vec<ChatMessage>,
        loading: bool,
    },
    #[serde(rename = "busy")]
    Busy,
    #[serde(rename = "invalid")] Invalid {
        message: String,
    },
}
