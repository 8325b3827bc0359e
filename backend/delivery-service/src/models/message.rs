use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_MSG_TYPE: &str = "text";

/// Stored message. `ciphertext` is produced by the sending device and is
/// never inspected server side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    /// `None` for messages not addressed to a specific device
    pub device_id: Option<String>,
    pub ciphertext: String,
    pub msg_type: String,
    pub delivered: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert payload; id, delivered and created_at are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub device_id: Option<String>,
    pub ciphertext: String,
    pub msg_type: String,
}

impl NewMessage {
    pub fn new(sender_id: Uuid, receiver_id: Uuid, ciphertext: impl Into<String>) -> Self {
        Self {
            sender_id,
            receiver_id,
            device_id: None,
            ciphertext: ciphertext.into(),
            msg_type: DEFAULT_MSG_TYPE.to_string(),
        }
    }

    pub fn to_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_type(mut self, msg_type: impl Into<String>) -> Self {
        self.msg_type = msg_type.into();
        self
    }
}

/// Cursor over a conversation. Both fields optional: no `limit` means the
/// whole remaining history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    /// Only messages with an id strictly greater than this
    pub after: Option<i64>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPage {
    pub messages: Vec<Message>,
    /// Set when the page was full and more history may follow
    pub next_cursor: Option<i64>,
}

impl ConversationPage {
    pub fn from_messages(messages: Vec<Message>, page: PageRequest) -> Self {
        let next_cursor = match page.limit {
            Some(limit) if limit > 0 && messages.len() == limit as usize => {
                messages.last().map(|m| m.id)
            }
            _ => None,
        };
        Self {
            messages,
            next_cursor,
        }
    }
}
