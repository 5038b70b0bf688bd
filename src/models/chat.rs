use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The fan side of a chat thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Fan {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub display_name: String,
    pub about: String,
    pub avatar: Option<String>,
    pub is_verified: bool,
    pub is_blocked: bool,
    pub can_chat: bool,
    pub join_date: String,
    pub last_seen: Option<String>,
    pub location: Option<String>,
}

/// A message as the messaging platform reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub text: String,
    pub price: f64,
    pub is_free: bool,
    pub is_tip: bool,
    pub is_new: bool,
    pub is_opened: bool,
    pub media_count: i64,
    pub created_at: Option<DateTime<FixedOffset>>,
    pub changed_at: Option<DateTime<FixedOffset>>,
    pub from_user: Value,
}

/// A chat thread between one account and one fan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Chat {
    pub fan: Fan,
    pub can_send_message: bool,
    pub can_go_to_profile: bool,
    pub unread_messages_count: i64,
    pub has_unread_tips: bool,
    pub is_muted_notifications: bool,
    pub last_message: ChatMessage,
    pub last_read_message_id: i64,
    pub count_pinned_messages: i64,
}

impl Chat {
    /// Build a chat from an API payload. Some responses put the fan fields
    /// at the root of the object instead of under "fan".
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        let mut chat: Chat = serde_json::from_value(value.clone())?;
        if value.get("id").is_some() {
            chat.fan = serde_json::from_value(value.clone())?;
        }
        Ok(chat)
    }
}
