use crate::api::{ApiError, OnlyFansApiClient};
use crate::models::ChatMessage;
use serde_json::Value;

/// Message retrieval for a single chat.
pub struct MessageService {
    api: OnlyFansApiClient,
}

impl MessageService {
    pub fn new(api: OnlyFansApiClient) -> Self {
        Self { api }
    }

    /// Text of the most recent message in a chat, if any. The platform
    /// returns messages newest first.
    pub async fn most_recent_message_text(
        &self,
        account_id: &str,
        chat_id: &str,
    ) -> Result<Option<String>, ApiError> {
        let messages = self.api.get_chat_messages(account_id, chat_id).await?;
        Ok(messages.first().map(|message| message.text.clone()))
    }
}

/// The most recent message sent by the fan, given a newest-first list.
pub fn last_fan_message(messages: &[ChatMessage], fan_id: i64) -> Option<&ChatMessage> {
    messages
        .iter()
        .find(|message| message.from_user.get("id").and_then(Value::as_i64) == Some(fan_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(id: i64, text: &str, from_id: i64) -> ChatMessage {
        ChatMessage {
            id,
            text: text.into(),
            from_user: json!({"id": from_id}),
            ..Default::default()
        }
    }

    #[test]
    fn finds_most_recent_fan_message() {
        let messages = vec![
            message(3, "creator reply", 1),
            message(2, "fan question", 7),
            message(1, "fan hello", 7),
        ];
        let found = last_fan_message(&messages, 7).expect("no fan message");
        assert_eq!(found.text, "fan question");
        assert!(last_fan_message(&messages, 99).is_none());
    }
}
