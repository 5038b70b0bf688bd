use crate::api::{ApiError, OnlyFansApiClient};
use crate::models::Chat;
use indexmap::IndexMap;

/// Chat listings per connected account.
pub struct ChatService {
    api: OnlyFansApiClient,
}

impl ChatService {
    pub fn new(api: OnlyFansApiClient) -> Self {
        Self { api }
    }

    /// Fetch the current chat list for an account.
    pub async fn chats_for_account(&self, account_id: &str) -> Result<Vec<Chat>, ApiError> {
        self.api.get_chats(account_id).await
    }
}

/// Merge freshly fetched chats into an insertion-ordered map keyed by fan
/// id. Known chats are updated in place; new ones are appended.
pub fn update_chats(fetched: &[Chat], chats: &mut IndexMap<i64, Chat>) {
    for chat in fetched {
        if let Some(entry) = chats.get_mut(&chat.fan.id) {
            *entry = chat.clone();
        } else {
            chats.insert(chat.fan.id, chat.clone());
        }
    }
}
