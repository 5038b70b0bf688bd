use super::{ApiError, DEFAULT_ONLYFANS_BASE_URL, REQUEST_TIMEOUT};
use crate::models::{Chat, ChatMessage};
use reqwest::Client;
use serde_json::Value;

/// Client for the OnlyFans messaging platform API.
pub struct OnlyFansApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl OnlyFansApiClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_base_url(token, DEFAULT_ONLYFANS_BASE_URL)
    }

    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let token = token.into();
        if token.is_empty() {
            return Err(ApiError::MissingToken);
        }
        let base_url = base_url.into();
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
        })
    }

    /// Fetch the chat list for an account.
    pub async fn get_chats(&self, account_id: &str) -> Result<Vec<Chat>, ApiError> {
        let url = format!("{}/{}/chats", self.base_url, account_id);
        let body: Value = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        extract_chats(&body)
    }

    /// Fetch the messages of one chat, newest first.
    pub async fn get_chat_messages(
        &self,
        account_id: &str,
        chat_id: &str,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let url = format!("{}/{}/chats/{}/messages", self.base_url, account_id, chat_id);
        let body: Value = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        extract_messages(&body)
    }
}

/// Pull the chat objects out of a `{"data": [...]}` envelope. Entries that
/// fail to parse are logged and skipped rather than failing the listing.
pub(crate) fn extract_chats(body: &Value) -> Result<Vec<Chat>, ApiError> {
    let entries = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::Shape("missing data array".into()))?;
    let mut chats = Vec::with_capacity(entries.len());
    for entry in entries {
        match Chat::from_value(entry) {
            Ok(chat) => chats.push(chat),
            Err(e) => log::error!("skipping unparseable chat: {e}"),
        }
    }
    Ok(chats)
}

/// Pull the message list out of a `{"data": {"list": [...]}}` envelope.
pub(crate) fn extract_messages(body: &Value) -> Result<Vec<ChatMessage>, ApiError> {
    let list = body
        .get("data")
        .and_then(|data| data.get("list"))
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::Shape("missing data.list array".into()))?;
    Ok(list
        .iter()
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(message) => Some(message),
            Err(e) => {
                log::error!("skipping unparseable message: {e}");
                None
            }
        })
        .collect())
}
