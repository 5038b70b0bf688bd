use super::{ApiError, DEFAULT_PORTAL_BASE_URL, REQUEST_TIMEOUT};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

/// Client for the AuraChat web portal API.
pub struct WebPortalClient {
    client: Client,
    base_url: String,
}

/// Payload returned by the reply generation endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GeneratedReply {
    pub content: String,
}

impl WebPortalClient {
    pub fn new() -> Result<Self, ApiError> {
        Self::with_base_url(DEFAULT_PORTAL_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Ask the portal to pull fresh messages for a chat into the store.
    pub async fn sync_messages(&self, account_id: &str, chat_id: &str) -> Result<Value, ApiError> {
        let url = format!(
            "{}/api/sync-messages/{}/{}",
            self.base_url, account_id, chat_id
        );
        Ok(self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    /// Ask the portal to draft a reply for a chat.
    pub async fn generate_response(
        &self,
        account_id: &str,
        chat_id: &str,
    ) -> Result<GeneratedReply, ApiError> {
        let url = format!(
            "{}/api/generate-response/{}/{}",
            self.base_url, account_id, chat_id
        );
        Ok(self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}
