use crate::api::{ApiError, WebPortalClient};

/// AI reply drafting through the web portal.
pub struct GenerateMessageService {
    portal: WebPortalClient,
}

impl GenerateMessageService {
    pub fn new(portal: WebPortalClient) -> Self {
        Self { portal }
    }

    /// Draft a reply for a chat and return its content.
    pub async fn generate_response(
        &self,
        account_id: &str,
        chat_id: &str,
    ) -> Result<String, ApiError> {
        let reply = self.portal.generate_response(account_id, chat_id).await?;
        Ok(reply.content)
    }
}
