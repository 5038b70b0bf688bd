mod onlyfans;
mod portal;

pub use onlyfans::OnlyFansApiClient;
pub use portal::{GeneratedReply, WebPortalClient};

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ONLYFANS_BASE_URL: &str = "https://app.onlyfansapi.com/api";
pub const DEFAULT_PORTAL_BASE_URL: &str = "https://aurachat-webportal.vercel.app";

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the HTTP collaborators.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No bearer token was configured for the messaging platform API.
    #[error("missing API token")]
    MissingToken,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response shape: {0}")]
    Shape(String),
}
