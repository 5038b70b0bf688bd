use crate::api::{DEFAULT_ONLYFANS_BASE_URL, DEFAULT_PORTAL_BASE_URL};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub watcher: crate::backend::config::Config,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    pub onlyfans_base_url: String,
    pub portal_base_url: String,
    /// Bearer token for the messaging platform API. Usually left unset and
    /// supplied through the ONLYFANSAPI_KEY environment variable.
    pub onlyfans_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            onlyfans_base_url: DEFAULT_ONLYFANS_BASE_URL.into(),
            portal_base_url: DEFAULT_PORTAL_BASE_URL.into(),
            onlyfans_token: None,
        }
    }
}

impl ApiConfig {
    /// Token from the config file, falling back to the environment.
    pub fn resolve_token(&self) -> Option<String> {
        self.onlyfans_token
            .clone()
            .or_else(|| env::var("ONLYFANSAPI_KEY").ok())
    }
}
