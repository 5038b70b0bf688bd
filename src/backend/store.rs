use super::types::{ChangeEvent, ChangeFilter, ChatDocument, ChatId};
use crate::models::{OnlyFansAccount, User};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection could not be established.
    #[error("store connection failed: {0}")]
    Connection(String),
    /// A request failed in a way a retry may fix.
    #[error("store request failed: {0}")]
    Transient(String),
    /// The store has been closed.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Live handle on a change feed. `next` waits at most `wait` for an event
/// and returns `Ok(None)` when nothing arrived in time.
#[async_trait]
pub trait ChangeFeed: Send {
    async fn next(&mut self, wait: Duration) -> Result<Option<ChangeEvent>, StoreError>;
    async fn close(&mut self);
}

/// Document store holding one logical collection of chat documents.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    type Feed: ChangeFeed;

    /// Point lookup of one chat document.
    async fn find_chat(&self, chat_id: ChatId) -> Result<Option<ChatDocument>, StoreError>;

    /// Subscribe to changes matching `filter`, with full-document delivery.
    async fn watch(&self, filter: ChangeFilter) -> Result<Self::Feed, StoreError>;

    /// Release the underlying connection. Idempotent.
    async fn close(&self);
}

/// Account directory: who can sign in, and which accounts they own.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_account(&self, account_id: &str)
        -> Result<Option<OnlyFansAccount>, StoreError>;
}
