use super::store::{ChangeFeed, Directory, MessageStore, StoreError};
use super::types::{ChangeEvent, ChangeFilter, ChatDocument, ChatId, OperationKind};
use crate::models::{OnlyFansAccount, User};
use crate::utils::lock;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{timeout, Instant};

const EVENT_CAPACITY: usize = 64;

/// In-process document store. Every chat write is broadcast as a
/// full-document change event, whether or not the content differs; eliding
/// repeats is the watcher's job.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    chats: Mutex<HashMap<ChatId, ChatDocument>>,
    users: Mutex<HashMap<String, User>>,
    accounts: Mutex<HashMap<String, OnlyFansAccount>>,
    events: broadcast::Sender<ChangeEvent>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                chats: Mutex::new(HashMap::new()),
                users: Mutex::new(HashMap::new()),
                accounts: Mutex::new(HashMap::new()),
                events,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn insert_user(&self, user: User) {
        lock(&self.inner.users).insert(user.email.clone(), user);
    }

    pub fn insert_account(&self, account: OnlyFansAccount) {
        lock(&self.inner.accounts).insert(account.account_id.clone(), account);
    }

    /// Write the full document for a chat and broadcast the change.
    pub fn upsert_chat(&self, chat_id: ChatId, document: ChatDocument) {
        let operation = {
            let mut chats = lock(&self.inner.chats);
            if chats.insert(chat_id, document.clone()).is_some() {
                OperationKind::Replace
            } else {
                OperationKind::Insert
            }
        };
        self.publish(ChangeEvent {
            operation,
            key: Some(chat_id),
            document: Some(document),
        });
    }

    /// Replace just the messages array of a chat, as the sync pipeline does.
    pub fn set_messages(&self, chat_id: ChatId, messages: Vec<Value>) {
        let (operation, document) = {
            let mut chats = lock(&self.inner.chats);
            match chats.get_mut(&chat_id) {
                Some(existing) => {
                    existing.insert("messages", Value::Array(messages));
                    (OperationKind::Update, existing.clone())
                }
                None => {
                    let document = ChatDocument::with_messages(chat_id, messages);
                    chats.insert(chat_id, document.clone());
                    (OperationKind::Insert, document)
                }
            }
        };
        self.publish(ChangeEvent {
            operation,
            key: Some(chat_id),
            document: Some(document),
        });
    }

    /// Broadcast an event as-is. Lets callers replay feed traffic that did
    /// not come from a local write.
    pub fn publish(&self, event: ChangeEvent) {
        self.inner.events.send(event).ok();
    }

    /// Number of live feed handles.
    pub fn feed_count(&self) -> usize {
        self.inner.events.receiver_count()
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    type Feed = MemoryFeed;

    async fn find_chat(&self, chat_id: ChatId) -> Result<Option<ChatDocument>, StoreError> {
        self.check_open()?;
        Ok(lock(&self.inner.chats).get(&chat_id).cloned())
    }

    async fn watch(&self, filter: ChangeFilter) -> Result<MemoryFeed, StoreError> {
        self.check_open()?;
        Ok(MemoryFeed {
            rx: Some(self.inner.events.subscribe()),
            filter,
        })
    }

    async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Directory for MemoryStore {
    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.check_open()?;
        Ok(lock(&self.inner.users).get(email).cloned())
    }

    async fn find_account(
        &self,
        account_id: &str,
    ) -> Result<Option<OnlyFansAccount>, StoreError> {
        self.check_open()?;
        Ok(lock(&self.inner.accounts).get(account_id).cloned())
    }
}

/// Feed handle over the store's broadcast channel, filtered per subscriber.
pub struct MemoryFeed {
    rx: Option<broadcast::Receiver<ChangeEvent>>,
    filter: ChangeFilter,
}

#[async_trait]
impl ChangeFeed for MemoryFeed {
    async fn next(&mut self, wait: Duration) -> Result<Option<ChangeEvent>, StoreError> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(StoreError::Closed);
        };
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match timeout(remaining, rx.recv()).await {
                Ok(Ok(event)) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Ok(Err(broadcast::error::RecvError::Lagged(missed))) => {
                    log::warn!("change feed lagged, {missed} events dropped");
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(StoreError::Transient("event channel closed".into()));
                }
                Err(_) => return Ok(None),
            }
        }
    }

    async fn close(&mut self) {
        self.rx = None;
    }
}
