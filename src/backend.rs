pub mod config;
mod memory;
mod store;
pub mod types;
mod watcher;

pub use memory::{MemoryFeed, MemoryStore};
pub use store::{ChangeFeed, Directory, MessageStore, StoreError};
pub use types::{ChangeEvent, ChangeFilter, ChatDocument, ChatId, OperationKind};
pub use watcher::{MessagesWatcher, Observer};
