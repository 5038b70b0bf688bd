use super::config::Config;
use super::store::{ChangeFeed, MessageStore, StoreError};
use super::types::{ChangeEvent, ChangeFilter, ChatDocument, ChatId};
use crate::utils::lock;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time;

/// Observer invoked with the full document after an effective change.
pub type Observer = Arc<dyn Fn(&ChatDocument) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Tails the store's change feed for a dynamic set of chats and notifies
/// observers once per effective change to a chat's message list.
///
/// Mutating the subscription set invalidates the live feed handle; the watch
/// loop rebuilds it on its next iteration, so changes take effect within one
/// poll wait without a restart.
pub struct MessagesWatcher<S: MessageStore> {
    inner: Arc<Inner<S>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Inner<S> {
    store: S,
    config: Config,
    state: Mutex<State>,
    shared: Mutex<Shared>,
    wake: Notify,
}

#[derive(Default)]
struct Shared {
    watched: HashSet<ChatId>,
    observers: Vec<Observer>,
    fingerprints: HashMap<ChatId, String>,
    feed_stale: bool,
}

impl<S: MessageStore> MessagesWatcher<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, Config::default())
    }

    pub fn with_config(store: S, config: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                state: Mutex::new(State::Stopped),
                shared: Mutex::new(Shared::default()),
                wake: Notify::new(),
            }),
            task: Mutex::new(None),
        }
    }

    /// Spawn the watch loop. No-op if already running; never blocks.
    pub fn start(&self) {
        {
            let mut state = lock(&self.inner.state);
            if *state != State::Stopped {
                return;
            }
            *state = State::Starting;
        }
        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.run().await });
        *lock(&self.task) = Some(task);
    }

    /// Signal the watch loop to exit, wait for it within the configured stop
    /// timeout, and release the store connection. Idempotent; safe to call
    /// without a prior `start`.
    pub async fn stop(&self) {
        {
            let mut state = lock(&self.inner.state);
            if matches!(*state, State::Starting | State::Running) {
                *state = State::Stopping;
            }
        }
        self.inner.wake.notify_one();
        let task = lock(&self.task).take();
        if let Some(mut task) = task {
            let wait = Duration::from_millis(self.inner.config.intervals.stop_timeout);
            match time::timeout(wait, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("watch loop terminated abnormally: {e}"),
                Err(_) => {
                    log::warn!("watch loop did not exit within {wait:?}, aborting");
                    task.abort();
                }
            }
        }
        self.inner.store.close().await;
        *lock(&self.inner.state) = State::Stopped;
    }

    /// Add `observer` unless already registered (pointer identity).
    pub fn register_observer(&self, observer: Observer) {
        let mut shared = lock(&self.inner.shared);
        if shared.observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            return;
        }
        shared.observers.push(observer);
    }

    pub fn unregister_observer(&self, observer: &Observer) {
        lock(&self.inner.shared)
            .observers
            .retain(|o| !Arc::ptr_eq(o, observer));
    }

    /// Start watching `chat_id`. Returns false if it was already watched.
    pub fn add_subscription(&self, chat_id: ChatId) -> bool {
        let mut shared = lock(&self.inner.shared);
        if !shared.watched.insert(chat_id) {
            return false;
        }
        shared.feed_stale = true;
        true
    }

    /// Stop watching `chat_id`. Returns false if it was not watched.
    pub fn remove_subscription(&self, chat_id: ChatId) -> bool {
        let mut shared = lock(&self.inner.shared);
        if !shared.watched.remove(&chat_id) {
            return false;
        }
        shared.feed_stale = true;
        true
    }

    /// Snapshot of the watched set.
    pub fn subscriptions(&self) -> HashSet<ChatId> {
        lock(&self.inner.shared).watched.clone()
    }

    /// Look the chat up right now and run it through the same dedup and
    /// dispatch path as a feed event. Returns whether observers were
    /// notified. Useful to prime state right after subscribing, without
    /// waiting for the next live change.
    pub async fn force_check(&self, chat_id: ChatId) -> Result<bool, StoreError> {
        match self.inner.store.find_chat(chat_id).await? {
            Some(document) => Ok(self.inner.dispatch(&document)),
            None => Ok(false),
        }
    }
}

impl<S: MessageStore> Inner<S> {
    async fn run(self: Arc<Self>) {
        {
            let mut state = lock(&self.state);
            if *state != State::Starting {
                *state = State::Stopped;
                return;
            }
            *state = State::Running;
        }
        let poll_wait = Duration::from_millis(self.config.intervals.poll_wait);
        let backoff = Duration::from_millis(self.config.intervals.retry_backoff);
        let mut feed: Option<S::Feed> = None;
        while self.running() {
            if self.take_feed_stale() {
                if let Some(mut stale) = feed.take() {
                    stale.close().await;
                }
            }
            if feed.is_none() {
                match self.store.watch(self.filter()).await {
                    Ok(opened) => feed = Some(opened),
                    Err(e) if e.is_transient() => {
                        log::warn!("failed to open change feed: {e}");
                        self.pause(backoff).await;
                        continue;
                    }
                    Err(e) => {
                        log::error!("change feed unavailable: {e}");
                        break;
                    }
                }
            }
            let Some(current) = feed.as_mut() else {
                continue;
            };
            tokio::select! {
                _ = self.wake.notified() => {}
                next = current.next(poll_wait) => match next {
                    Ok(Some(event)) => self.handle_event(event),
                    Ok(None) => {}
                    Err(e) if e.is_transient() => {
                        log::warn!("change feed error: {e}");
                        if let Some(mut broken) = feed.take() {
                            broken.close().await;
                        }
                        self.pause(backoff).await;
                    }
                    Err(e) => {
                        log::error!("change feed closed: {e}");
                        break;
                    }
                },
            }
        }
        if let Some(mut open) = feed.take() {
            open.close().await;
        }
        self.store.close().await;
        *lock(&self.state) = State::Stopped;
    }

    fn running(&self) -> bool {
        *lock(&self.state) == State::Running
    }

    fn filter(&self) -> ChangeFilter {
        ChangeFilter::new(lock(&self.shared).watched.clone())
    }

    fn take_feed_stale(&self) -> bool {
        std::mem::take(&mut lock(&self.shared).feed_stale)
    }

    async fn pause(&self, backoff: Duration) {
        tokio::select! {
            _ = self.wake.notified() => {}
            _ = time::sleep(backoff) => {}
        }
    }

    fn handle_event(&self, event: ChangeEvent) {
        let Some(document) = event.document else {
            log::warn!(
                "change event for chat {:?} without full document, skipping",
                event.key
            );
            return;
        };
        self.dispatch(&document);
    }

    /// Dedup-and-notify. Returns whether observers ran.
    fn dispatch(&self, document: &ChatDocument) -> bool {
        let Some(chat_id) = document.chat_id() else {
            log::warn!("chat document without chat_id, skipping");
            return false;
        };
        let fingerprint = document.fingerprint();
        let observers = {
            let mut shared = lock(&self.shared);
            if shared.fingerprints.get(&chat_id) == Some(&fingerprint) {
                log::debug!("chat {chat_id}: messages unchanged");
                return false;
            }
            shared.fingerprints.insert(chat_id, fingerprint);
            shared.observers.clone()
        };
        for observer in observers {
            if panic::catch_unwind(AssertUnwindSafe(|| observer(document))).is_err() {
                log::error!("observer panicked while handling chat {chat_id}");
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::super::config::Intervals;
    use super::super::memory::MemoryStore;
    use super::super::types::OperationKind;
    use super::*;
    use serde_json::{json, Value};
    use std::time::Instant;
    use tokio::time::sleep;

    fn test_config() -> Config {
        Config {
            intervals: Intervals {
                poll_wait: 25,
                retry_backoff: 25,
                stop_timeout: 500,
            },
        }
    }

    fn watcher(store: &MemoryStore) -> MessagesWatcher<MemoryStore> {
        MessagesWatcher::with_config(store.clone(), test_config())
    }

    fn recording_observer() -> (Observer, Arc<Mutex<Vec<ChatDocument>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer: Observer = Arc::new(move |document: &ChatDocument| {
            sink.lock().unwrap().push(document.clone());
        });
        (observer, seen)
    }

    fn message(content: &str) -> Value {
        json!({"role": "client", "content": content, "created_at": "2024-01-01T00:00:00Z"})
    }

    async fn wait_until(condition: impl Fn() -> bool) -> bool {
        for _ in 0..100 {
            if condition() {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    async fn wait_for_feed(store: &MemoryStore) {
        assert!(
            wait_until(|| store.feed_count() > 0).await,
            "watch loop never opened a feed"
        );
    }

    #[tokio::test]
    async fn dispatches_update_for_watched_chat() {
        let store = MemoryStore::new();
        let watcher = watcher(&store);
        let (observer, seen) = recording_observer();
        watcher.register_observer(observer);
        assert!(watcher.add_subscription(42));
        assert!(!watcher.add_subscription(42));
        watcher.start();
        wait_for_feed(&store).await;
        store.set_messages(42, vec![message("m1")]);
        assert!(wait_until(|| !seen.lock().unwrap().is_empty()).await);
        {
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].chat_id(), Some(42));
            assert_eq!(seen[0].messages().len(), 1);
        }
        watcher.stop().await;
    }

    #[tokio::test]
    async fn identical_payload_is_not_redispatched() {
        let store = MemoryStore::new();
        let watcher = watcher(&store);
        let (observer, seen) = recording_observer();
        watcher.register_observer(observer);
        watcher.add_subscription(42);
        watcher.start();
        wait_for_feed(&store).await;
        store.set_messages(42, vec![message("m1")]);
        assert!(wait_until(|| seen.lock().unwrap().len() == 1).await);
        // byte-identical rewrite: delivered by the feed, elided by dedup
        store.set_messages(42, vec![message("m1")]);
        sleep(Duration::from_millis(150)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
        // an actual change still goes through
        store.set_messages(42, vec![message("m1"), message("m2")]);
        assert!(wait_until(|| seen.lock().unwrap().len() == 2).await);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn unsubscribed_chat_is_filtered_until_added() {
        let store = MemoryStore::new();
        let watcher = watcher(&store);
        let (observer, seen) = recording_observer();
        watcher.register_observer(observer);
        watcher.add_subscription(42);
        watcher.start();
        wait_for_feed(&store).await;
        store.set_messages(99, vec![message("m1")]);
        sleep(Duration::from_millis(150)).await;
        assert!(seen.lock().unwrap().is_empty());
        // subscribing while running picks the chat up without a restart
        assert!(watcher.add_subscription(99));
        sleep(Duration::from_millis(150)).await;
        store.set_messages(99, vec![message("m1")]);
        assert!(wait_until(|| seen.lock().unwrap().len() == 1).await);
        assert_eq!(seen.lock().unwrap()[0].chat_id(), Some(99));
        watcher.stop().await;
    }

    #[tokio::test]
    async fn removed_subscription_stops_dispatch() {
        let store = MemoryStore::new();
        let watcher = watcher(&store);
        let (observer, seen) = recording_observer();
        watcher.register_observer(observer);
        watcher.add_subscription(42);
        watcher.start();
        wait_for_feed(&store).await;
        store.set_messages(42, vec![message("m1")]);
        assert!(wait_until(|| seen.lock().unwrap().len() == 1).await);
        assert!(watcher.remove_subscription(42));
        assert!(!watcher.remove_subscription(42));
        sleep(Duration::from_millis(150)).await;
        store.set_messages(42, vec![message("m2")]);
        sleep(Duration::from_millis(150)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn duplicate_registration_notifies_once() {
        let store = MemoryStore::new();
        let watcher = watcher(&store);
        let (observer, seen) = recording_observer();
        watcher.register_observer(observer.clone());
        watcher.register_observer(observer);
        watcher.add_subscription(42);
        watcher.start();
        wait_for_feed(&store).await;
        store.set_messages(42, vec![message("m1")]);
        assert!(wait_until(|| !seen.lock().unwrap().is_empty()).await);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn unregistered_observer_no_longer_fires() {
        let store = MemoryStore::new();
        let watcher = watcher(&store);
        let (observer, seen) = recording_observer();
        watcher.register_observer(observer.clone());
        watcher.unregister_observer(&observer);
        watcher.add_subscription(42);
        watcher.start();
        wait_for_feed(&store).await;
        store.set_messages(42, vec![message("m1")]);
        sleep(Duration::from_millis(150)).await;
        assert!(seen.lock().unwrap().is_empty());
        watcher.stop().await;
    }

    #[tokio::test]
    async fn panicking_observer_is_isolated() {
        let store = MemoryStore::new();
        let watcher = watcher(&store);
        let faulty: Observer = Arc::new(|_: &ChatDocument| panic!("observer failure"));
        let (observer, seen) = recording_observer();
        watcher.register_observer(faulty);
        watcher.register_observer(observer);
        watcher.add_subscription(42);
        watcher.start();
        wait_for_feed(&store).await;
        store.set_messages(42, vec![message("m1")]);
        assert!(wait_until(|| seen.lock().unwrap().len() == 1).await);
        // the loop survives and keeps processing events
        store.set_messages(42, vec![message("m1"), message("m2")]);
        assert!(wait_until(|| seen.lock().unwrap().len() == 2).await);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn force_check_dispatches_without_feed() {
        let store = MemoryStore::new();
        store.set_messages(42, vec![message("m1")]);
        let watcher = watcher(&store);
        let (observer, seen) = recording_observer();
        watcher.register_observer(observer);
        watcher.add_subscription(42);
        let dispatched = watcher.force_check(42).await.expect("store error");
        assert!(dispatched);
        assert_eq!(seen.lock().unwrap().len(), 1);
        // same content again: suppressed by the shared dedup path
        assert!(!watcher.force_check(42).await.expect("store error"));
        // unknown chats dispatch nothing
        assert!(!watcher.force_check(99).await.expect("store error"));
        watcher.stop().await;
    }

    #[tokio::test]
    async fn event_without_document_is_skipped() {
        let store = MemoryStore::new();
        let watcher = watcher(&store);
        let (observer, seen) = recording_observer();
        watcher.register_observer(observer);
        watcher.add_subscription(42);
        watcher.start();
        wait_for_feed(&store).await;
        store.publish(ChangeEvent {
            operation: OperationKind::Update,
            key: Some(42),
            document: None,
        });
        sleep(Duration::from_millis(150)).await;
        assert!(seen.lock().unwrap().is_empty());
        store.set_messages(42, vec![message("m1")]);
        assert!(wait_until(|| seen.lock().unwrap().len() == 1).await);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let store = MemoryStore::new();
        let watcher = watcher(&store);
        watcher.start();
        watcher.start();
        wait_for_feed(&store).await;
        sleep(Duration::from_millis(100)).await;
        assert_eq!(store.feed_count(), 1);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn stop_joins_within_bound() {
        let store = MemoryStore::new();
        let watcher = watcher(&store);
        watcher.add_subscription(42);
        watcher.start();
        wait_for_feed(&store).await;
        let started = Instant::now();
        watcher.stop().await;
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn stop_without_start_is_safe() {
        let store = MemoryStore::new();
        let watcher = watcher(&store);
        watcher.stop().await;
        watcher.stop().await;
    }

    #[tokio::test]
    async fn subscriptions_returns_a_copy() {
        let store = MemoryStore::new();
        let watcher = watcher(&store);
        watcher.add_subscription(42);
        let mut snapshot = watcher.subscriptions();
        snapshot.insert(99);
        assert_eq!(watcher.subscriptions(), HashSet::from([42]));
    }
}
