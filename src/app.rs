use crate::api::{OnlyFansApiClient, WebPortalClient};
use crate::backend::{ChatDocument, ChatId, MemoryStore, MessagesWatcher};
use crate::config::Config;
use crate::services::{update_chats, ChatService, GenerateMessageService};
use crate::session::Session;
use crate::types::Event;
use color_eyre::Result;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;

pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        log::debug!("App::new({config:?})");
        Self { config }
    }

    /// Run the headless client against `store` until interrupted: sign in
    /// when an email is given, start the watcher on `chat_ids`, and log a
    /// status line per effective message change.
    pub async fn watch(
        &mut self,
        store: MemoryStore,
        email: Option<String>,
        chat_ids: Vec<ChatId>,
    ) -> Result<()> {
        if let Some(email) = email {
            let mut session = Session::new(store.clone());
            if session.sign_in(&email).await? {
                log::info!(
                    "signed in as {email}, {} linked accounts",
                    session.accounts().len()
                );
                for account in session.accounts() {
                    log::info!("account {}: {}", account.account_id, account.name);
                }
            } else {
                log::warn!("no user found for {email}");
            }
        }

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let watcher = MessagesWatcher::with_config(store.clone(), self.config.watcher.clone());
        let tx = event_tx.clone();
        watcher.register_observer(Arc::new(move |document: &ChatDocument| {
            tx.send(Event::MessagesChanged(document.clone())).ok();
        }));
        for chat_id in chat_ids {
            watcher.add_subscription(chat_id);
        }
        watcher.start();
        for chat_id in watcher.subscriptions() {
            if let Err(e) = watcher.force_check(chat_id).await {
                log::warn!("initial check for chat {chat_id} failed: {e}");
            }
        }
        log::info!("watching {} chats", watcher.subscriptions().len());

        loop {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    log::info!("shutting down");
                    break;
                }
                event = event_rx.recv() => match event {
                    Some(Event::MessagesChanged(document)) => handle_update(&document),
                    Some(Event::Quit) | None => break,
                },
            }
        }
        watcher.stop().await;
        Ok(())
    }

    /// Print the chat list of an account, one line per chat.
    pub async fn chats(&self, account_id: &str) -> Result<()> {
        let service = ChatService::new(self.onlyfans_client()?);
        let fetched = service.chats_for_account(account_id).await?;
        let mut chats = IndexMap::new();
        update_chats(&fetched, &mut chats);
        for chat in chats.values() {
            println!(
                "{}\t{}\t{} unread\t{}",
                chat.fan.id, chat.fan.username, chat.unread_messages_count, chat.last_message.text
            );
        }
        Ok(())
    }

    /// Trigger a portal-side message sync for one chat.
    pub async fn sync(&self, account_id: &str, chat_id: &str) -> Result<()> {
        let portal = self.portal_client()?;
        let response = portal.sync_messages(account_id, chat_id).await?;
        log::info!("sync requested for chat {chat_id}");
        println!("{response}");
        Ok(())
    }

    /// Draft an AI reply for one chat and print it.
    pub async fn draft(&self, account_id: &str, chat_id: &str) -> Result<()> {
        let service = GenerateMessageService::new(self.portal_client()?);
        let content = service.generate_response(account_id, chat_id).await?;
        println!("{content}");
        Ok(())
    }

    fn onlyfans_client(&self) -> Result<OnlyFansApiClient> {
        let token = self.config.api.resolve_token().unwrap_or_default();
        Ok(OnlyFansApiClient::with_base_url(
            token,
            &self.config.api.onlyfans_base_url,
        )?)
    }

    fn portal_client(&self) -> Result<WebPortalClient> {
        Ok(WebPortalClient::with_base_url(
            &self.config.api.portal_base_url,
        )?)
    }
}

fn handle_update(document: &ChatDocument) {
    let chat_id = document.chat_id().unwrap_or_default();
    let count = document.messages().len();
    match document
        .latest_client_message()
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
    {
        Some(content) => {
            log::info!(
                "chat {chat_id}: {count} messages, new client message: {}",
                preview(content, 30)
            );
        }
        None => log::info!("chat {chat_id}: {count} messages"),
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_owned()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
