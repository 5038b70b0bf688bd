use crate::backend::ChatDocument;

/// Events flowing from background tasks into the app's run loop.
#[derive(Debug, Clone)]
pub enum Event {
    MessagesChanged(ChatDocument),
    Quit,
}
