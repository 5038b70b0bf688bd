mod chats;
mod generate;
mod messages;

pub use chats::{update_chats, ChatService};
pub use generate::GenerateMessageService;
pub use messages::{last_fan_message, MessageService};
