mod account;
mod chat;
mod user;

pub use account::OnlyFansAccount;
pub use chat::{Chat, ChatMessage, Fan};
pub use user::User;
