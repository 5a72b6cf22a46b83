//! Shared data model for cartchat: products, categories, tables and chat messages.

mod message;
mod product;

pub use message::{BotResponse, ChatMessage, TableData, WELCOME_TEXT};
pub use product::{CategoryGroup, DEFAULT_CATEGORY_NAME, Product};
