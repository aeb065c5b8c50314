pub(crate) mod common;
pub mod chat;
pub mod health;
pub mod messages;
pub mod models;

pub use common::CONVERSATION_ID_HEADER;
