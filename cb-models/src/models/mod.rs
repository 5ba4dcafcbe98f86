//! Entity model definitions.

pub mod chat;
pub mod chat_member;
pub mod message;
pub mod profile;
pub mod row_id;
pub mod session;
pub mod user;
