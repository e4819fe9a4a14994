pub mod asset;
pub mod chunk;
pub mod conversation;
pub mod message;
pub mod project;
pub mod user;
