pub mod handlers;
pub mod service;
pub mod unread_cache;
