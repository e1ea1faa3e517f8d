//! Durable snapshot cache and per-conversation chat history.

pub mod cache;
pub mod error;
pub mod history;

pub use cache::FileCache;
pub use error::CacheError;
pub use history::{HistorySnapshot, HistoryStore};
