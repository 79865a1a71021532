//! Read-through user cache in front of the relational store.

pub mod cache;
pub mod directory;
pub mod store;

pub use cache::{MemoryUserCache, RedisUserCache, UserCache};
pub use directory::{DEFAULT_USER_TTL, UserDirectory, cache_key};
pub use store::UserStore;
