// todostore - local task store with a derived view and write-behind key-value persistence

pub mod config;
pub mod error;
pub mod filter;
pub mod kv;
pub mod models;
pub mod persist;
pub mod store;

// Re-export main types for convenience
pub use config::{Backend, Config, ConfigError};
pub use error::StoreError;
pub use filter::{PriorityFilter, SortMode};
pub use kv::{FileKv, KvStorage, MemoryKv, SqliteKv};
pub use models::{Task, TaskDraft, TaskPriority, TaskStatus, now_ms};
pub use store::{DEFAULT_STORAGE_KEY, StoreEvent, StoreOptions, SubscriptionId, TaskStore};
