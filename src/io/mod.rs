//! IO modules - external system interfaces
//!
//! - `api` - HTTP client for the wait-time API
//! - `store` - Local key-value persistence (memory or JSON file)
//! - `notifier` - Notification dispatch (log or JSONL file)
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod api;
pub mod notifier;
pub mod prometheus;
pub mod store;

// Re-export commonly used types
pub use api::{HttpWaitTimeSource, SourceError, WaitTimeSource};
pub use notifier::{JsonlNotifier, LogNotifier, Notifier};
pub use store::{Edit, FileStore, KeyValueStore, MemoryStore, StoreError, StoredValue};
