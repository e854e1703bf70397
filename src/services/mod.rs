//! Services - business logic and state management
//!
//! - `cache` - Last-good wait-time snapshot in the key-value store
//! - `repository` - Network-first fetch with cache fallback
//! - `presentation` - Filter/sort/favorite view state with refresh rules
//! - `alert_store` - Persistent one-shot wait-time alerts
//! - `alert_evaluator` - Decides and applies fired alerts
//! - `alert_checker` - Periodic background alert check

pub mod alert_checker;
pub mod alert_evaluator;
pub mod alert_store;
pub mod cache;
pub mod presentation;
pub mod repository;

pub use alert_checker::{AlertChecker, CheckOutcome};
pub use alert_evaluator::{apply, evaluate, FiredAlert};
pub use alert_store::{AlertError, AlertStore};
pub use cache::{CacheEntry, CacheError, WaitTimeCache};
pub use presentation::{PresentationState, RefreshOutcome, UiState};
pub use repository::{DataSource, FetchOutcome, WaitTimeRepository};
