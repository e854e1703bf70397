//! Domain models - attractions, alerts and the derived list view
//!
//! - `attraction` - wait-time records as delivered by the API
//! - `alert` - user-armed wait-time alerts and their notifications
//! - `view` - filter/sort preferences and the derived list

pub mod alert;
pub mod attraction;
pub mod view;

pub use alert::{Notification, WaitTimeAlert};
pub use attraction::{AttractionStatus, AttractionWaitTime};
pub use view::{PresentationPreferences, SortDirection, SortType};
