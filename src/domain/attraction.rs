//! Attraction wait-time records as delivered by the wait-time API

use serde::{Deserialize, Serialize};

/// Classification of the raw status string (case-insensitive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttractionStatus {
    Opened,
    Closed,
    Refurbishment,
    Unknown,
}

impl AttractionStatus {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("opened") {
            Self::Opened
        } else if raw.eq_ignore_ascii_case("closed") {
            Self::Closed
        } else if raw.eq_ignore_ascii_case("refurbishment") {
            Self::Refurbishment
        } else {
            Self::Unknown
        }
    }
}

/// One attraction's current wait time.
///
/// Identity is `code`. The raw `status` string is kept verbatim so that a
/// cached payload decodes to exactly what the API sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttractionWaitTime {
    pub code: String,
    pub name: String,
    /// Minutes; only meaningful while the attraction is opened
    #[serde(rename = "waitingtime")]
    pub wait_time_minutes: u32,
    pub status: String,
}

impl AttractionWaitTime {
    pub fn new(code: &str, name: &str, wait_time_minutes: u32, status: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            wait_time_minutes,
            status: status.to_string(),
        }
    }

    pub fn status_kind(&self) -> AttractionStatus {
        AttractionStatus::parse(&self.status)
    }

    pub fn is_open(&self) -> bool {
        self.status_kind() == AttractionStatus::Opened
    }

    /// Lowercased name used for every name comparison
    pub fn sort_name(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Baseline normalization applied to every list leaving the repository:
/// case-insensitive name order, code as tie-breaker.
pub fn sort_by_name(items: &mut [AttractionWaitTime]) {
    items.sort_by_cached_key(|item| (item.sort_name(), item.code.clone()));
}
