//! Wait-time alerts and the notifications they produce

use serde::{Deserialize, Serialize};

/// A user-armed threshold: notify once when the attraction's wait time
/// drops to `target_time` minutes or less.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitTimeAlert {
    pub attraction_code: String,
    pub attraction_name: String,
    pub target_time: u32,
}

impl WaitTimeAlert {
    pub fn new(attraction_code: &str, attraction_name: &str, target_time: u32) -> Self {
        Self {
            attraction_code: attraction_code.to_string(),
            attraction_name: attraction_name.to_string(),
            target_time,
        }
    }
}

/// User-visible message produced when an alert fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub code: String,
    pub title: String,
    pub body: String,
    pub current_wait: u32,
    pub target: u32,
}

impl Notification {
    pub fn for_alert(alert: &WaitTimeAlert, current_wait: u32) -> Self {
        Self {
            code: alert.attraction_code.clone(),
            title: format!("Wait time for {} is low!", alert.attraction_name),
            body: format!(
                "Current wait time is {} minutes (your target was {} minutes or less).",
                current_wait, alert.target_time
            ),
            current_wait,
            target: alert.target_time,
        }
    }
}
