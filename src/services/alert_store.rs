//! Persistent set of armed wait-time alerts
//!
//! Stored as a set of JSON strings under `wait_time_alerts`, one per alert.
//! At most one alert per attraction code; an upsert replaces the previous
//! one. Undecodable entries are skipped on read.

use crate::domain::alert::WaitTimeAlert;
use crate::io::store::{KeyValueStore, StoreError, StoredValue};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};

pub const ALERTS_KEY: &str = "wait_time_alerts";

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("target time must be at least one minute")]
    InvalidTarget,
    #[error("alert encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct AlertStore {
    store: Arc<dyn KeyValueStore>,
}

impl AlertStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Decodable alerts keyed by code. A duplicate code (possible only if
    /// the file was edited by hand) keeps the last entry in set order.
    fn read(&self) -> Result<BTreeMap<String, WaitTimeAlert>, StoreError> {
        let mut alerts = BTreeMap::new();
        for raw in self.store.get_string_set(ALERTS_KEY)? {
            match serde_json::from_str::<WaitTimeAlert>(&raw) {
                Ok(alert) => {
                    alerts.insert(alert.attraction_code.clone(), alert);
                }
                Err(e) => warn!(entry = %raw, error = %e, "alert_entry_skipped"),
            }
        }
        Ok(alerts)
    }

    fn write(&self, alerts: &BTreeMap<String, WaitTimeAlert>) -> Result<(), AlertError> {
        let encoded = alerts
            .values()
            .map(serde_json::to_string)
            .collect::<Result<BTreeSet<String>, _>>()?;
        self.store.put(ALERTS_KEY, StoredValue::Set(encoded))?;
        Ok(())
    }

    /// All decodable alerts, ordered by attraction code
    pub fn get_all(&self) -> Result<Vec<WaitTimeAlert>, StoreError> {
        Ok(self.read()?.into_values().collect())
    }

    pub fn get(&self, code: &str) -> Result<Option<WaitTimeAlert>, StoreError> {
        Ok(self.read()?.remove(code))
    }

    /// Insert or replace the alert for `alert.attraction_code`
    pub fn upsert(&self, alert: WaitTimeAlert) -> Result<(), AlertError> {
        if alert.target_time == 0 {
            return Err(AlertError::InvalidTarget);
        }

        let mut alerts = self.read()?;
        info!(code = %alert.attraction_code, target = %alert.target_time, "alert_armed");
        alerts.insert(alert.attraction_code.clone(), alert);
        self.write(&alerts)
    }

    /// Returns whether an alert was removed
    pub fn remove(&self, code: &str) -> Result<bool, AlertError> {
        let mut alerts = self.read()?;
        if alerts.remove(code).is_none() {
            return Ok(false);
        }
        self.write(&alerts)?;
        info!(code = %code, "alert_removed");
        Ok(true)
    }
}
