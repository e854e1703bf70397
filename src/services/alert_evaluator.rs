//! Alert evaluation, split into a pure decision step and an apply step
//!
//! `evaluate` decides which alerts fire against the current wait times.
//! `apply` dispatches one notification per fired alert and removes it
//! (alerts are one-shot).

use crate::domain::alert::WaitTimeAlert;
use crate::domain::attraction::AttractionWaitTime;
use crate::io::notifier::Notifier;
use crate::services::alert_store::AlertStore;
use std::collections::HashMap;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredAlert {
    pub alert: WaitTimeAlert,
    pub attraction: AttractionWaitTime,
}

/// An alert fires iff its attraction is present, opened, and at or below target.
/// Output follows the order of `alerts`.
pub fn evaluate(alerts: &[WaitTimeAlert], current: &[AttractionWaitTime]) -> Vec<FiredAlert> {
    if alerts.is_empty() {
        return Vec::new();
    }

    let by_code: HashMap<&str, &AttractionWaitTime> =
        current.iter().map(|item| (item.code.as_str(), item)).collect();

    alerts
        .iter()
        .filter_map(|alert| {
            let attraction = by_code.get(alert.attraction_code.as_str())?;
            (attraction.is_open() && attraction.wait_time_minutes <= alert.target_time).then(|| FiredAlert {
                alert: alert.clone(),
                attraction: (*attraction).clone(),
            })
        })
        .collect()
}

/// Dispatch and remove each fired alert. Returns how many were dispatched.
///
/// A failed removal is logged; that alert may fire again on the next check.
pub fn apply(fired: &[FiredAlert], store: &AlertStore, notifier: &dyn Notifier) -> usize {
    for FiredAlert { alert, attraction } in fired {
        notifier.notify(alert, attraction.wait_time_minutes);
        info!(
            code = %alert.attraction_code,
            current_wait = %attraction.wait_time_minutes,
            target = %alert.target_time,
            "alert_fired"
        );

        if let Err(e) = store.remove(&alert.attraction_code) {
            error!(code = %alert.attraction_code, error = %e, "alert_remove_failed");
        }
    }
    fired.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::MemoryStore;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, u32)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, alert: &WaitTimeAlert, current_wait_minutes: u32) {
            self.sent.lock().push((alert.attraction_code.clone(), current_wait_minutes));
        }
    }

    fn current() -> Vec<AttractionWaitTime> {
        vec![
            AttractionWaitTime::new("34", "Taron", 25, "opened"),
            AttractionWaitTime::new("12", "Black Mamba", 45, "opened"),
            AttractionWaitTime::new("7", "Chiapas", 0, "closed"),
            AttractionWaitTime::new("8", "River Quest", 30, "Opened"),
        ]
    }

    #[test]
    fn test_fires_when_open_and_at_or_below_target() {
        let alerts = vec![
            WaitTimeAlert::new("34", "Taron", 30),
            WaitTimeAlert::new("12", "Black Mamba", 30),
            WaitTimeAlert::new("8", "River Quest", 30),
        ];
        let fired = evaluate(&alerts, &current());
        let codes: Vec<&str> = fired.iter().map(|f| f.alert.attraction_code.as_str()).collect();
        assert_eq!(codes, vec!["34", "8"]);
        assert_eq!(fired[0].attraction.wait_time_minutes, 25);
    }

    #[test]
    fn test_closed_attraction_never_fires() {
        let fired = evaluate(&[WaitTimeAlert::new("7", "Chiapas", 30)], &current());
        assert!(fired.is_empty());
    }

    #[test]
    fn test_unknown_code_does_not_fire() {
        let fired = evaluate(&[WaitTimeAlert::new("99", "Gone", 30)], &current());
        assert!(fired.is_empty());
    }

    #[test]
    fn test_empty_alerts() {
        assert!(evaluate(&[], &current()).is_empty());
    }

    #[test]
    fn test_apply_notifies_once_and_removes() {
        let store = AlertStore::new(Arc::new(MemoryStore::new()));
        store.upsert(WaitTimeAlert::new("34", "Taron", 30)).unwrap();
        store.upsert(WaitTimeAlert::new("99", "Gone", 30)).unwrap();

        let notifier = RecordingNotifier::default();
        let fired = evaluate(&store.get_all().unwrap(), &current());
        assert_eq!(apply(&fired, &store, &notifier), 1);

        assert_eq!(*notifier.sent.lock(), vec![("34".to_string(), 25)]);
        assert_eq!(store.get("34").unwrap(), None);
        assert!(store.get("99").unwrap().is_some());
    }

    #[test]
    fn test_apply_nothing() {
        let store = AlertStore::new(Arc::new(MemoryStore::new()));
        let notifier = RecordingNotifier::default();
        assert_eq!(apply(&[], &store, &notifier), 0);
        assert!(notifier.sent.lock().is_empty());
    }
}
