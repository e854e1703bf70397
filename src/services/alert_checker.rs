//! Periodic alert checker - the offloaded worker path
//!
//! Each tick loads the armed alerts, fetches current wait times through
//! the repository, and applies whatever fires. It shares no in-memory
//! state with the presentation layer. A tick that cannot obtain wait times
//! leaves every alert untouched and is retried on the next tick.

use crate::infra::metrics::Metrics;
use crate::io::notifier::Notifier;
use crate::services::alert_evaluator::{apply, evaluate, FiredAlert};
use crate::services::alert_store::AlertStore;
use crate::services::repository::{DataSource, WaitTimeRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Nothing armed; no fetch was made
    NoAlerts,
    Evaluated { fired: Vec<FiredAlert>, source: DataSource },
    /// Alerts or wait times could not be read; no alert was touched
    Failed { reason: String },
}

impl CheckOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, CheckOutcome::Failed { .. })
    }

    pub fn fired_count(&self) -> usize {
        match self {
            CheckOutcome::Evaluated { fired, .. } => fired.len(),
            _ => 0,
        }
    }
}

pub struct AlertChecker {
    repository: Arc<WaitTimeRepository>,
    alerts: Arc<AlertStore>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,
    interval: Duration,
}

impl AlertChecker {
    pub fn new(
        repository: Arc<WaitTimeRepository>,
        alerts: Arc<AlertStore>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<Metrics>,
        interval: Duration,
    ) -> Self {
        Self { repository, alerts, notifier, metrics, interval }
    }

    /// One check: load alerts, fetch, evaluate, apply
    pub async fn run_once(&self) -> CheckOutcome {
        self.metrics.record_check();

        let armed = match self.alerts.get_all() {
            Ok(armed) => armed,
            Err(e) => {
                self.metrics.record_check_failed();
                warn!(error = %e, "alert_check_store_failed");
                return CheckOutcome::Failed { reason: e.to_string() };
            }
        };

        if armed.is_empty() {
            debug!("alert_check_no_alerts");
            return CheckOutcome::NoAlerts;
        }

        let outcome = match self.repository.fetch_with(false).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.metrics.record_check_failed();
                warn!(alerts = %armed.len(), error = %e, "alert_check_fetch_failed");
                return CheckOutcome::Failed { reason: e.to_string() };
            }
        };

        let fired = evaluate(&armed, &outcome.items);
        let dispatched = apply(&fired, &self.alerts, self.notifier.as_ref());
        self.metrics.record_alerts_fired(dispatched as u64);

        info!(
            alerts = %armed.len(),
            fired = %dispatched,
            source = %outcome.source.as_str(),
            "alert_check_completed"
        );
        CheckOutcome::Evaluated { fired, source: outcome.source }
    }

    /// Check every `interval` until shutdown is signalled. The first check
    /// runs immediately.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = %self.interval.as_secs(), "alert_checker_started");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_once().await;
                    self.metrics.report().log();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("alert_checker_stopped");
    }
}
