//! Notification dispatch for fired alerts
//!
//! Dispatch is fire-and-forget: failures are logged, never returned.
//! `JsonlNotifier` appends one JSON object per notification (JSONL) so a
//! desktop/mobile bridge can tail the file.

use crate::domain::alert::{Notification, WaitTimeAlert};
use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub trait Notifier: Send + Sync {
    fn notify(&self, alert: &WaitTimeAlert, current_wait_minutes: u32);
}

/// Emits each notification as a structured log line
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alert: &WaitTimeAlert, current_wait_minutes: u32) {
        let notification = Notification::for_alert(alert, current_wait_minutes);
        info!(
            code = %notification.code,
            current_wait = %notification.current_wait,
            target = %notification.target,
            title = %notification.title,
            body = %notification.body,
            "alert_notification"
        );
    }
}

#[derive(Serialize)]
struct NotificationLine<'a> {
    sent_at: String,
    #[serde(flatten)]
    notification: &'a Notification,
}

/// Appends notifications to a JSONL file
#[derive(Debug)]
pub struct JsonlNotifier {
    file_path: PathBuf,
}

impl JsonlNotifier {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        info!(file_path = %file_path.display(), "notifier_initialized");
        Self { file_path }
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.file_path)?;
        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path.display(), bytes = %line.len(), "notification_written");
        Ok(())
    }
}

impl Notifier for JsonlNotifier {
    fn notify(&self, alert: &WaitTimeAlert, current_wait_minutes: u32) {
        let notification = Notification::for_alert(alert, current_wait_minutes);
        let line = NotificationLine { sent_at: Utc::now().to_rfc3339(), notification: &notification };

        let result = serde_json::to_string(&line)
            .map_err(std::io::Error::other)
            .and_then(|json| self.append_line(&json));

        match result {
            Ok(()) => info!(code = %notification.code, current_wait = %current_wait_minutes, "alert_notification"),
            Err(e) => error!(code = %notification.code, error = %e, "alert_notification_failed"),
        }
    }
}
