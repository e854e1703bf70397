//! Presentation state - the view-model core behind any front end
//!
//! Owns the raw list from the last successful refresh plus the user's
//! preferences, and republishes `UiState` on every change. The displayed
//! list is always recomputed from scratch as `sort(filter(raw))`.
//!
//! Refresh rules:
//! - success replaces the raw list and flags it offline when it came from
//!   the cache; the error is cleared only for network data; `last_updated`
//!   advances only for network data or when unset
//! - failure keeps the displayed list, records the error and flags the
//!   list offline if anything is displayed
//! - a non-forced refresh is dropped while another one is in flight; a
//!   cancelled refresh no longer counts as in flight

use crate::domain::attraction::AttractionWaitTime;
use crate::domain::view::{derive_view, PresentationPreferences, SortDirection, SortType};
use crate::io::store::{KeyValueStore, StoredValue};
use crate::services::repository::{DataSource, WaitTimeRepository};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const FAVORITES_KEY: &str = "favorite_attraction_codes";

/// Snapshot published to subscribers after every change
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UiState {
    pub is_loading: bool,
    /// Filtered and sorted for `preferences`
    pub wait_times: Vec<AttractionWaitTime>,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_offline_data: bool,
    pub preferences: PresentationPreferences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated(DataSource),
    Failed,
    /// Dropped because another refresh was in flight
    Skipped,
}

struct Inner {
    ui: UiState,
    raw: Vec<AttractionWaitTime>,
    in_flight: usize,
}

impl Inner {
    fn recompute(&mut self) {
        self.ui.wait_times = derive_view(&self.raw, &self.ui.preferences);
    }
}

/// Releases the in-flight slot of a refresh whose future was dropped
/// before the fetch completed
struct PendingRefresh<'a> {
    state: &'a PresentationState,
    armed: bool,
}

impl Drop for PendingRefresh<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.state.inner.lock();
        inner.in_flight -= 1;
        inner.ui.is_loading = inner.in_flight > 0;
        self.state.publish(&inner);
        debug!(in_flight = %inner.in_flight, "refresh_cancelled");
    }
}

pub struct PresentationState {
    repository: Arc<WaitTimeRepository>,
    store: Arc<dyn KeyValueStore>,
    inner: Mutex<Inner>,
    tx: watch::Sender<UiState>,
}

impl PresentationState {
    /// Favorites are restored from the store; sort/filter start at defaults
    pub fn new(repository: Arc<WaitTimeRepository>, store: Arc<dyn KeyValueStore>) -> Self {
        let favorite_codes = match store.get_string_set(FAVORITES_KEY) {
            Ok(codes) => codes,
            Err(e) => {
                warn!(error = %e, "favorites_load_failed");
                Default::default()
            }
        };
        debug!(count = %favorite_codes.len(), "favorites_loaded");

        let ui = UiState {
            preferences: PresentationPreferences { favorite_codes, ..Default::default() },
            ..Default::default()
        };
        let (tx, _rx) = watch::channel(ui.clone());

        Self { repository, store, inner: Mutex::new(Inner { ui, raw: Vec::new(), in_flight: 0 }), tx }
    }

    pub fn state(&self) -> UiState {
        self.inner.lock().ui.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.tx.subscribe()
    }

    /// The unfiltered list from the last successful refresh
    pub fn raw_items(&self) -> Vec<AttractionWaitTime> {
        self.inner.lock().raw.clone()
    }

    fn publish(&self, inner: &Inner) {
        self.tx.send_replace(inner.ui.clone());
    }

    pub async fn refresh(&self, force_refresh: bool) -> RefreshOutcome {
        let mut pending = {
            let mut inner = self.inner.lock();
            if inner.in_flight > 0 && !force_refresh {
                debug!(in_flight = %inner.in_flight, "refresh_skipped");
                return RefreshOutcome::Skipped;
            }
            inner.in_flight += 1;
            inner.ui.is_loading = true;
            self.publish(&inner);
            PendingRefresh { state: self, armed: true }
        };

        let result = self.repository.fetch_with(force_refresh).await;

        let mut inner = self.inner.lock();
        pending.armed = false;
        inner.in_flight -= 1;
        inner.ui.is_loading = inner.in_flight > 0;

        let outcome = match result {
            Ok(fetched) => {
                let fresh = fetched.source == DataSource::Network;
                inner.ui.is_offline_data = fetched.from_cache();
                inner.raw = fetched.items;
                if fresh {
                    inner.ui.error = None;
                }
                if fresh || inner.ui.last_updated.is_none() {
                    inner.ui.last_updated = Some(fetched.stored_at);
                }
                inner.recompute();
                info!(
                    count = %inner.raw.len(),
                    displayed = %inner.ui.wait_times.len(),
                    source = %fetched.source.as_str(),
                    "refresh_completed"
                );
                RefreshOutcome::Updated(fetched.source)
            }
            Err(e) => {
                inner.ui.error = Some(format!("Loading failed: {}", e));
                inner.ui.is_offline_data = !inner.ui.wait_times.is_empty();
                warn!(error = %e, stale = %inner.ui.is_offline_data, "refresh_failed");
                RefreshOutcome::Failed
            }
        };

        self.publish(&inner);
        outcome
    }

    /// Returns false when the value was already set
    pub fn set_filter_only_open(&self, enabled: bool) -> bool {
        let mut inner = self.inner.lock();
        if inner.ui.preferences.filter_only_open == enabled {
            return false;
        }
        inner.ui.preferences.filter_only_open = enabled;
        inner.recompute();
        self.publish(&inner);
        true
    }

    /// Returns false when both type and direction were already set
    pub fn change_sort_order(&self, sort_type: SortType, direction: SortDirection) -> bool {
        let mut inner = self.inner.lock();
        let prefs = &mut inner.ui.preferences;
        if prefs.sort_type == sort_type && prefs.sort_direction == direction {
            return false;
        }
        prefs.sort_type = sort_type;
        prefs.sort_direction = direction;
        inner.recompute();
        self.publish(&inner);
        true
    }

    pub fn toggle_sort_direction(&self) {
        let mut inner = self.inner.lock();
        let prefs = &mut inner.ui.preferences;
        prefs.sort_direction = prefs.sort_direction.flipped();
        inner.recompute();
        self.publish(&inner);
    }

    /// Flip `code` in the favorite set and persist it. Returns whether
    /// `code` is now a favorite. A failed write keeps the in-memory change.
    pub fn toggle_favorite(&self, code: &str) -> bool {
        let mut inner = self.inner.lock();
        let favorites = &mut inner.ui.preferences.favorite_codes;
        let now_favorite = if favorites.remove(code) {
            false
        } else {
            favorites.insert(code.to_string());
            true
        };

        if let Err(e) = self.store.put(FAVORITES_KEY, StoredValue::Set(favorites.clone())) {
            error!(code = %code, error = %e, "favorites_save_failed");
        }

        inner.recompute();
        self.publish(&inner);
        debug!(code = %code, favorite = %now_favorite, "favorite_toggled");
        now_favorite
    }
}
