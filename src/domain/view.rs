//! Derived attraction list: filter, then favorites-first composite sort
//!
//! The displayed list is always `sort(filter(raw))` for the current
//! preferences. Nothing here mutates the raw list.

use crate::domain::attraction::AttractionWaitTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortType {
    #[default]
    Name,
    WaitTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Filter/sort settings plus the favorite set. Only favorites are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PresentationPreferences {
    pub sort_type: SortType,
    pub sort_direction: SortDirection,
    pub filter_only_open: bool,
    pub favorite_codes: BTreeSet<String>,
}

impl PresentationPreferences {
    pub fn is_favorite(&self, code: &str) -> bool {
        self.favorite_codes.contains(code)
    }
}

/// Drop everything that is not opened when `only_open` is set
pub fn filter(items: &[AttractionWaitTime], only_open: bool) -> Vec<AttractionWaitTime> {
    items.iter().filter(|item| !only_open || item.is_open()).cloned().collect()
}

struct SortKey<'a> {
    favorite: bool,
    name: String,
    item: &'a AttractionWaitTime,
}

fn compare_secondary(a: &SortKey<'_>, b: &SortKey<'_>, prefs: &PresentationPreferences) -> Ordering {
    let direction = prefs.sort_direction;
    match prefs.sort_type {
        SortType::Name => {
            // Nameless entries stay at the end in both directions
            let a_blank = a.name.trim().is_empty();
            let b_blank = b.name.trim().is_empty();
            a_blank.cmp(&b_blank).then_with(|| direction.apply(a.name.cmp(&b.name)))
        }
        SortType::WaitTime => {
            let a_open = a.item.is_open();
            let b_open = b.item.is_open();
            // Non-opened entries count as maximal wait, but never move ahead of opened ones
            b_open.cmp(&a_open).then_with(|| {
                let by_wait = if a_open && b_open {
                    a.item.wait_time_minutes.cmp(&b.item.wait_time_minutes)
                } else {
                    Ordering::Equal
                };
                direction.apply(by_wait.then_with(|| a.name.cmp(&b.name)))
            })
        }
    }
}

/// Favorites first (never reversed), then the secondary key per `sort_type`
pub fn sort(items: &[AttractionWaitTime], prefs: &PresentationPreferences) -> Vec<AttractionWaitTime> {
    let mut keyed: Vec<SortKey<'_>> = items
        .iter()
        .map(|item| SortKey { favorite: prefs.is_favorite(&item.code), name: item.sort_name(), item })
        .collect();

    keyed.sort_by(|a, b| {
        b.favorite
            .cmp(&a.favorite)
            .then_with(|| compare_secondary(a, b, prefs))
            .then_with(|| a.item.code.cmp(&b.item.code))
    });

    keyed.into_iter().map(|key| key.item.clone()).collect()
}

/// Recompute the displayed list from the raw list
pub fn derive_view(raw: &[AttractionWaitTime], prefs: &PresentationPreferences) -> Vec<AttractionWaitTime> {
    sort(&filter(raw, prefs.filter_only_open), prefs)
}
