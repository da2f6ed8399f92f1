//! Diff planner: compares the ledger against discovery output to compute
//! the per-run work set.
//!
//! Pure set arithmetic, no IO. Given identical inputs the planner always
//! produces the same work set in the same order (ascending URL), so run
//! logs are reproducible.

use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::discovery::DiscoveredUrl;
use crate::ledger::{Ledger, NewEntry};

/// One URL selected for a fetch attempt in the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// The landing-page URL to fetch.
    pub url: String,
    /// Provenance tag: from discovery for new URLs, from the ledger for
    /// retried ones.
    pub provenance: String,
    /// True when this URL was not in the ledger before this run.
    pub newly_discovered: bool,
}

/// The set of URLs selected for fetch attempts in the current run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkSet {
    items: Vec<WorkItem>,
    new_count: usize,
}

impl WorkSet {
    /// Returns the work items in ascending URL order.
    #[must_use]
    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    /// Returns the number of selected URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when there is nothing to fetch; a normal terminal
    /// condition, not an error.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns how many selected URLs are newly discovered.
    #[must_use]
    pub fn newly_discovered(&self) -> usize {
        self.new_count
    }

    /// Returns how many selected URLs are retries of known records.
    #[must_use]
    pub fn retries(&self) -> usize {
        self.items.len() - self.new_count
    }

    /// Returns the ledger append entries for the newly discovered URLs.
    #[must_use]
    pub fn new_entries(&self) -> Vec<NewEntry> {
        self.items
            .iter()
            .filter(|item| item.newly_discovered)
            .map(|item| NewEntry {
                url: item.url.clone(),
                provenance: item.provenance.clone(),
            })
            .collect()
    }
}

/// Computes the work set for one run.
///
/// `work_set = (discovered − ledger) ∪ {retryable ledger records}`; a URL
/// in both categories is fetched once, as newly discovered. Discovery
/// output may contain duplicates; the first provenance seen for a URL
/// wins.
#[must_use]
#[instrument(skip_all, fields(discovered = discovered.len(), ledger = ledger.len()))]
pub fn plan(ledger: &Ledger, discovered: &[DiscoveredUrl]) -> WorkSet {
    // BTreeMap both de-duplicates and fixes the iteration order.
    let mut selected: BTreeMap<&str, WorkItem> = BTreeMap::new();

    for candidate in discovered {
        if ledger.contains(&candidate.url) {
            continue;
        }
        selected.entry(&candidate.url).or_insert_with(|| WorkItem {
            url: candidate.url.clone(),
            provenance: candidate.provenance.clone(),
            newly_discovered: true,
        });
    }
    let new_count = selected.len();

    for record in ledger.retryable() {
        selected.entry(&record.url).or_insert_with(|| WorkItem {
            url: record.url.clone(),
            provenance: record.provenance.clone(),
            newly_discovered: false,
        });
    }

    let items: Vec<WorkItem> = selected.into_values().collect();
    debug!(
        total = items.len(),
        new = new_count,
        retries = items.len() - new_count,
        "work set planned"
    );

    WorkSet {
        items,
        new_count,
    }
}
