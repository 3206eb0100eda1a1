use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::listings::Listing;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChange {
    pub listing: Listing,
    pub old_price: i64,
    pub new_price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub listing: Listing,
    pub old_status: String,
    pub new_status: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_current: usize,
    pub total_previous: usize,
    pub new_count: usize,
    pub removed_count: usize,
    pub price_changes_count: usize,
    pub status_changes_count: usize,
}

/// Listings present in `current` but not in `previous`, in id order.
pub fn find_new(
    current: &BTreeMap<String, Listing>,
    previous: &BTreeMap<String, Listing>,
) -> Vec<Listing> {
    let new_listings: Vec<Listing> = current
        .iter()
        .filter(|(id, _)| !previous.contains_key(*id))
        .map(|(_, listing)| listing.clone())
        .collect();

    info!(
        "found {} new listings (current: {}, previous: {})",
        new_listings.len(),
        current.len(),
        previous.len()
    );
    new_listings
}

/// Listings that disappeared from `current`, restricted to those whose
/// stored record was updated within `days_threshold` days of now.
///
/// Absences older than the window are intentionally never reported: they
/// were almost certainly gone in an earlier cycle and surfacing them late
/// is noise.
pub fn find_removed(
    current: &BTreeMap<String, Listing>,
    previous: &BTreeMap<String, Listing>,
    days_threshold: i64,
) -> Vec<Listing> {
    find_removed_at(current, previous, days_threshold, Utc::now())
}

pub fn find_removed_at(
    current: &BTreeMap<String, Listing>,
    previous: &BTreeMap<String, Listing>,
    days_threshold: i64,
    now: DateTime<Utc>,
) -> Vec<Listing> {
    let cutoff = now - Duration::days(days_threshold);
    previous
        .iter()
        .filter(|(id, stored)| !current.contains_key(*id) && stored.last_updated >= cutoff)
        .map(|(_, stored)| stored.clone())
        .collect()
}

/// Listings present in both maps whose price moved by at least
/// `min_change_percent` percent of the old price.
///
/// An old price of zero is non-comparable and skipped rather than divided.
pub fn find_price_changes(
    current: &BTreeMap<String, Listing>,
    previous: &BTreeMap<String, Listing>,
    min_change_percent: f64,
) -> Vec<PriceChange> {
    let mut changes = Vec::new();
    for (id, listing) in current {
        let Some(stored) = previous.get(id) else {
            continue;
        };
        let old_price = stored.price;
        let new_price = listing.price;
        if old_price == new_price || old_price == 0 {
            continue;
        }

        let change_percent = ((new_price - old_price) as f64 / old_price as f64 * 100.0).abs();
        if change_percent >= min_change_percent {
            info!(
                "price change for {}: ${} -> ${} ({:.1}%)",
                listing.address, old_price, new_price, change_percent
            );
            changes.push(PriceChange {
                listing: listing.clone(),
                old_price,
                new_price,
            });
        }
    }
    changes
}

/// Listings present in both maps whose status string differs.
pub fn find_status_changes(
    current: &BTreeMap<String, Listing>,
    previous: &BTreeMap<String, Listing>,
) -> Vec<StatusChange> {
    let mut changes = Vec::new();
    for (id, listing) in current {
        let Some(stored) = previous.get(id) else {
            continue;
        };
        if listing.status != stored.status {
            info!(
                "status change for {}: {} -> {}",
                listing.address, stored.status, listing.status
            );
            changes.push(StatusChange {
                listing: listing.clone(),
                old_status: stored.status.clone(),
                new_status: listing.status.clone(),
            });
        }
    }
    changes
}

pub fn summary_stats(
    current: &BTreeMap<String, Listing>,
    previous: &BTreeMap<String, Listing>,
    days_threshold: i64,
    min_change_percent: f64,
) -> SummaryStats {
    SummaryStats {
        total_current: current.len(),
        total_previous: previous.len(),
        new_count: find_new(current, previous).len(),
        removed_count: find_removed(current, previous, days_threshold).len(),
        price_changes_count: find_price_changes(current, previous, min_change_percent).len(),
        status_changes_count: find_status_changes(current, previous).len(),
    }
}
