use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::aggregate::{aggregate_and_deduplicate, merge_with_existing};
use crate::config::Config;
use crate::filter::apply_filters;
use crate::listings::differ::{find_new, summary_stats, SummaryStats};
use crate::listings::{Listing, ListingStore};
use crate::notify::{build_sinks, NotifySink};
use crate::providers::ProviderRegistry;
use crate::router::SourceRouter;

/// Everything one check cycle needs, constructed once by the process entry
/// point and shared behind an `Arc`. The cycle lock makes "at most one
/// cycle at a time" structural: the persisted listing set and quota ledger
/// are read-modify-written across the whole cycle.
pub struct CheckContext {
    pub config: Config,
    pub store: ListingStore,
    pub registry: ProviderRegistry,
    pub sinks: Vec<Box<dyn NotifySink>>,
    cycle_lock: Mutex<()>,
}

impl CheckContext {
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let store = ListingStore::open(&config.resolved_data_dir())?;
        let registry = ProviderRegistry::from_config(&config.providers);
        let sinks = build_sinks(&config.notify);
        info!("initialized context with {} providers", registry.len());
        Ok(Self {
            config,
            store,
            registry,
            sinks,
            cycle_lock: Mutex::new(()),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.cycle_lock.try_lock().is_err()
    }
}

#[derive(Debug, Error)]
pub enum CycleError {
    /// A cycle is already running; concurrent triggers are rejected, not
    /// queued.
    #[error("a check cycle is already running")]
    Busy,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub fetched_total: usize,
    pub duplicates_removed: usize,
    pub filtered_count: usize,
    pub stats: SummaryStats,
    pub notified_count: usize,
}

/// Runs one full check cycle: load -> fetch -> aggregate -> filter -> diff
/// -> merge -> save -> notify.
///
/// Rejects immediately when another cycle holds the lock. On failure an
/// error notification is attempted; notification failures themselves never
/// fail the cycle and never roll back a completed save.
pub async fn run_check(ctx: &CheckContext) -> Result<CycleReport, CycleError> {
    let Ok(_guard) = ctx.cycle_lock.try_lock() else {
        return Err(CycleError::Busy);
    };

    match run_cycle(ctx).await {
        Ok(report) => Ok(report),
        Err(error) => {
            let message = format!("{error:#}");
            for sink in &ctx.sinks {
                if let Err(notify_error) = sink.notify_error(&message).await {
                    warn!("failed sending error notification: {notify_error}");
                }
            }
            Err(CycleError::Failed(error))
        }
    }
}

async fn run_cycle(ctx: &CheckContext) -> anyhow::Result<CycleReport> {
    let started_at = Utc::now();
    info!("starting listing check cycle");

    let existing = ctx.store.load_listings()?;
    info!("loaded {} existing listings", existing.len());

    let zipcodes = ctx.config.all_zipcodes();
    info!("querying {} zipcodes: {}", zipcodes.len(), zipcodes.join(", "));
    let router = SourceRouter::new(&ctx.registry, &ctx.store, &ctx.config.providers);
    let results_by_zipcode = router
        .fetch_all_zipcodes(
            &zipcodes,
            &ctx.config.property_types,
            Some(ctx.config.filters.min_price),
            Some(ctx.config.filters.max_price),
        )
        .await;
    let fetched_total = results_by_zipcode.values().map(Vec::len).sum();

    let outcome = aggregate_and_deduplicate(&results_by_zipcode);
    let duplicates_removed = outcome.duplicates_removed;

    let filtered = apply_filters(
        outcome.listings,
        &ctx.config.filters,
        &ctx.config.property_types,
    );
    let filtered_count = filtered.len();

    let current: BTreeMap<String, Listing> = filtered
        .iter()
        .map(|listing| (listing.id.clone(), listing.clone()))
        .collect();
    let new_listings = find_new(&current, &existing);
    let stats = summary_stats(
        &current,
        &existing,
        ctx.config.analysis.removed_recency_days,
        ctx.config.analysis.price_change_percent,
    );
    info!(
        "cycle diff: {} new, {} removed, {} price changes, {} status changes",
        stats.new_count, stats.removed_count, stats.price_changes_count, stats.status_changes_count
    );

    let merged = merge_with_existing(&filtered, existing);
    ctx.store.save_listings(&merged)?;
    if let Err(error) = ctx.store.create_backup(ctx.config.storage.backup_keep_days) {
        warn!("backup failed: {error:#}");
    }

    // The save is already durable; from here on nothing may fail the cycle.
    let notified_count = if new_listings.is_empty() {
        info!("no new listings to notify");
        0
    } else {
        info!("notifying {} new listings", new_listings.len());
        for sink in &ctx.sinks {
            if let Err(error) = sink.notify_new(&new_listings).await {
                warn!("failed sending notification: {error}");
            }
        }
        new_listings.len()
    };

    for (source, status) in router.quota_status() {
        info!(
            "{source} quota: {}/{} ({}% used, {} remaining)",
            status.used, status.limit, status.percentage, status.remaining
        );
    }

    info!("listing check cycle completed");
    Ok(CycleReport {
        started_at,
        fetched_total,
        duplicates_removed,
        filtered_count,
        stats,
        notified_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn context(dir: &tempfile::TempDir) -> CheckContext {
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_string_lossy().to_string();
        config.notify.enable_stdout = false;
        config.zipcodes.priority = vec!["92037".to_string()];
        CheckContext::from_config(config).expect("failed building context")
    }

    #[tokio::test]
    async fn cycle_with_no_providers_still_persists_an_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);

        let report = run_check(&ctx).await.expect("cycle failed");
        assert_eq!(report.fetched_total, 0);
        assert_eq!(report.stats.new_count, 0);
        assert_eq!(report.notified_count, 0);
        assert!(dir.path().join("listings.json").exists());
    }

    #[tokio::test]
    async fn concurrent_trigger_is_rejected_while_a_cycle_runs() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);

        let _held = ctx.cycle_lock.lock().await;
        assert!(ctx.is_busy());
        match run_check(&ctx).await {
            Err(CycleError::Busy) => {}
            other => panic!("expected busy rejection, got {other:?}"),
        }
    }
}
