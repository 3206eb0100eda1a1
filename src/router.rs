use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::config::ProvidersConfig;
use crate::listings::{Listing, ListingStore, SourceId};
use crate::providers::ProviderRegistry;
use crate::quota::{self, QuotaLedger, QuotaRecord, QuotaStatus};

/// Routes fetches across providers by remaining quota.
///
/// Quota reads and writes happen under the caller's cycle lock, so the
/// ledger is read-modify-written by a single writer at a time.
pub struct SourceRouter<'a> {
    registry: &'a ProviderRegistry,
    store: &'a ListingStore,
    limits: BTreeMap<SourceId, u32>,
}

impl<'a> SourceRouter<'a> {
    pub fn new(
        registry: &'a ProviderRegistry,
        store: &'a ListingStore,
        providers: &ProvidersConfig,
    ) -> Self {
        let mut limits = BTreeMap::new();
        limits.insert(SourceId::RentCast, providers.rentcast.monthly_limit);
        limits.insert(SourceId::RapidApi, providers.rapidapi.monthly_limit);
        limits.insert(SourceId::Homesage, providers.homesage.monthly_limit);
        Self {
            registry,
            store,
            limits,
        }
    }

    /// Fetches listings for one zipcode from the best available provider.
    ///
    /// Providers are tried in quota-remaining order until one returns
    /// listings. Every attempt consumes quota whether or not it succeeds;
    /// provider errors are logged and the next provider is tried.
    pub async fn fetch_for_zipcode(
        &self,
        zipcode: &str,
        property_types: &[String],
        min_price: Option<i64>,
        max_price: Option<i64>,
    ) -> Vec<Listing> {
        let mut ledger = self.load_ledger(Utc::now());

        let order = quota::available_sources(&ledger);
        if order.is_empty() {
            warn!("no providers with available quota");
            return Vec::new();
        }

        for source in order {
            let Some(provider) = self.registry.by_id(source) else {
                continue;
            };

            quota::increment(&mut ledger, source, 1);
            if let Err(err) = self.store.save_quotas(&ledger) {
                warn!("failed persisting quota ledger: {err}");
            }

            info!("using {} for zipcode {zipcode}", provider.name());
            match provider
                .fetch_listings(zipcode, property_types, min_price, max_price)
                .await
            {
                Ok(listings) if !listings.is_empty() => {
                    info!(
                        "fetched {} listings from {} for {zipcode}",
                        listings.len(),
                        provider.name()
                    );
                    return listings;
                }
                Ok(_) => {
                    info!("no listings from {} for {zipcode}", provider.name());
                }
                Err(err) => {
                    error!("error fetching from {} for {zipcode}: {err:#}", provider.name());
                }
            }
        }

        warn!("no listings found for zipcode {zipcode} from any provider");
        Vec::new()
    }

    /// Fetches every zipcode sequentially and keys results by zipcode.
    pub async fn fetch_all_zipcodes(
        &self,
        zipcodes: &[String],
        property_types: &[String],
        min_price: Option<i64>,
        max_price: Option<i64>,
    ) -> BTreeMap<String, Vec<Listing>> {
        let mut results = BTreeMap::new();
        for zipcode in zipcodes {
            let listings = self
                .fetch_for_zipcode(zipcode, property_types, min_price, max_price)
                .await;
            results.insert(zipcode.clone(), listings);
        }

        let total: usize = results.values().map(Vec::len).sum();
        info!("fetched {total} total listings across {} zipcodes", zipcodes.len());
        results
    }

    pub fn quota_status(&self) -> BTreeMap<SourceId, QuotaStatus> {
        quota::quota_status(&self.load_ledger(Utc::now()))
    }

    pub fn quota_health(&self) -> bool {
        quota::quota_health(&self.load_ledger(Utc::now()))
    }

    fn load_ledger(&self, now: DateTime<Utc>) -> QuotaLedger {
        let existing = self.store.load_quotas();
        let mut ledger =
            existing.unwrap_or_else(|| quota::init_ledger(&self.limits, now));
        ensure_sources(&mut ledger, &self.limits, now);
        quota::reset_if_new_month(&mut ledger, now);
        ledger
    }
}

/// Backfills ledger entries for newly configured providers and keeps the
/// configured limit authoritative over whatever was persisted.
fn ensure_sources(ledger: &mut QuotaLedger, limits: &BTreeMap<SourceId, u32>, now: DateTime<Utc>) {
    for (source, limit) in limits {
        let record = ledger.entry(*source).or_insert_with(|| QuotaRecord {
            used: 0,
            limit: *limit,
            reset_date: quota::month_start(now),
        });
        record.limit = *limit;
    }
}
