use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::listings::Listing;
use crate::quota::QuotaLedger;

const BACKUP_PREFIX: &str = "listings_";

/// JSON file persistence for the listing set and the quota ledger.
///
/// The listing set is the durable application state and is always replaced
/// atomically (write to a temp file, rename over the target) so a crash or
/// concurrent reader never observes a partial write. The quota file is
/// advisory and written in place.
#[derive(Debug, Clone)]
pub struct ListingStore {
    backups_dir: PathBuf,
    listings_file: PathBuf,
    quota_file: PathBuf,
}

#[derive(Debug, Serialize)]
struct ListingsEnvelope<'a> {
    last_check: DateTime<Utc>,
    total_listings: usize,
    listings: &'a BTreeMap<String, Listing>,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    listings: BTreeMap<String, serde_json::Value>,
}

impl ListingStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let backups_dir = data_dir.join("backups");
        fs::create_dir_all(&backups_dir)
            .with_context(|| format!("failed creating data directory: {}", data_dir.display()))?;
        Ok(Self {
            backups_dir,
            listings_file: data_dir.join("listings.json"),
            quota_file: data_dir.join("api_quotas.json"),
        })
    }

    /// Loads the persisted listing set.
    ///
    /// A missing file is a normal first run and yields an empty map. A file
    /// that exists but cannot be read or parsed is an error: proceeding
    /// with an empty set would re-notify every known listing. Individually
    /// malformed entries are skipped and counted.
    pub fn load_listings(&self) -> Result<BTreeMap<String, Listing>> {
        if !self.listings_file.exists() {
            info!("no existing listings file, starting fresh");
            return Ok(BTreeMap::new());
        }

        let data = fs::read_to_string(&self.listings_file).with_context(|| {
            format!("failed reading listings: {}", self.listings_file.display())
        })?;
        let envelope: RawEnvelope = serde_json::from_str(&data).with_context(|| {
            format!("failed parsing listings: {}", self.listings_file.display())
        })?;

        let mut listings = BTreeMap::new();
        let mut skipped = 0;
        for (id, value) in envelope.listings {
            match serde_json::from_value::<Listing>(value) {
                Ok(listing) => {
                    listings.insert(id, listing);
                }
                Err(error) => {
                    warn!("skipping malformed stored listing {id}: {error}");
                    skipped += 1;
                }
            }
        }

        info!("loaded {} listings from storage ({skipped} skipped)", listings.len());
        Ok(listings)
    }

    /// Replaces the persisted listing set wholesale via temp-file rename.
    pub fn save_listings(&self, listings: &BTreeMap<String, Listing>) -> Result<()> {
        let envelope = ListingsEnvelope {
            last_check: Utc::now(),
            total_listings: listings.len(),
            listings,
        };
        let serialized = serde_json::to_string_pretty(&envelope)?;

        let temp_file = self.listings_file.with_extension("json.tmp");
        fs::write(&temp_file, serialized)
            .with_context(|| format!("failed writing temp file: {}", temp_file.display()))?;
        fs::rename(&temp_file, &self.listings_file).with_context(|| {
            format!("failed replacing listings file: {}", self.listings_file.display())
        })?;

        info!("saved {} listings to storage", listings.len());
        Ok(())
    }

    /// Copies the current listings file into `backups/` with a timestamped
    /// name, then prunes backups past the retention window.
    pub fn create_backup(&self, keep_days: i64) -> Result<Option<PathBuf>> {
        if !self.listings_file.exists() {
            warn!("no listings file to back up");
            return Ok(None);
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let backup_file = self.backups_dir.join(format!("{BACKUP_PREFIX}{timestamp}.json"));
        fs::copy(&self.listings_file, &backup_file)
            .with_context(|| format!("failed creating backup: {}", backup_file.display()))?;
        info!("created backup {}", backup_file.display());

        if let Err(error) = self.prune_old_backups(keep_days) {
            warn!("failed pruning old backups: {error}");
        }
        Ok(Some(backup_file))
    }

    fn prune_old_backups(&self, keep_days: i64) -> Result<()> {
        let cutoff = SystemTime::now() - Duration::from_secs(keep_days.max(0) as u64 * 86_400);
        for entry in fs::read_dir(&self.backups_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(BACKUP_PREFIX) || !name.ends_with(".json") {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            if modified < cutoff {
                fs::remove_file(entry.path())?;
                info!("deleted old backup {name}");
            }
        }
        Ok(())
    }

    /// Loads the quota ledger. Missing or unreadable files fall back to
    /// `None` so the caller re-initializes from configured limits; quota
    /// data is advisory and never worth failing a cycle over.
    pub fn load_quotas(&self) -> Option<QuotaLedger> {
        if !self.quota_file.exists() {
            return None;
        }
        match fs::read_to_string(&self.quota_file) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(ledger) => Some(ledger),
                Err(error) => {
                    warn!("failed parsing quota file, reinitializing: {error}");
                    None
                }
            },
            Err(error) => {
                warn!("failed reading quota file, reinitializing: {error}");
                None
            }
        }
    }

    pub fn save_quotas(&self, ledger: &QuotaLedger) -> Result<()> {
        let serialized = serde_json::to_string_pretty(ledger)?;
        fs::write(&self.quota_file, serialized)
            .with_context(|| format!("failed writing quota file: {}", self.quota_file.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listings::SourceId;
    use crate::quota;

    fn store() -> (tempfile::TempDir, ListingStore) {
        let dir = tempfile::tempdir().expect("failed creating temp dir");
        let store = ListingStore::open(dir.path()).expect("failed opening store");
        (dir, store)
    }

    fn sample() -> BTreeMap<String, Listing> {
        let mut listing = Listing::new("1", "123 Main St", "92037", 1_500_000, SourceId::Homesage);
        listing.lot_size_sqft = Some(10_000);
        let mut map = BTreeMap::new();
        map.insert(listing.id.clone(), listing);
        map
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let (_dir, store) = store();
        assert!(store.load_listings().expect("load failed").is_empty());
    }

    #[test]
    fn listings_round_trip_through_disk() {
        let (_dir, store) = store();
        store.save_listings(&sample()).expect("save failed");

        let loaded = store.load_listings().expect("load failed");
        assert_eq!(loaded.len(), 1);
        let listing = &loaded["1"];
        assert_eq!(listing.price, 1_500_000);
        assert_eq!(listing.lot_size_sqft, Some(10_000));
        assert_eq!(listing.source_api, SourceId::Homesage);
    }

    #[test]
    fn unreadable_file_is_an_error_not_an_empty_set() {
        let (dir, store) = store();
        fs::write(dir.path().join("listings.json"), "not json at all").unwrap();
        assert!(store.load_listings().is_err());
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let (dir, store) = store();
        store.save_listings(&sample()).expect("save failed");

        let raw = fs::read_to_string(dir.path().join("listings.json")).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        value["listings"]["broken"] = serde_json::json!({"price": "not a number"});
        fs::write(dir.path().join("listings.json"), value.to_string()).unwrap();

        let loaded = store.load_listings().expect("load failed");
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("1"));
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let (dir, store) = store();
        store.save_listings(&sample()).expect("save failed");
        assert!(dir.path().join("listings.json").exists());
        assert!(!dir.path().join("listings.json.tmp").exists());
    }

    #[test]
    fn backup_copies_the_current_listings_file() {
        let (_dir, store) = store();
        store.save_listings(&sample()).expect("save failed");
        let backup = store.create_backup(7).expect("backup failed");
        let backup = backup.expect("backup skipped despite existing file");
        assert!(backup.exists());
    }

    #[test]
    fn quota_ledger_round_trips_and_tolerates_corruption() {
        let (dir, store) = store();
        assert!(store.load_quotas().is_none());

        let mut limits = BTreeMap::new();
        limits.insert(SourceId::RentCast, 50);
        let ledger = quota::init_ledger(&limits, Utc::now());
        store.save_quotas(&ledger).expect("save failed");

        let loaded = store.load_quotas().expect("ledger missing after save");
        assert_eq!(loaded[&SourceId::RentCast].limit, 50);

        fs::write(dir.path().join("api_quotas.json"), "{broken").unwrap();
        assert!(store.load_quotas().is_none());
    }
}
