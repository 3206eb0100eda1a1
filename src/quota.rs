use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::listings::SourceId;

/// Per-provider monthly call budget. `used` counts attempts, not
/// successes: a failed request still consumed a call upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub used: u32,
    pub limit: u32,
    pub reset_date: DateTime<Utc>,
}

impl QuotaRecord {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }
}

pub type QuotaLedger = BTreeMap<SourceId, QuotaRecord>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub percentage: f64,
    pub reset_date: DateTime<Utc>,
}

pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now
        .date_naive()
        .with_day(1)
        .expect("day 1 exists in every month");
    Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0).expect("midnight is a valid time"))
}

pub fn init_ledger(limits: &BTreeMap<SourceId, u32>, now: DateTime<Utc>) -> QuotaLedger {
    let reset_date = month_start(now);
    limits
        .iter()
        .map(|(source, limit)| {
            (
                *source,
                QuotaRecord {
                    used: 0,
                    limit: *limit,
                    reset_date,
                },
            )
        })
        .collect()
}

/// Zeroes every counter whose reset date predates the current month.
pub fn reset_if_new_month(ledger: &mut QuotaLedger, now: DateTime<Utc>) {
    let current_month = month_start(now);
    for (source, record) in ledger.iter_mut() {
        if record.reset_date < current_month {
            record.used = 0;
            record.reset_date = current_month;
            info!("reset {source} quota for new month");
        }
    }
}

/// Counts one call attempt against a provider, regardless of outcome.
pub fn increment(ledger: &mut QuotaLedger, source: SourceId, count: u32) {
    if let Some(record) = ledger.get_mut(&source) {
        record.used += count;
        info!("{source} quota: {}/{}", record.used, record.limit);
    }
}

/// Providers with budget left, ordered by remaining quota descending so
/// the least-consumed API is tried first. Ties keep source order, which is
/// stable across runs.
pub fn available_sources(ledger: &QuotaLedger) -> Vec<SourceId> {
    let mut available: Vec<(SourceId, u32)> = ledger
        .iter()
        .filter(|(_, record)| record.used < record.limit)
        .map(|(source, record)| (*source, record.remaining()))
        .collect();
    available.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    available.into_iter().map(|(source, _)| source).collect()
}

pub fn quota_status(ledger: &QuotaLedger) -> BTreeMap<SourceId, QuotaStatus> {
    ledger
        .iter()
        .map(|(source, record)| {
            let percentage = if record.limit > 0 {
                (f64::from(record.used) / f64::from(record.limit) * 1000.0).round() / 10.0
            } else {
                0.0
            };
            (
                *source,
                QuotaStatus {
                    used: record.used,
                    limit: record.limit,
                    remaining: record.remaining(),
                    percentage,
                    reset_date: record.reset_date,
                },
            )
        })
        .collect()
}

/// True while at least one provider retains more than 10% of its budget.
pub fn quota_health(ledger: &QuotaLedger) -> bool {
    ledger
        .values()
        .any(|record| f64::from(record.remaining()) > f64::from(record.limit) * 0.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ledger_with(used: u32, limit: u32) -> QuotaLedger {
        let mut limits = BTreeMap::new();
        limits.insert(SourceId::RentCast, limit);
        let mut ledger = init_ledger(&limits, Utc::now());
        increment(&mut ledger, SourceId::RentCast, used);
        ledger
    }

    #[test]
    fn counters_reset_on_a_new_month() {
        let mut ledger = ledger_with(40, 50);
        let record = ledger.get_mut(&SourceId::RentCast).unwrap();
        record.reset_date = month_start(Utc::now()) - Duration::days(40);

        reset_if_new_month(&mut ledger, Utc::now());
        let record = &ledger[&SourceId::RentCast];
        assert_eq!(record.used, 0);
        assert_eq!(record.reset_date, month_start(Utc::now()));
    }

    #[test]
    fn counters_survive_within_the_same_month() {
        let mut ledger = ledger_with(40, 50);
        reset_if_new_month(&mut ledger, Utc::now());
        assert_eq!(ledger[&SourceId::RentCast].used, 40);
    }

    #[test]
    fn exhausted_providers_drop_out_and_order_follows_remaining_budget() {
        let mut limits = BTreeMap::new();
        limits.insert(SourceId::RentCast, 50);
        limits.insert(SourceId::RapidApi, 100);
        limits.insert(SourceId::Homesage, 500);
        let mut ledger = init_ledger(&limits, Utc::now());

        increment(&mut ledger, SourceId::Homesage, 490);
        increment(&mut ledger, SourceId::RentCast, 50);

        let order = available_sources(&ledger);
        assert_eq!(order, vec![SourceId::RapidApi, SourceId::Homesage]);
    }

    #[test]
    fn health_needs_one_provider_above_ten_percent() {
        let mut ledger = ledger_with(46, 50);
        assert!(!quota_health(&ledger));

        let record = ledger.get_mut(&SourceId::RentCast).unwrap();
        record.used = 40;
        assert!(quota_health(&ledger));
    }

    #[test]
    fn status_reports_rounded_percentage() {
        let ledger = ledger_with(25, 50);
        let status = quota_status(&ledger);
        let record = &status[&SourceId::RentCast];
        assert_eq!(record.remaining, 25);
        assert!((record.percentage - 50.0).abs() < f64::EPSILON);
    }
}
