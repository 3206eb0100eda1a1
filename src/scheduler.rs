use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone};
use tracing::{error, info, warn};

use crate::pipeline::{run_check, CheckContext, CycleError};

/// Parses `"HH:MM"` entries from the schedule config.
pub fn parse_check_times(raw_times: &[String]) -> Result<Vec<NaiveTime>> {
    let mut times = Vec::new();
    for raw in raw_times {
        let time = NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .with_context(|| format!("invalid check time: {raw}"))?;
        times.push(time);
    }
    if times.is_empty() {
        return Err(anyhow!("schedule has no check times"));
    }
    times.sort();
    times.dedup();
    Ok(times)
}

/// Earliest configured occurrence strictly after `now`, today or tomorrow.
/// Check times are wall-clock times in the zone of `now`.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, times: &[NaiveTime]) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let mut best: Option<DateTime<Tz>> = None;
    for offset_days in 0..2 {
        let date = today + Duration::days(offset_days);
        for time in times {
            let Some(candidate) = tz.from_local_datetime(&date.and_time(*time)).earliest() else {
                continue;
            };
            if candidate > *now && best.as_ref().map_or(true, |b| candidate < *b) {
                best = Some(candidate);
            }
        }
    }
    best.unwrap_or_else(|| now.clone() + Duration::days(1))
}

/// Daemon loop: sleep until the next configured check time, run a cycle,
/// repeat. A cycle still running when the next slot fires is skipped, not
/// stacked.
pub async fn run_schedule(ctx: Arc<CheckContext>) -> Result<()> {
    let times = parse_check_times(&ctx.config.schedule.check_times)?;
    info!(
        "scheduler running with check times: {}",
        ctx.config
            .schedule
            .check_times
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );

    loop {
        let now = Local::now();
        let next = next_run_after(&now, &times);
        let wait = (next.clone() - now)
            .to_std()
            .unwrap_or_else(|_| std::time::Duration::from_secs(60));
        info!("next check at {}", next.format("%Y-%m-%d %H:%M:%S"));
        tokio::time::sleep(wait).await;

        match run_check(&ctx).await {
            Ok(report) => info!(
                "scheduled check done: {} new, {} total",
                report.stats.new_count, report.stats.total_current
            ),
            Err(CycleError::Busy) => warn!("skipping scheduled check, a cycle is already running"),
            Err(CycleError::Failed(err)) => error!("scheduled check failed: {err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn check_times_parse_sort_and_dedupe() {
        let times = parse_check_times(&[
            "18:00".to_string(),
            "08:00".to_string(),
            " 08:00 ".to_string(),
        ])
        .expect("parse failed");
        assert_eq!(times.len(), 2);
        assert_eq!(times[0], NaiveTime::from_hms_opt(8, 0, 0).unwrap());

        assert!(parse_check_times(&["25:99".to_string()]).is_err());
        assert!(parse_check_times(&[]).is_err());
    }

    #[test]
    fn next_run_picks_the_following_slot_today_or_tomorrow() {
        let times = parse_check_times(&["08:00".to_string(), "18:00".to_string()]).unwrap();

        let morning = Utc.with_ymd_and_hms(2025, 6, 1, 7, 0, 0).unwrap();
        assert_eq!(
            next_run_after(&morning, &times),
            Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
        );

        let midday = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(
            next_run_after(&midday, &times),
            Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap()
        );

        let evening = Utc.with_ymd_and_hms(2025, 6, 1, 23, 0, 0).unwrap();
        assert_eq!(
            next_run_after(&evening, &times),
            Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn a_slot_equal_to_now_rolls_to_the_next_occurrence() {
        let times = parse_check_times(&["08:00".to_string()]).unwrap();
        let exactly_eight = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        assert_eq!(
            next_run_after(&exactly_eight, &times),
            Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap()
        );
    }
}
