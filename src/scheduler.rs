//! Daily trigger.
//!
//! Sleeps until the next local occurrence of the configured time of day,
//! then runs an ingestion followed by a push. A failed run is logged and the
//! loop carries on to the next day.

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::digest::{DigestService, PushStatus};

/// Next instant strictly after `now` whose wall-clock time is `hour:minute`.
///
/// Days where that wall-clock time does not exist (a DST gap) are skipped;
/// where it occurs twice the earlier one is used. `None` for an invalid time.
pub fn next_run<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    let at = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let tz = now.timezone();
    let mut day = now.date_naive();
    for _ in 0..3 {
        if let Some(candidate) = tz.from_local_datetime(&day.and_time(at)).earliest() {
            if candidate > *now {
                return Some(candidate);
            }
        }
        day = day.succ_opt()?;
    }
    None
}

/// Run ingest → push once per day until the process exits.
pub async fn run(service: &DigestService) {
    let (hour, minute) = service.config().schedule.time_of_day();
    info!(hour, minute, "Scheduler started");

    loop {
        let now = Local::now();
        let Some(next) = next_run(&now, hour, minute) else {
            error!(hour, minute, "Invalid schedule time; scheduler stopping");
            return;
        };
        let wait = (next.clone() - now).max(Duration::zero());
        info!(next = %next.to_rfc3339(), wait_secs = wait.num_seconds(), "Waiting for next run");
        sleep(wait.to_std().unwrap_or_default()).await;

        run_once(service).await;
    }
}

/// One scheduled job: ingest every source, then push.
pub async fn run_once(service: &DigestService) {
    match service.ingest_all().await {
        Ok(added) => info!(added, "Scheduled ingestion done"),
        Err(e) => error!(error = %e, "Scheduled ingestion failed"),
    }

    match service.push().await {
        Ok(PushStatus::Sent { count, channels }) => {
            info!(count, ?channels, "Scheduled push delivered")
        }
        Ok(status) => warn!(?status, "Scheduled push did not deliver"),
        Err(e) => error!(error = %e, "Scheduled push failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_next_run_later_today() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 15, 0).unwrap();
        assert_eq!(
            next_run(&now, 14, 0),
            Some(Utc.with_ymd_and_hms(2026, 10, 16, 14, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 14, 0, 0).unwrap();
        assert_eq!(
            next_run(&now, 14, 0),
            Some(Utc.with_ymd_and_hms(2026, 10, 17, 14, 0, 0).unwrap())
        );
        let late = Utc.with_ymd_and_hms(2026, 12, 31, 23, 30, 0).unwrap();
        assert_eq!(
            next_run(&late, 9, 30),
            Some(Utc.with_ymd_and_hms(2027, 1, 1, 9, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_next_run_rejects_invalid_time() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 15, 0).unwrap();
        assert_eq!(next_run(&now, 24, 0), None);
    }
}
