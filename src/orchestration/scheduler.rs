//! # Distributed Singleton Scheduler
//!
//! One long-lived loop per process: sleep until the configured wall-clock
//! time in the configured zone, then race the rest of the fleet for a
//! non-blocking cluster lock. The winner drives the purge engine; losers go
//! straight back to sleep, which is the expected steady state everywhere
//! but one replica. The next run instant is recomputed every cycle, so
//! daylight-saving transitions self-correct instead of drifting.

use crate::config::{ScheduleSpec, SchedulerConfig};
use crate::constants::SESSION_PURGE_LOCK_KEY;
use crate::error::Result;
use crate::orchestration::purge::SessionPurger;
use crate::storage::{ClusterLock, StoreError};
use chrono::{DateTime, Duration as ChronoDuration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What one scheduler wake-up did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another replica holds the lock; nothing to do.
    Skipped,
    /// This replica won the lock and ran the purge.
    Completed { deleted_count: u64 },
}

/// Nightly purge scheduler. At most one instance across the fleet performs
/// a run at a time, enforced by the cluster lock rather than by counting.
pub struct PurgeScheduler {
    spec: ScheduleSpec,
    enabled: bool,
    lock: Arc<dyn ClusterLock>,
    purger: SessionPurger,
    cancellation: CancellationToken,
}

impl PurgeScheduler {
    pub fn new(
        config: &SchedulerConfig,
        lock: Arc<dyn ClusterLock>,
        purger: SessionPurger,
        cancellation: CancellationToken,
    ) -> Result<Self> {
        Ok(Self {
            spec: config.validate()?,
            enabled: config.enabled,
            lock,
            purger,
            cancellation,
        })
    }

    /// Run until cancelled. A failed cycle is logged and swallowed; the
    /// next scheduled cycle always still occurs.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Purge scheduler disabled by configuration");
            return;
        }

        loop {
            let now = Utc::now();
            let next = next_run_after(&self.spec, now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %next, wait_secs = wait.as_secs(), "Purge scheduler sleeping");

            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    info!("Purge scheduler shutting down");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            match self.run_cycle().await {
                Ok(CycleOutcome::Skipped) => {
                    debug!("Purge lock held elsewhere; skipping this cycle");
                }
                Ok(CycleOutcome::Completed { deleted_count }) => {
                    info!(deleted_count, "Scheduled session purge completed");
                }
                Err(e) => {
                    error!(error = %e, "Purge cycle failed; next cycle unaffected");
                }
            }
        }
    }

    /// One wake-up: try the lock, purge on success, always release.
    pub async fn run_cycle(&self) -> std::result::Result<CycleOutcome, StoreError> {
        if !self.lock.try_acquire(SESSION_PURGE_LOCK_KEY).await? {
            return Ok(CycleOutcome::Skipped);
        }

        // Release on every exit path, purge failure included.
        let result = self.purger.purge(self.spec.batch_size).await;
        if let Err(e) = self.lock.release(SESSION_PURGE_LOCK_KEY).await {
            warn!(error = %e, "Failed to release purge lock");
        }

        result.map(|deleted_count| CycleOutcome::Completed { deleted_count })
    }
}

/// Next instant strictly after `now` matching the schedule's local
/// wall-clock time.
pub fn next_run_after(spec: &ScheduleSpec, now: DateTime<Utc>) -> DateTime<Utc> {
    let local_now = now.with_timezone(&spec.tz);
    let today = local_now.date_naive();

    for day_offset in 0..=2 {
        let date = today + ChronoDuration::days(day_offset);
        if let Some(candidate) = resolve_local(spec.tz, date, spec.at) {
            if candidate > local_now {
                return candidate.with_timezone(&Utc);
            }
        }
    }

    // Unreachable with a valid schedule; degrade to a daily cadence.
    now + ChronoDuration::hours(24)
}

/// Resolve a local wall-clock time on a given date, handling daylight
/// saving: ambiguous times (fall back) take the earliest instant, skipped
/// times (spring forward) roll to the next valid wall-clock minute.
fn resolve_local(tz: Tz, date: NaiveDate, at: NaiveTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&date.and_time(at)) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _latest) => Some(earliest),
        LocalResult::None => {
            let mut probe = date.and_time(at);
            // DST gaps are at most a few hours; probe in 15-minute steps.
            for _ in 0..16 {
                probe += ChronoDuration::minutes(15);
                if let LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) =
                    tz.from_local_datetime(&probe)
                {
                    return Some(dt);
                }
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;
    use chrono_tz::UTC;

    fn spec(tz: Tz, hour: u32, minute: u32) -> ScheduleSpec {
        ScheduleSpec {
            tz,
            at: NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            batch_size: 500,
        }
    }

    #[test]
    fn runs_today_when_slot_is_still_ahead() {
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 1, 0, 0).unwrap();
        let next = next_run_after(&spec(UTC, 3, 0), now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 6, 10, 3, 0, 0).unwrap());
    }

    #[test]
    fn rolls_to_tomorrow_when_slot_has_passed() {
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 3, 0, 0).unwrap();
        let next = next_run_after(&spec(UTC, 3, 0), now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 6, 11, 3, 0, 0).unwrap());
    }

    #[test]
    fn schedule_is_evaluated_in_the_configured_zone() {
        // 03:00 New York in June is 07:00 UTC.
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 5, 0, 0).unwrap();
        let next = next_run_after(&spec(New_York, 3, 0), now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 6, 10, 7, 0, 0).unwrap());
    }

    #[test]
    fn spring_forward_gap_rolls_to_next_valid_time() {
        // 2026-03-08 02:30 does not exist in New York; the clock jumps
        // from 02:00 EST to 03:00 EDT. Expect 03:00 EDT = 07:00 UTC.
        let now = Utc.with_ymd_and_hms(2026, 3, 8, 6, 0, 0).unwrap();
        let next = next_run_after(&spec(New_York, 2, 30), now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 8, 7, 0, 0).unwrap());
    }

    #[test]
    fn fall_back_ambiguity_takes_earliest_instant() {
        // 2026-11-01 01:30 occurs twice in New York; earliest is EDT,
        // which is 05:30 UTC.
        let now = Utc.with_ymd_and_hms(2026, 11, 1, 4, 0, 0).unwrap();
        let next = next_run_after(&spec(New_York, 1, 30), now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 11, 1, 5, 30, 0).unwrap());
    }
}
