//! # Configuration Management
//!
//! Environment-driven configuration for the core service: database
//! connection, queue consumption, and the nightly session purge schedule.
//! Defaults are development-friendly; every field can be overridden through
//! `CAMPUS_*` environment variables.

use crate::constants::{
    DEFAULT_RETRY_DELAY_SECS, DEFAULT_VISIBILITY_TIMEOUT_SECS, MIN_PURGE_BATCH_SIZE,
};
use crate::error::{CoreError, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;

/// Top-level configuration for the core service.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub database_url: String,
    pub consumer: ConsumerConfig,
    pub scheduler: SchedulerConfig,
}

/// Queue consumption tuning.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Inbound action queue name. The reply companion is derived from it.
    pub queue_name: String,
    /// Visibility timeout granted per read, in seconds.
    pub visibility_timeout_secs: i32,
    /// Maximum messages pulled per read.
    pub batch_size: i32,
    /// Idle sleep between empty polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Redelivery delay applied when a message fails transiently.
    pub retry_delay_secs: i32,
}

/// Nightly purge schedule, evaluated in the configured time zone.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub time_zone_id: String,
    pub hour: u32,
    pub minute: u32,
    pub batch_size: i64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/campus_development".to_string(),
            consumer: ConsumerConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            queue_name: "task_actions".to_string(),
            visibility_timeout_secs: DEFAULT_VISIBILITY_TIMEOUT_SECS,
            batch_size: 10,
            poll_interval_ms: 500,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            time_zone_id: "UTC".to_string(),
            hour: 3,
            minute: 0,
            batch_size: 500,
        }
    }
}

impl CoreConfig {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }
        if let Ok(queue) = std::env::var("CAMPUS_ACTION_QUEUE") {
            config.consumer.queue_name = queue;
        }
        if let Ok(vt) = std::env::var("CAMPUS_VISIBILITY_TIMEOUT_SECS") {
            config.consumer.visibility_timeout_secs = vt.parse().map_err(|e| {
                CoreError::Configuration(format!("Invalid visibility timeout: {e}"))
            })?;
        }
        if let Ok(delay) = std::env::var("CAMPUS_RETRY_DELAY_SECS") {
            config.consumer.retry_delay_secs = delay
                .parse()
                .map_err(|e| CoreError::Configuration(format!("Invalid retry delay: {e}")))?;
        }
        if let Ok(enabled) = std::env::var("CAMPUS_PURGE_ENABLED") {
            config.scheduler.enabled = enabled.parse().map_err(|e| {
                CoreError::Configuration(format!("Invalid purge enabled flag: {e}"))
            })?;
        }
        if let Ok(tz) = std::env::var("CAMPUS_PURGE_TIME_ZONE") {
            config.scheduler.time_zone_id = tz;
        }
        if let Ok(hour) = std::env::var("CAMPUS_PURGE_HOUR") {
            config.scheduler.hour = hour
                .parse()
                .map_err(|e| CoreError::Configuration(format!("Invalid purge hour: {e}")))?;
        }
        if let Ok(minute) = std::env::var("CAMPUS_PURGE_MINUTE") {
            config.scheduler.minute = minute
                .parse()
                .map_err(|e| CoreError::Configuration(format!("Invalid purge minute: {e}")))?;
        }
        if let Ok(batch) = std::env::var("CAMPUS_PURGE_BATCH_SIZE") {
            config.scheduler.batch_size = batch
                .parse()
                .map_err(|e| CoreError::Configuration(format!("Invalid purge batch size: {e}")))?;
        }

        config.scheduler.validate()?;
        Ok(config)
    }
}

impl SchedulerConfig {
    /// Validate the schedule and resolve it into concrete chrono types.
    ///
    /// The batch size is clamped up to [`MIN_PURGE_BATCH_SIZE`] so a
    /// misconfigured tiny batch cannot turn the purge into a row-at-a-time
    /// crawl.
    pub fn validate(&self) -> Result<ScheduleSpec> {
        let tz: Tz = self.time_zone_id.parse().map_err(|_| {
            CoreError::Configuration(format!("Unknown time zone id: {}", self.time_zone_id))
        })?;
        let at = NaiveTime::from_hms_opt(self.hour, self.minute, 0).ok_or_else(|| {
            CoreError::Configuration(format!(
                "Invalid purge time {:02}:{:02}",
                self.hour, self.minute
            ))
        })?;
        Ok(ScheduleSpec {
            tz,
            at,
            batch_size: self.batch_size.max(MIN_PURGE_BATCH_SIZE),
        })
    }
}

/// A validated schedule: time zone, local wall-clock time, effective batch.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleSpec {
    pub tz: Tz,
    pub at: NaiveTime,
    pub batch_size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scheduler_validates() {
        let spec = SchedulerConfig::default().validate().unwrap();
        assert_eq!(spec.tz, chrono_tz::UTC);
        assert_eq!(spec.at, NaiveTime::from_hms_opt(3, 0, 0).unwrap());
    }

    #[test]
    fn batch_size_floor_is_enforced() {
        let config = SchedulerConfig {
            batch_size: 7,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.validate().unwrap().batch_size, 100);
    }

    #[test]
    fn bad_time_zone_is_rejected() {
        let config = SchedulerConfig {
            time_zone_id: "Mars/Olympus_Mons".to_string(),
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_hour_is_rejected() {
        let config = SchedulerConfig {
            hour: 25,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
