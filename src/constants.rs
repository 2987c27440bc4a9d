//! System-wide constants shared across messaging, storage, and scheduling.

/// Advisory lock key electing the single purge runner across the fleet.
///
/// Must stay distinct from every other advisory key the platform uses
/// (migrations use their own key space).
pub const SESSION_PURGE_LOCK_KEY: i64 = 740_211_905_331;

/// Floor applied to the configured purge batch size.
pub const MIN_PURGE_BATCH_SIZE: i64 = 100;

/// Suffix appended to an inbound queue name to form its reply companion.
pub const OUTBOUND_QUEUE_SUFFIX: &str = "-out";

/// Metadata key carrying the callback queue name.
pub const CALLBACK_QUEUE_KEY: &str = "callback_queue";

/// Metadata key carrying the callback method name.
pub const CALLBACK_METHOD_KEY: &str = "callback_method";

/// Default visibility timeout for in-flight queue messages, in seconds.
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: i32 = 60;

/// Default delay before a transiently failed message becomes visible again.
pub const DEFAULT_RETRY_DELAY_SECS: i32 = 30;
