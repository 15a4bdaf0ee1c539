mod realtime_shared_list;
mod realtime_shared_object;

pub use realtime_shared_list::{RealtimeListLock, RealtimeSharedList};
pub use realtime_shared_object::{RealtimeLock, RealtimeSharedObject};

/// Upper bound on publish attempts before `update` reports failure.
pub const DEFAULT_RETRY_LIMIT: usize = 100_000;

/// Sleep between publish attempts while the realtime side holds the value.
pub const RETRY_SLEEP: std::time::Duration = std::time::Duration::from_micros(100);
