//! Small shared helpers

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get the current timestamp in seconds
pub fn timestamp_secs() -> u64 {
    let start = SystemTime::now();
    let since_epoch = start
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0));
    since_epoch.as_secs()
}
