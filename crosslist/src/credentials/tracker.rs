//! Consecutive refresh failure tracking per platform.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::domain::Platform;

#[derive(Debug, Clone)]
struct FailureRecord {
    count: u32,
    first_failure: DateTime<Utc>,
    last_failure: DateTime<Utc>,
    last_error: String,
}

#[derive(Debug, Default)]
pub struct RefreshFailureTracker {
    failures: DashMap<Platform, FailureRecord>,
}

impl RefreshFailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure and return the updated count.
    pub fn record_failure(&self, platform: Platform, error: &str) -> u32 {
        let now = Utc::now();
        let mut entry = self.failures.entry(platform).or_insert(FailureRecord {
            count: 0,
            first_failure: now,
            last_failure: now,
            last_error: String::new(),
        });

        entry.count += 1;
        entry.last_failure = now;
        entry.last_error = error.to_string();
        entry.count
    }

    pub fn clear(&self, platform: Platform) {
        self.failures.remove(&platform);
    }

    pub fn failure_count(&self, platform: Platform) -> u32 {
        self.failures.get(&platform).map(|r| r.count).unwrap_or(0)
    }

    pub fn get_failure_info(&self, platform: Platform) -> Option<FailureInfo> {
        self.failures.get(&platform).map(|r| FailureInfo {
            count: r.count,
            first_failure: r.first_failure,
            last_failure: r.last_failure,
            last_error: r.last_error.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureInfo {
    pub count: u32,
    pub first_failure: DateTime<Utc>,
    pub last_failure: DateTime<Utc>,
    pub last_error: String,
}
