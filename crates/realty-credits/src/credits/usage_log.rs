use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AiTool, UserId};

pub const DEFAULT_USAGE_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageEvent {
    Attempted,
    Succeeded,
    Failed,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLogEntry {
    pub recorded_at: DateTime<Utc>,
    pub user_id: UserId,
    pub tool: AiTool,
    pub event: UsageEvent,
    pub credits: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Bounded in-process mirror of tool attempts.
///
/// Only the most recent `capacity` entries are retained. This is a debugging
/// aid for the admin console; the ledger is the durable record.
#[derive(Debug)]
pub struct UsageLogger {
    capacity: usize,
    entries: Mutex<VecDeque<UsageLogEntry>>,
}

impl Default for UsageLogger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_USAGE_LOG_CAPACITY)
    }
}

impl UsageLogger {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, entry: UsageLogEntry) {
        let mut guard = self.entries.lock().expect("usage log mutex poisoned");
        while guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(entry);
    }

    /// Newest entries first.
    pub fn recent(&self, limit: usize) -> Vec<UsageLogEntry> {
        let guard = self.entries.lock().expect("usage log mutex poisoned");
        guard.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("usage log mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns every buffered entry, oldest first, for forwarding.
    pub fn drain(&self) -> Vec<UsageLogEntry> {
        let mut guard = self.entries.lock().expect("usage log mutex poisoned");
        guard.drain(..).collect()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .expect("usage log mutex poisoned")
            .clear();
    }
}
