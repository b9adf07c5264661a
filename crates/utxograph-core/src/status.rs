//! Import status feed.
//!
//! [`StatusReporter`] collects a bounded window of recent log and error
//! lines for the status API and mirrors every entry to `tracing`. It is
//! observability only — nothing reads it back into control flow.

use std::collections::VecDeque;

use serde::Serialize;
use tokio::sync::RwLock;

/// Default number of log and error lines retained.
pub const DEFAULT_STATUS_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Most recent log lines, oldest first.
    pub logs: Vec<String>,
    /// Most recent error lines, oldest first.
    pub errors: Vec<String>,
    /// Total log lines ever reported, including evicted ones.
    pub log_count: u64,
    /// Total error lines ever reported, including evicted ones.
    pub error_count: u64,
}

#[derive(Default)]
struct StatusInner {
    logs: VecDeque<String>,
    errors: VecDeque<String>,
    log_count: u64,
    error_count: u64,
}

pub struct StatusReporter {
    inner: RwLock<StatusInner>,
    capacity: usize,
}

impl StatusReporter {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(StatusInner::default()),
            capacity: capacity.max(1),
        }
    }

    pub async fn add_log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        let mut inner = self.inner.write().await;
        inner.log_count += 1;
        inner.logs.push_back(message);
        while inner.logs.len() > self.capacity {
            inner.logs.pop_front();
        }
    }

    pub async fn add_error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{message}");
        let mut inner = self.inner.write().await;
        inner.error_count += 1;
        inner.errors.push_back(message);
        while inner.errors.len() > self.capacity {
            inner.errors.pop_front();
        }
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        let inner = self.inner.read().await;
        StatusSnapshot {
            logs: inner.logs.iter().cloned().collect(),
            errors: inner.errors.iter().cloned().collect(),
            log_count: inner.log_count,
            error_count: inner.error_count,
        }
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn retains_a_bounded_window() {
        let status = StatusReporter::new(2);
        status.add_log("one").await;
        status.add_log("two").await;
        status.add_log("three").await;
        status.add_error("boom").await;

        let snapshot = status.snapshot().await;
        assert_eq!(snapshot.logs, vec!["two".to_owned(), "three".to_owned()]);
        assert_eq!(snapshot.errors, vec!["boom".to_owned()]);
        assert_eq!(snapshot.log_count, 3);
        assert_eq!(snapshot.error_count, 1);
    }
}
