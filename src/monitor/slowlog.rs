// src/monitor/slowlog.rs

use super::SlowLogEntry;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing::warn;

pub struct SlowLog {
    logs: Mutex<VecDeque<SlowLogEntry>>,
    max_entries: usize,
    slow_threshold: Duration,
}

impl SlowLog {
    pub fn new(max_entries: usize, slow_threshold: Duration) -> Self {
        SlowLog {
            logs: Mutex::new(VecDeque::with_capacity(max_entries)),
            max_entries,
            slow_threshold,
        }
    }

    pub fn add_entry(&self, op: &'static str, key: &str, duration: Duration) {
        if duration < self.slow_threshold {
            return;
        }
        warn!(op, key, elapsed_ms = duration.as_millis() as u64, "slow store call");
        let mut logs = self.logs.lock().unwrap_or_else(|p| p.into_inner());
        if logs.len() >= self.max_entries {
            logs.pop_back();
        }
        logs.push_front(SlowLogEntry {
            timestamp: SystemTime::now(),
            duration,
            op,
            key: key.to_string(),
        });
    }

    /// 最新的在前
    pub fn entries(&self) -> Vec<SlowLogEntry> {
        let logs = self.logs.lock().unwrap_or_else(|p| p.into_inner());
        logs.iter().cloned().collect()
    }

    pub fn get_logs(&self) -> String {
        let mut response = String::new();
        for (i, entry) in self.entries().iter().enumerate() {
            response.push_str(&format!(
                "{}. duration: {}ms, op: {}, key: {}\n",
                i + 1,
                entry.duration.as_millis(),
                entry.op,
                entry.key
            ));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_slow_calls_are_kept_newest_first() {
        let log = SlowLog::new(2, Duration::from_millis(10));
        log.add_entry("get", "app:fast", Duration::from_millis(1));
        log.add_entry("get", "app:a", Duration::from_millis(10));
        log.add_entry("set", "app:b", Duration::from_millis(30));
        log.add_entry("del", "app:c", Duration::from_millis(50));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "app:c");
        assert_eq!(entries[1].key, "app:b");
        assert!(log.get_logs().starts_with("1. duration: 50ms, op: del, key: app:c\n"));
    }
}
