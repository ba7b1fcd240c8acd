// src/monitor/mod.rs
//! 监控与诊断模块：按操作统计调用次数 / 错误次数，记录慢调用
mod metrics;
mod slowlog;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

pub use metrics::Metrics;
pub use slowlog::SlowLog;

/// 监控系统主结构，facade 的所有克隆共享同一份
#[derive(Clone)]
pub struct Monitor {
    pub slow_log: Arc<SlowLog>,
    pub metrics: Arc<Metrics>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::config::DEFAULT_SLOW_CALL_MS))
    }
}

impl Monitor {
    pub fn new(slow_threshold: Duration) -> Self {
        Monitor {
            slow_log: Arc::new(SlowLog::new(128, slow_threshold)),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// 记录一次已完成（成功、失败或被取消）的调用
    pub fn observe(&self, op: &'static str, key: &str, elapsed: Duration, failed: bool) {
        self.metrics.record(op, failed);
        self.slow_log.add_entry(op, key, elapsed);
    }
}

/// 慢日志条目
#[derive(Debug, Clone)]
pub struct SlowLogEntry {
    pub timestamp: SystemTime,
    pub duration: Duration,
    pub op: &'static str,
    /// 物理 key
    pub key: String,
}
