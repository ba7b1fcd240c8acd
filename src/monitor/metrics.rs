// src/monitor/metrics.rs

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    pub call_count: AtomicU64,
    pub error_count: AtomicU64,
    /// op → (calls, errors)
    pub op_stats: DashMap<&'static str, (u64, u64)>,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    pub fn record(&self, op: &'static str, failed: bool) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        let mut entry = self.op_stats.entry(op).or_insert((0, 0));
        entry.0 += 1;
        if failed {
            entry.1 += 1;
        }
    }

    pub fn calls(&self, op: &str) -> u64 {
        self.op_stats.get(op).map(|e| e.0).unwrap_or(0)
    }

    pub fn errors(&self, op: &str) -> u64 {
        self.op_stats.get(op).map(|e| e.1).unwrap_or(0)
    }

    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP nskv_calls_total Store calls issued through the facade\n");
        output.push_str("# TYPE nskv_calls_total counter\n");
        output.push_str(&format!(
            "nskv_calls_total {}\n",
            self.call_count.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP nskv_errors_total Store calls that returned an error\n");
        output.push_str("# TYPE nskv_errors_total counter\n");
        output.push_str(&format!(
            "nskv_errors_total {}\n",
            self.error_count.load(Ordering::Relaxed)
        ));

        // 按操作名排序，输出稳定
        let mut ops: Vec<(&'static str, (u64, u64))> =
            self.op_stats.iter().map(|e| (*e.key(), *e.value())).collect();
        ops.sort_by_key(|(op, _)| *op);

        output.push_str("# HELP nskv_op_calls_total Calls per operation\n");
        output.push_str("# TYPE nskv_op_calls_total counter\n");
        for (op, (calls, _)) in &ops {
            output.push_str(&format!("nskv_op_calls_total{{op=\"{}\"}} {}\n", op, calls));
        }

        output.push_str("# HELP nskv_op_errors_total Errors per operation\n");
        output.push_str("# TYPE nskv_op_errors_total counter\n");
        for (op, (_, errors)) in &ops {
            output.push_str(&format!("nskv_op_errors_total{{op=\"{}\"}} {}\n", op, errors));
        }

        output
    }
}
