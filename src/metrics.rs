//! Process-wide metrics: tool-call counters, cache-status counters and
//! per-tool latency averages, exported in a line-oriented text format.
//!
//! The registry is a cheap cloneable handle; all mutation goes through its
//! own methods and readers take a snapshot, so exports never block callers
//! for long.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::upstream::cache::CacheStatus;

/// Outcome of one tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
        }
    }
}

#[derive(Default)]
struct Inner {
    tool_calls: RwLock<HashMap<(String, Outcome), u64>>,
    latency: RwLock<HashMap<String, (u64, u64)>>, // (sum_ms, count)
    cache_hit: AtomicU64,
    cache_miss: AtomicU64,
    cache_expired: AtomicU64,
    cache_bypass: AtomicU64,
}

/// Cloneable handle to the process-wide metrics registry.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    inner: Arc<Inner>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one tool call by `(tool, outcome)`.
    pub fn record_tool_call(&self, tool: &str, outcome: Outcome) {
        let mut calls = self.inner.tool_calls.write().unwrap();
        *calls.entry((tool.to_string(), outcome)).or_insert(0) += 1;
    }

    /// Add one latency sample for a tool.
    pub fn record_latency(&self, tool: &str, latency_ms: u64) {
        let mut latency = self.inner.latency.write().unwrap();
        let entry = latency.entry(tool.to_string()).or_insert((0, 0));
        entry.0 += latency_ms;
        entry.1 += 1;
    }

    /// Count one proxy cache observation.
    pub fn record_cache_status(&self, status: CacheStatus) {
        let counter = match status {
            CacheStatus::Hit => &self.inner.cache_hit,
            CacheStatus::Miss => &self.inner.cache_miss,
            CacheStatus::Expired => &self.inner.cache_expired,
            CacheStatus::Bypass => &self.inner.cache_bypass,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Average latency for a tool in milliseconds; 0 with no samples.
    pub fn average_latency_ms(&self, tool: &str) -> f64 {
        let latency = self.inner.latency.read().unwrap();
        match latency.get(tool) {
            Some((sum, count)) if *count > 0 => *sum as f64 / *count as f64,
            _ => 0.0,
        }
    }

    /// Cache hit ratio hits/(hits+misses); 0 when nothing was counted.
    pub fn cache_hit_ratio(&self) -> f64 {
        let hits = self.inner.cache_hit.load(Ordering::Relaxed);
        let misses = self.inner.cache_miss.load(Ordering::Relaxed);
        if hits + misses == 0 {
            0.0
        } else {
            hits as f64 / (hits + misses) as f64
        }
    }

    /// Counter value for a `(tool, outcome)` pair.
    pub fn tool_call_count(&self, tool: &str, outcome: Outcome) -> u64 {
        let calls = self.inner.tool_calls.read().unwrap();
        calls
            .get(&(tool.to_string(), outcome))
            .copied()
            .unwrap_or(0)
    }

    /// Render the text exposition format served at `/metrics`.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP nordvaer_tool_calls_total Tool calls by tool and outcome\n");
        out.push_str("# TYPE nordvaer_tool_calls_total counter\n");
        let calls = {
            let calls = self.inner.tool_calls.read().unwrap();
            let mut snapshot: Vec<_> = calls
                .iter()
                .map(|((tool, outcome), count)| (tool.clone(), *outcome, *count))
                .collect();
            snapshot.sort_by(|a, b| (&a.0, a.1.as_str()).cmp(&(&b.0, b.1.as_str())));
            snapshot
        };
        for (tool, outcome, count) in &calls {
            out.push_str(&format!(
                "nordvaer_tool_calls_total{{tool=\"{}\",outcome=\"{}\"}} {}\n",
                tool,
                outcome.as_str(),
                count
            ));
        }

        out.push_str("# HELP nordvaer_cache_requests_total Proxy cache observations by status\n");
        out.push_str("# TYPE nordvaer_cache_requests_total counter\n");
        for (label, counter) in [
            ("HIT", &self.inner.cache_hit),
            ("MISS", &self.inner.cache_miss),
            ("EXPIRED", &self.inner.cache_expired),
            ("BYPASS", &self.inner.cache_bypass),
        ] {
            out.push_str(&format!(
                "nordvaer_cache_requests_total{{status=\"{}\"}} {}\n",
                label,
                counter.load(Ordering::Relaxed)
            ));
        }

        out.push_str("# HELP nordvaer_tool_latency_avg_ms Average tool latency in milliseconds\n");
        out.push_str("# TYPE nordvaer_tool_latency_avg_ms gauge\n");
        let latency = {
            let latency = self.inner.latency.read().unwrap();
            let mut snapshot: Vec<_> = latency
                .iter()
                .map(|(tool, (sum, count))| (tool.clone(), *sum, *count))
                .collect();
            snapshot.sort();
            snapshot
        };
        for (tool, sum, count) in &latency {
            let avg = if *count > 0 {
                *sum as f64 / *count as f64
            } else {
                0.0
            };
            out.push_str(&format!(
                "nordvaer_tool_latency_avg_ms{{tool=\"{}\"}} {:.2}\n",
                tool, avg
            ));
        }

        out.push_str("# HELP nordvaer_cache_hit_ratio Proxy cache hits over hits plus misses\n");
        out.push_str("# TYPE nordvaer_cache_hit_ratio gauge\n");
        out.push_str(&format!(
            "nordvaer_cache_hit_ratio {:.4}\n",
            self.cache_hit_ratio()
        ));

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsRegistry::new();
        metrics.record_tool_call("weather.get_forecast", Outcome::Success);
        metrics.record_tool_call("weather.get_forecast", Outcome::Success);
        metrics.record_tool_call("weather.get_forecast", Outcome::Error);

        assert_eq!(
            metrics.tool_call_count("weather.get_forecast", Outcome::Success),
            2
        );
        assert_eq!(
            metrics.tool_call_count("weather.get_forecast", Outcome::Error),
            1
        );
        assert_eq!(metrics.tool_call_count("places.resolve_name", Outcome::Success), 0);
    }

    #[test]
    fn latency_average() {
        let metrics = MetricsRegistry::new();
        assert_eq!(metrics.average_latency_ms("weather.get_nowcast"), 0.0);

        metrics.record_latency("weather.get_nowcast", 10);
        metrics.record_latency("weather.get_nowcast", 20);
        assert_eq!(metrics.average_latency_ms("weather.get_nowcast"), 15.0);
    }

    #[test]
    fn hit_ratio_handles_empty_denominator() {
        let metrics = MetricsRegistry::new();
        assert_eq!(metrics.cache_hit_ratio(), 0.0);

        metrics.record_cache_status(CacheStatus::Hit);
        metrics.record_cache_status(CacheStatus::Hit);
        metrics.record_cache_status(CacheStatus::Miss);
        metrics.record_cache_status(CacheStatus::Bypass); // not in the ratio
        assert!((metrics.cache_hit_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn render_format() {
        let metrics = MetricsRegistry::new();
        metrics.record_tool_call("weather.get_forecast", Outcome::Success);
        metrics.record_latency("weather.get_forecast", 33);
        metrics.record_cache_status(CacheStatus::Hit);

        let text = metrics.render();
        assert!(text.contains("# HELP nordvaer_tool_calls_total"));
        assert!(text.contains("# TYPE nordvaer_tool_calls_total counter"));
        assert!(text.contains(
            "nordvaer_tool_calls_total{tool=\"weather.get_forecast\",outcome=\"success\"} 1"
        ));
        assert!(text.contains("nordvaer_tool_latency_avg_ms{tool=\"weather.get_forecast\"} 33.00"));
        assert!(text.contains("nordvaer_cache_hit_ratio 1.0000"));
    }

    #[test]
    fn concurrent_updates_do_not_lose_counts() {
        let metrics = MetricsRegistry::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = metrics.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        m.record_tool_call("weather.get_forecast", Outcome::Success);
                        m.record_cache_status(CacheStatus::Miss);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(
            metrics.tool_call_count("weather.get_forecast", Outcome::Success),
            800
        );
    }
}
