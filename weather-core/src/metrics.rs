//! Hit/miss counters and per-operation latency for one cache instance.

use parking_lot::Mutex;
use serde::Serialize;
use std::{collections::BTreeMap, time::Duration};

/// Point-in-time view of a cache's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatistics {
    pub cache_type: String,
    pub hits: u64,
    pub misses: u64,
    pub total: u64,
    pub hit_ratio: f64,
}

/// Aggregated latency of one named cache operation (`get`, `set`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
}

impl LatencySummary {
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total.as_nanos() / u128::from(self.count);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    fn observe(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.max = self.max.max(elapsed);
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    latencies: BTreeMap<String, LatencySummary>,
}

/// Counters are updated under one lock so a snapshot never sees a hit
/// without the matching total.
#[derive(Debug)]
pub struct MetricsRecorder {
    cache_type: String,
    counters: Mutex<Counters>,
}

impl MetricsRecorder {
    pub fn new(cache_type: impl Into<String>) -> Self {
        Self { cache_type: cache_type.into(), counters: Mutex::new(Counters::default()) }
    }

    pub fn cache_type(&self) -> &str {
        &self.cache_type
    }

    pub fn record_hit(&self) {
        self.counters.lock().hits += 1;
    }

    pub fn record_miss(&self) {
        self.counters.lock().misses += 1;
    }

    pub fn record_latency(&self, operation: &str, elapsed: Duration) {
        let mut counters = self.counters.lock();
        match counters.latencies.get_mut(operation) {
            Some(summary) => summary.observe(elapsed),
            None => {
                let mut summary = LatencySummary::default();
                summary.observe(elapsed);
                counters.latencies.insert(operation.to_string(), summary);
            }
        }
    }

    pub fn snapshot(&self) -> CacheStatistics {
        let counters = self.counters.lock();
        let total = counters.hits + counters.misses;
        let hit_ratio = if total > 0 { counters.hits as f64 / total as f64 } else { 0.0 };

        CacheStatistics {
            cache_type: self.cache_type.clone(),
            hits: counters.hits,
            misses: counters.misses,
            total,
            hit_ratio,
        }
    }

    pub fn latency(&self, operation: &str) -> Option<LatencySummary> {
        self.counters.lock().latencies.get(operation).copied()
    }

    pub fn latencies(&self) -> BTreeMap<String, LatencySummary> {
        self.counters.lock().latencies.clone()
    }
}
