use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::types::RecommendationSource;

/// Global metrics collector for the application.
///
/// Tracks classification throughput, cache performance, generation backend
/// outcomes and remedy provenance. Thread-safe and cheap to clone.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Classification
    classifications_total: AtomicUsize,
    decode_failures: AtomicUsize,
    inference_latency_ms: RwLock<Vec<u64>>,

    // Remedy cache
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    cache_size: AtomicUsize,

    // Generation backend
    generation_success: AtomicUsize,
    generation_failed: AtomicUsize,
    generation_latency_ms: RwLock<Vec<u64>>,

    // Remedy provenance
    resolved_from_cache: AtomicUsize,
    resolved_generated: AtomicUsize,
    resolved_fallback: AtomicUsize,

    // Per-endpoint request counters
    endpoint_counters: DashMap<String, AtomicUsize>,

    // Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                classifications_total: AtomicUsize::new(0),
                decode_failures: AtomicUsize::new(0),
                inference_latency_ms: RwLock::new(Vec::new()),
                cache_hits: AtomicUsize::new(0),
                cache_misses: AtomicUsize::new(0),
                cache_size: AtomicUsize::new(0),
                generation_success: AtomicUsize::new(0),
                generation_failed: AtomicUsize::new(0),
                generation_latency_ms: RwLock::new(Vec::new()),
                resolved_from_cache: AtomicUsize::new(0),
                resolved_generated: AtomicUsize::new(0),
                resolved_fallback: AtomicUsize::new(0),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_classification(&self, duration: Duration) {
        self.inner.classifications_total.fetch_add(1, Ordering::Relaxed);
        self.inner
            .inference_latency_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_decode_failure(&self) {
        self.inner.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_cache_size(&self, size: usize) {
        self.inner.cache_size.store(size, Ordering::Relaxed);
    }

    pub fn record_generation(&self, success: bool, duration: Duration) {
        if success {
            self.inner.generation_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.generation_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .generation_latency_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_resolution(&self, source: RecommendationSource) {
        let counter = match source {
            RecommendationSource::Cache => &self.inner.resolved_from_cache,
            RecommendationSource::Generated => &self.inner.resolved_generated,
            RecommendationSource::Fallback => &self.inner.resolved_fallback,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner
            .endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inference_latency = self.inner.inference_latency_ms.read();
        let inference_avg = avg(&inference_latency);
        let inference_p95 = percentile(&inference_latency, 0.95);
        drop(inference_latency);

        let generation_latency = self.inner.generation_latency_ms.read();
        let generation_avg = avg(&generation_latency);
        let generation_p95 = percentile(&generation_latency, 0.95);
        drop(generation_latency);

        let cache_hits = self.inner.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.inner.cache_misses.load(Ordering::Relaxed);
        let cache_total = cache_hits + cache_misses;
        let cache_hit_rate = if cache_total > 0 {
            cache_hits as f64 / cache_total as f64
        } else {
            0.0
        };

        let endpoints = self
            .inner
            .endpoint_counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            classifications_total: self.inner.classifications_total.load(Ordering::Relaxed),
            decode_failures: self.inner.decode_failures.load(Ordering::Relaxed),
            inference_latency_avg_ms: inference_avg,
            inference_latency_p95_ms: inference_p95,
            cache_hits,
            cache_misses,
            cache_hit_rate,
            cache_size: self.inner.cache_size.load(Ordering::Relaxed),
            generation_success: self.inner.generation_success.load(Ordering::Relaxed),
            generation_failed: self.inner.generation_failed.load(Ordering::Relaxed),
            generation_latency_avg_ms: generation_avg,
            generation_latency_p95_ms: generation_p95,
            resolved_from_cache: self.inner.resolved_from_cache.load(Ordering::Relaxed),
            resolved_generated: self.inner.resolved_generated.load(Ordering::Relaxed),
            resolved_fallback: self.inner.resolved_fallback.load(Ordering::Relaxed),
            endpoints,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP classifications_total Total number of classification calls
# TYPE classifications_total counter
classifications_total {}

# HELP decode_failures_total Uploads that could not be decoded
# TYPE decode_failures_total counter
decode_failures_total {}

# HELP inference_latency_avg_ms Average inference latency in milliseconds
# TYPE inference_latency_avg_ms gauge
inference_latency_avg_ms {}

# HELP remedy_cache_hit_rate Remedy cache hit rate (0.0 to 1.0)
# TYPE remedy_cache_hit_rate gauge
remedy_cache_hit_rate {}

# HELP remedy_cache_size Current remedy cache size
# TYPE remedy_cache_size gauge
remedy_cache_size {}

# HELP generation_calls_total Generation backend calls by outcome
# TYPE generation_calls_total counter
generation_calls_total{{outcome="success"}} {}
generation_calls_total{{outcome="failed"}} {}

# HELP generation_latency_avg_ms Average generation latency in milliseconds
# TYPE generation_latency_avg_ms gauge
generation_latency_avg_ms {}

# HELP resolutions_total Remedy resolutions by provenance
# TYPE resolutions_total counter
resolutions_total{{source="cache"}} {}
resolutions_total{{source="generated"}} {}
resolutions_total{{source="fallback"}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {}
"#,
            snapshot.classifications_total,
            snapshot.decode_failures,
            snapshot.inference_latency_avg_ms,
            snapshot.cache_hit_rate,
            snapshot.cache_size,
            snapshot.generation_success,
            snapshot.generation_failed,
            snapshot.generation_latency_avg_ms,
            snapshot.resolved_from_cache,
            snapshot.resolved_generated,
            snapshot.resolved_fallback,
            snapshot.uptime_seconds,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time metrics view, serialized by the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub classifications_total: usize,
    pub decode_failures: usize,
    pub inference_latency_avg_ms: u64,
    pub inference_latency_p95_ms: u64,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_hit_rate: f64,
    pub cache_size: usize,
    pub generation_success: usize,
    pub generation_failed: usize,
    pub generation_latency_avg_ms: u64,
    pub generation_latency_p95_ms: u64,
    pub resolved_from_cache: usize,
    pub resolved_generated: usize,
    pub resolved_fallback: usize,
    pub endpoints: std::collections::HashMap<String, usize>,
    pub uptime_seconds: u64,
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        0
    } else {
        values.iter().sum::<u64>() / values.len() as u64
    }
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let rank = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_counters_track_sources() {
        let metrics = Metrics::new();
        metrics.record_resolution(RecommendationSource::Cache);
        metrics.record_resolution(RecommendationSource::Generated);
        metrics.record_resolution(RecommendationSource::Fallback);
        metrics.record_resolution(RecommendationSource::Fallback);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.resolved_from_cache, 1);
        assert_eq!(snapshot.resolved_generated, 1);
        assert_eq!(snapshot.resolved_fallback, 2);
    }

    #[test]
    fn cache_hit_rate_is_computed() {
        let metrics = Metrics::new();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        let snapshot = metrics.snapshot();
        assert!((snapshot.cache_hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn percentile_of_empty_is_zero() {
        assert_eq!(percentile(&[], 0.95), 0);
        assert_eq!(avg(&[]), 0);
    }

    #[test]
    fn prometheus_output_contains_core_series() {
        let metrics = Metrics::new();
        metrics.record_classification(Duration::from_millis(12));
        let text = metrics.to_prometheus();
        assert!(text.contains("classifications_total 1"));
        assert!(text.contains("resolutions_total{source=\"fallback\"} 0"));
    }
}
