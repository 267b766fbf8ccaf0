//! Metrics collection and reporting

use parking_lot::RwLock;
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Metric names recorded by the pipeline
pub mod names {
    pub const DECISIONS_ALLOW: &str = "riskgate_decisions_allow_total";
    pub const DECISIONS_REVIEW: &str = "riskgate_decisions_review_total";
    pub const DECISIONS_BLOCK: &str = "riskgate_decisions_block_total";
    pub const ENGINE_FAILURES: &str = "riskgate_engine_failures_total";
    pub const DETECTOR_FAILURES: &str = "riskgate_detector_failures_total";
    pub const DETECTOR_ABSTENTIONS: &str = "riskgate_detector_abstentions_total";
    pub const RULE_OVERRIDES: &str = "riskgate_rule_overrides_total";
    pub const RULE_ERRORS: &str = "riskgate_rule_errors_total";
    pub const PERSISTENCE_FAILURES: &str = "riskgate_persistence_failures_total";
    pub const WEBHOOK_RECEIVED: &str = "riskgate_webhook_received_total";
    pub const WEBHOOK_DUPLICATES: &str = "riskgate_webhook_duplicates_total";
    pub const JOB_FAILURES: &str = "riskgate_job_failures_total";
    pub const DETECTION_SECONDS: &str = "riskgate_detection_seconds";
    pub const RULE_EVALUATION_SECONDS: &str = "riskgate_rule_evaluation_seconds";
}

/// Counter metric
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/// Samples kept for quantiles when no capacity is given
pub const DEFAULT_HISTOGRAM_WINDOW: usize = 1024;

#[derive(Debug, Default)]
struct HistogramState {
    /// Most recent observations, oldest first
    window: VecDeque<f64>,
    count: u64,
    sum: f64,
}

/// Histogram metric for tracking distributions.
///
/// Count and sum cover every observation. Quantiles are computed over a
/// bounded window of the most recent observations.
#[derive(Debug)]
pub struct Histogram {
    state: RwLock<HistogramState>,
    capacity: usize,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTOGRAM_WINDOW)
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: RwLock::new(HistogramState {
                window: VecDeque::with_capacity(capacity),
                ..HistogramState::default()
            }),
            capacity,
        }
    }

    pub fn observe(&self, value: f64) {
        let mut state = self.state.write();
        if state.window.len() == self.capacity {
            state.window.pop_front();
        }
        state.window.push_back(value);
        state.count += 1;
        state.sum += value;
    }

    /// Observe a duration in seconds
    pub fn observe_duration(&self, duration: Duration) {
        self.observe(duration.as_secs_f64());
    }

    pub fn count(&self) -> u64 {
        self.state.read().count
    }

    pub fn sum(&self) -> f64 {
        self.state.read().sum
    }

    pub fn avg(&self) -> f64 {
        let state = self.state.read();
        if state.count == 0 {
            0.0
        } else {
            state.sum / state.count as f64
        }
    }

    /// Samples currently held for quantiles
    pub fn window_len(&self) -> usize {
        self.state.read().window.len()
    }

    /// Get percentile (0-100) of the recent window
    pub fn percentile(&self, p: f64) -> f64 {
        let mut values: Vec<f64> = self.state.read().window.iter().copied().collect();
        if values.is_empty() {
            return 0.0;
        }

        values.sort_by(|a, b| a.total_cmp(b));
        let index = ((p / 100.0) * (values.len() - 1) as f64).round() as usize;
        values[index.min(values.len() - 1)]
    }

    pub fn reset(&self) {
        *self.state.write() = HistogramState::default();
    }
}

/// Metrics sink used by the engine, orchestrator and webhook gate
pub trait Metrics: Send + Sync {
    fn counter(&self, name: &str) -> Arc<Counter>;

    fn histogram(&self, name: &str) -> Arc<Histogram>;

    fn record_execution_time(&self, name: &str, duration: Duration) {
        self.histogram(name).observe_duration(duration);
    }

    fn increment(&self, name: &str) {
        self.counter(name).inc();
    }
}

/// Metrics collector
#[derive(Default)]
pub struct MetricsCollector {
    counters: RwLock<BTreeMap<String, Arc<Counter>>>,
    histograms: RwLock<BTreeMap<String, Arc<Histogram>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter_names(&self) -> Vec<String> {
        self.counters.read().keys().cloned().collect()
    }

    pub fn histogram_names(&self) -> Vec<String> {
        self.histograms.read().keys().cloned().collect()
    }

    pub fn reset_all(&self) {
        for counter in self.counters.read().values() {
            counter.reset();
        }
        for histogram in self.histograms.read().values() {
            histogram.reset();
        }
    }

    /// Prometheus text exposition. Histograms are exported as summaries
    /// with p50/p95/p99 quantiles taken over the recent window.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();

        for (name, counter) in self.counters.read().iter() {
            let _ = writeln!(out, "# TYPE {} counter", name);
            let _ = writeln!(out, "{} {}", name, counter.get());
        }

        for (name, histogram) in self.histograms.read().iter() {
            let _ = writeln!(out, "# TYPE {} summary", name);
            for q in [50.0, 95.0, 99.0] {
                let _ = writeln!(
                    out,
                    "{}{{quantile=\"{}\"}} {}",
                    name,
                    q / 100.0,
                    histogram.percentile(q)
                );
            }
            let _ = writeln!(out, "{}_sum {}", name, histogram.sum());
            let _ = writeln!(out, "{}_count {}", name, histogram.count());
        }

        out
    }
}

impl Metrics for MetricsCollector {
    fn counter(&self, name: &str) -> Arc<Counter> {
        if let Some(counter) = self.counters.read().get(name) {
            return counter.clone();
        }
        self.counters
            .write()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    fn histogram(&self, name: &str) -> Arc<Histogram> {
        if let Some(histogram) = self.histograms.read().get(name) {
            return histogram.clone();
        }
        self.histograms
            .write()
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}
