//! Observability
//!
//! In-process counters and histograms rendered in the Prometheus text
//! format. Structured logging goes through `tracing` directly.

pub mod metrics;

pub use metrics::{names, Counter, Histogram, Metrics, MetricsCollector};
