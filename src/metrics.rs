//! Prometheus-format lifecycle metrics
//!
//! Lock-free counters, a state gauge and a latency histogram, rendered as
//! Prometheus text for the optional `/metrics` endpoint.

use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Anything that can render itself in the Prometheus exposition format
pub trait Render {
    fn render(&self, out: &mut String);
}

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

/// Monotonically increasing counter
pub struct Counter {
    name: &'static str,
    help: &'static str,
    value: AtomicU64,
}

impl Counter {
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Render for Counter {
    fn render(&self, out: &mut String) {
        header(out, self.name, self.help, "counter");
        let _ = writeln!(out, "{} {}", self.name, self.get());
    }
}

/// Point-in-time value
pub struct Gauge {
    name: &'static str,
    help: &'static str,
    value: AtomicI64,
}

impl Gauge {
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            value: AtomicI64::new(0),
        }
    }

    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Render for Gauge {
    fn render(&self, out: &mut String) {
        header(out, self.name, self.help, "gauge");
        let _ = writeln!(out, "{} {}", self.name, self.get());
    }
}

/// Cumulative histogram over fixed upper bounds (seconds)
pub struct Histogram {
    name: &'static str,
    help: &'static str,
    bounds: &'static [f64],
    buckets: Vec<AtomicU64>,
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(name: &'static str, help: &'static str, bounds: &'static [f64]) -> Self {
        Self {
            name,
            help,
            bounds,
            buckets: bounds.iter().map(|_| AtomicU64::new(0)).collect(),
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, seconds: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add((seconds * 1_000_000.0) as u64, Ordering::Relaxed);
        for (bound, bucket) in self.bounds.iter().zip(&self.buckets) {
            if seconds <= *bound {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Render for Histogram {
    fn render(&self, out: &mut String) {
        header(out, self.name, self.help, "histogram");
        for (bound, bucket) in self.bounds.iter().zip(&self.buckets) {
            let _ = writeln!(
                out,
                "{}_bucket{{le=\"{}\"}} {}",
                self.name,
                bound,
                bucket.load(Ordering::Relaxed)
            );
        }
        let _ = writeln!(out, "{}_bucket{{le=\"+Inf\"}} {}", self.name, self.count());
        let sum = self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let _ = writeln!(out, "{}_sum {}", self.name, sum);
        let _ = writeln!(out, "{}_count {}", self.name, self.count());
    }
}

/// Process-wide lifecycle metrics
pub mod standard {
    use super::*;
    use std::sync::LazyLock;

    pub static EVENTS_RECEIVED: Counter = Counter::new(
        "spotwarden_events_received_total",
        "Lifecycle events consumed by the coordinator",
    );

    pub static DRAIN_ATTEMPTS: Counter = Counter::new(
        "spotwarden_drain_attempts_total",
        "SetDesiredCapacity calls issued",
    );

    pub static DRAIN_FAILURES: Counter = Counter::new(
        "spotwarden_drain_failures_total",
        "SetDesiredCapacity calls that failed",
    );

    pub static SNAPSHOTS_WRITTEN: Counter = Counter::new(
        "spotwarden_snapshots_written_total",
        "Snapshots stored successfully",
    );

    pub static SNAPSHOT_FAILURES: Counter = Counter::new(
        "spotwarden_snapshot_failures_total",
        "Snapshots that failed to pack or store",
    );

    pub static SNAPSHOT_BYTES: Counter = Counter::new(
        "spotwarden_snapshot_bytes_total",
        "Bytes uploaded as snapshots",
    );

    pub static COORDINATOR_STATE: Gauge = Gauge::new(
        "spotwarden_coordinator_state",
        "Coordinator state (0 running, 1 draining, 2 terminating, 3 finalizing, 4 terminated)",
    );

    pub static SNAPSHOT_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
        Histogram::new(
            "spotwarden_snapshot_duration_seconds",
            "Snapshot pack and upload latency",
            &[0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0],
        )
    });
}

/// Render every standard metric
pub fn gather_lifecycle_metrics() -> String {
    let mut out = String::new();
    let metrics: [&dyn Render; 8] = [
        &standard::EVENTS_RECEIVED,
        &standard::DRAIN_ATTEMPTS,
        &standard::DRAIN_FAILURES,
        &standard::SNAPSHOTS_WRITTEN,
        &standard::SNAPSHOT_FAILURES,
        &standard::SNAPSHOT_BYTES,
        &standard::COORDINATOR_STATE,
        &*standard::SNAPSHOT_DURATION,
    ];
    for metric in metrics {
        metric.render(&mut out);
    }
    out
}
