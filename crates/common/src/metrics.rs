//! Process-wide counters for the dispute backend.
//!
//! Counters are plain atomics; `/metrics` serves them as JSON and
//! `/metrics/prometheus` in the text exposition format.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get the global metrics instance.
pub fn get_metrics() -> &'static Arc<Metrics> {
    METRICS.get_or_init(|| Arc::new(Metrics::new()))
}

/// Application metrics collector.
#[derive(Debug)]
pub struct Metrics {
    // HTTP
    /// Total HTTP requests received.
    pub http_requests_total: AtomicU64,
    /// HTTP requests currently in flight.
    pub http_requests_active: AtomicU64,
    /// Responses with a 2xx status.
    pub http_requests_2xx: AtomicU64,
    /// Responses with a 4xx status.
    pub http_requests_4xx: AtomicU64,
    /// Responses with a 5xx status.
    pub http_requests_5xx: AtomicU64,
    /// Sum of request latencies in microseconds.
    pub http_request_latency_us_total: AtomicU64,

    // Disputes
    /// Disputes opened.
    pub disputes_created: AtomicU64,
    /// State changes committed (any action, including expiry).
    pub dispute_transitions: AtomicU64,
    /// Disputes closed by the SLA sweep.
    pub disputes_expired: AtomicU64,
    /// Writes rejected because the row changed underneath.
    pub dispute_conflicts: AtomicU64,
    /// Thread messages appended.
    pub dispute_messages: AtomicU64,
    /// Attachments stored.
    pub attachments_uploaded: AtomicU64,

    // Side effects
    /// Notifications persisted.
    pub notifications_sent: AtomicU64,
    /// Notification deliveries that failed and were skipped.
    pub notifications_failed: AtomicU64,
    /// Real-time events published.
    pub events_published: AtomicU64,

    // Real-time
    /// Open WebSocket connections.
    pub websocket_connections_active: AtomicU64,
    /// Frames pushed to WebSocket clients.
    pub websocket_messages_sent: AtomicU64,

    // Scheduler
    /// Completed SLA sweep runs.
    pub expiry_sweeps: AtomicU64,
    /// SLA sweep runs that returned an error.
    pub expiry_sweep_failures: AtomicU64,
}

impl Metrics {
    /// Create a new metrics instance with all counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            http_requests_total: AtomicU64::new(0),
            http_requests_active: AtomicU64::new(0),
            http_requests_2xx: AtomicU64::new(0),
            http_requests_4xx: AtomicU64::new(0),
            http_requests_5xx: AtomicU64::new(0),
            http_request_latency_us_total: AtomicU64::new(0),

            disputes_created: AtomicU64::new(0),
            dispute_transitions: AtomicU64::new(0),
            disputes_expired: AtomicU64::new(0),
            dispute_conflicts: AtomicU64::new(0),
            dispute_messages: AtomicU64::new(0),
            attachments_uploaded: AtomicU64::new(0),

            notifications_sent: AtomicU64::new(0),
            notifications_failed: AtomicU64::new(0),
            events_published: AtomicU64::new(0),

            websocket_connections_active: AtomicU64::new(0),
            websocket_messages_sent: AtomicU64::new(0),

            expiry_sweeps: AtomicU64::new(0),
            expiry_sweep_failures: AtomicU64::new(0),
        }
    }

    /// Record a finished HTTP request.
    pub fn record_http_request(&self, status_code: u16, latency: Duration) {
        self.http_requests_total.fetch_add(1, Ordering::Relaxed);

        match status_code {
            200..=299 => self.http_requests_2xx.fetch_add(1, Ordering::Relaxed),
            400..=499 => self.http_requests_4xx.fetch_add(1, Ordering::Relaxed),
            500..=599 => self.http_requests_5xx.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };

        self.http_request_latency_us_total
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Start tracking an active request.
    pub fn start_request(&self) {
        self.http_requests_active.fetch_add(1, Ordering::Relaxed);
    }

    /// End tracking an active request.
    pub fn end_request(&self) {
        self.http_requests_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a committed dispute state change.
    pub fn record_transition(&self) {
        self.dispute_transitions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one notification delivery.
    pub fn record_notification(&self, success: bool) {
        if success {
            self.notifications_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.notifications_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one SLA sweep run and how many disputes it closed.
    pub fn record_sweep(&self, expired: u64, success: bool) {
        if success {
            self.expiry_sweeps.fetch_add(1, Ordering::Relaxed);
        } else {
            self.expiry_sweep_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.disputes_expired.fetch_add(expired, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        MetricsSnapshot {
            http_requests_total: load(&self.http_requests_total),
            http_requests_active: load(&self.http_requests_active),
            http_requests_2xx: load(&self.http_requests_2xx),
            http_requests_4xx: load(&self.http_requests_4xx),
            http_requests_5xx: load(&self.http_requests_5xx),
            http_request_latency_avg_us: self.average_latency_us(),

            disputes_created: load(&self.disputes_created),
            dispute_transitions: load(&self.dispute_transitions),
            disputes_expired: load(&self.disputes_expired),
            dispute_conflicts: load(&self.dispute_conflicts),
            dispute_messages: load(&self.dispute_messages),
            attachments_uploaded: load(&self.attachments_uploaded),

            notifications_sent: load(&self.notifications_sent),
            notifications_failed: load(&self.notifications_failed),
            events_published: load(&self.events_published),

            websocket_connections_active: load(&self.websocket_connections_active),
            websocket_messages_sent: load(&self.websocket_messages_sent),

            expiry_sweeps: load(&self.expiry_sweeps),
            expiry_sweep_failures: load(&self.expiry_sweep_failures),
        }
    }

    fn average_latency_us(&self) -> u64 {
        let total = self.http_request_latency_us_total.load(Ordering::Relaxed);
        let count = self.http_requests_total.load(Ordering::Relaxed);
        if count > 0 { total / count } else { 0 }
    }

    /// Export metrics in Prometheus format.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut output = String::new();

        let mut metric = |name: &str, kind: &str, help: &str, value: u64| {
            output.push_str(&format!("# HELP mercado_{name} {help}\n"));
            output.push_str(&format!("# TYPE mercado_{name} {kind}\n"));
            output.push_str(&format!("mercado_{name} {value}\n"));
        };

        metric("http_requests_total", "counter", "Total HTTP requests", s.http_requests_total);
        metric("http_requests_active", "gauge", "Active HTTP requests", s.http_requests_active);
        metric(
            "http_request_latency_avg_us",
            "gauge",
            "Average request latency",
            s.http_request_latency_avg_us,
        );
        metric("disputes_created_total", "counter", "Disputes opened", s.disputes_created);
        metric(
            "dispute_transitions_total",
            "counter",
            "Committed dispute state changes",
            s.dispute_transitions,
        );
        metric(
            "disputes_expired_total",
            "counter",
            "Disputes closed by the SLA sweep",
            s.disputes_expired,
        );
        metric(
            "dispute_conflicts_total",
            "counter",
            "Dispute writes lost to a concurrent update",
            s.dispute_conflicts,
        );
        metric("dispute_messages_total", "counter", "Thread messages appended", s.dispute_messages);
        metric(
            "attachments_uploaded_total",
            "counter",
            "Attachments stored",
            s.attachments_uploaded,
        );
        metric(
            "notifications_sent_total",
            "counter",
            "Notifications persisted",
            s.notifications_sent,
        );
        metric(
            "notifications_failed_total",
            "counter",
            "Notification deliveries skipped after an error",
            s.notifications_failed,
        );
        metric("events_published_total", "counter", "Real-time events published", s.events_published);
        metric(
            "websocket_connections",
            "gauge",
            "Active WebSocket connections",
            s.websocket_connections_active,
        );
        metric(
            "websocket_messages_sent_total",
            "counter",
            "Frames pushed to WebSocket clients",
            s.websocket_messages_sent,
        );
        metric("expiry_sweeps_total", "counter", "Completed SLA sweeps", s.expiry_sweeps);
        metric(
            "expiry_sweep_failures_total",
            "counter",
            "Failed SLA sweeps",
            s.expiry_sweep_failures,
        );

        output.push_str("# HELP mercado_http_requests_by_status HTTP requests by status\n");
        output.push_str("# TYPE mercado_http_requests_by_status counter\n");
        for (class, value) in [
            ("2xx", s.http_requests_2xx),
            ("4xx", s.http_requests_4xx),
            ("5xx", s.http_requests_5xx),
        ] {
            output.push_str(&format!(
                "mercado_http_requests_by_status{{status=\"{class}\"}} {value}\n"
            ));
        }

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of all metrics at a point in time.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct MetricsSnapshot {
    pub http_requests_total: u64,
    pub http_requests_active: u64,
    pub http_requests_2xx: u64,
    pub http_requests_4xx: u64,
    pub http_requests_5xx: u64,
    pub http_request_latency_avg_us: u64,

    pub disputes_created: u64,
    pub dispute_transitions: u64,
    pub disputes_expired: u64,
    pub dispute_conflicts: u64,
    pub dispute_messages: u64,
    pub attachments_uploaded: u64,

    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub events_published: u64,

    pub websocket_connections_active: u64,
    pub websocket_messages_sent: u64,

    pub expiry_sweeps: u64,
    pub expiry_sweep_failures: u64,
}

/// Timer for measuring operation duration.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed duration since the timer started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
