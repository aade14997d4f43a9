//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the taskrelay server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Ticket submissions over the API
//! - Dispatcher, pool and ticket status (collected dynamically)
//!
//! Task-level counters live in `taskrelay_core::metrics` and are registered here.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};

use taskrelay_core::TicketFilter;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "taskrelay_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("taskrelay_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "taskrelay_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Ticket Metrics
// =============================================================================

/// Tickets submitted through the API.
pub static TICKETS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "taskrelay_tickets_created_total",
        "Total tickets created since startup",
    )
    .unwrap()
});

/// Stored tickets by status (collected dynamically).
pub static TICKETS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("taskrelay_tickets_by_status", "Stored ticket count by status"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Dispatcher Metrics (collected dynamically)
// =============================================================================

/// Dispatcher running state (1 = running, 0 = stopped).
pub static DISPATCHER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "taskrelay_dispatcher_running",
        "Whether the dispatcher is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Tasks by dispatcher state.
pub static TASKS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("taskrelay_tasks_by_state", "Current task count by state"),
        &["state"],
    )
    .unwrap()
});

/// Active agent invocations per pool.
pub static POOL_ACTIVE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("taskrelay_pool_active", "Active agent invocations per pool"),
        &["pool"],
    )
    .unwrap()
});

/// Maximum concurrent agent invocations per pool.
pub static POOL_LIMIT: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("taskrelay_pool_limit", "Concurrency limit per pool"),
        &["pool"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Tickets
    registry
        .register(Box::new(TICKETS_CREATED_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(TICKETS_BY_STATUS.clone()))
        .unwrap();

    // Dispatcher
    registry
        .register(Box::new(DISPATCHER_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(TASKS_BY_STATE.clone()))
        .unwrap();
    registry.register(Box::new(POOL_ACTIVE.clone())).unwrap();
    registry.register(Box::new(POOL_LIMIT.clone())).unwrap();

    // Core metrics (task lifecycle, agent timeouts and retries)
    for metric in taskrelay_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// This is called before encoding metrics to update gauges with current values
/// from the dispatcher and the ticket store.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.dispatcher().status().await;

    DISPATCHER_RUNNING.set(if status.running { 1 } else { 0 });
    for (name, count) in [
        ("queued", status.queue_size),
        ("blocked", status.blocked),
        ("active", status.active),
        ("completed", status.completed),
        ("failed", status.failed),
    ] {
        TASKS_BY_STATE.with_label_values(&[name]).set(count as i64);
    }

    for pool in &status.pools {
        POOL_ACTIVE
            .with_label_values(&[&pool.name])
            .set(pool.active_jobs as i64);
        POOL_LIMIT
            .with_label_values(&[&pool.name])
            .set(pool.max_concurrent as i64);
    }

    let ticket_store = state.ticket_store();
    for ticket_status in ["active", "in_progress"] {
        let filter = TicketFilter::new().with_status(ticket_status);
        if let Ok(count) = ticket_store.count(&filter) {
            TICKETS_BY_STATUS
                .with_label_values(&[ticket_status])
                .set(count);
        }
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
///
/// Ticket ids are free-form, so any segment following `tickets` is an id.
/// Elsewhere, numeric and UUID-shaped segments are replaced.
pub fn normalize_path(path: &str) -> String {
    let mut previous = "";
    let segments: Vec<&str> = path
        .split('/')
        .map(|segment| {
            let normalized = if previous == "tickets" && !segment.is_empty() {
                "{id}"
            } else if is_numeric(segment) || is_uuid(segment) {
                "{id}"
            } else {
                segment
            };
            previous = segment;
            normalized
        })
        .collect();

    segments.join("/")
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn is_uuid(segment: &str) -> bool {
    segment.len() == 36
        && segment.bytes().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_ticket_id() {
        assert_eq!(
            normalize_path("/api/v1/tickets/T-1"),
            "/api/v1/tickets/{id}"
        );
        assert_eq!(
            normalize_path("/api/v1/tickets/LESSON-42/tasks"),
            "/api/v1/tickets/{id}/tasks"
        );
    }

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/progress/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/progress/{id}");
    }

    #[test]
    fn test_normalize_path_numeric_middle() {
        let path = "/api/v1/pools/12345/jobs/2";
        assert_eq!(normalize_path(path), "/api/v1/pools/{id}/jobs/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        assert_eq!(normalize_path("/api/v1/tickets"), "/api/v1/tickets");
        assert_eq!(normalize_path("/api/v1/tickets/"), "/api/v1/tickets/");
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        // Access metrics to ensure they're initialized
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("taskrelay_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        // Touch all metrics to ensure they appear in output
        // (Prometheus only outputs metrics that have been accessed)
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        TICKETS_CREATED_TOTAL.inc();
        TICKETS_BY_STATUS.with_label_values(&["active"]).set(0);
        DISPATCHER_RUNNING.set(0);
        TASKS_BY_STATE.with_label_values(&["queued"]).set(0);
        POOL_ACTIVE.with_label_values(&["qa"]).set(0);
        taskrelay_core::metrics::TASKS_QUEUED
            .with_label_values(&["qa"])
            .inc();

        let output = encode_metrics();

        assert!(output.contains("taskrelay_http_request_duration_seconds"));
        assert!(output.contains("taskrelay_http_requests_in_flight"));
        assert!(output.contains("taskrelay_tickets_created_total"));
        assert!(output.contains("taskrelay_tickets_by_status"));
        assert!(output.contains("taskrelay_dispatcher_running"));
        assert!(output.contains("taskrelay_tasks_by_state"));
        assert!(output.contains("taskrelay_pool_active"));
        assert!(output.contains("taskrelay_tasks_queued_total"));
    }
}
