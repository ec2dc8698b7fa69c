//! Prometheus metrics for scan jobs and decisions.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

use dupe_manager_core::{ActionResult, JobStatus};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder.
///
/// Returns `false` if a recorder was already installed. Safe to call more
/// than once (tests do).
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }
    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();
    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!("jobs_started_total", "Scan jobs created");
    describe_counter!(
        "jobs_finished_total",
        "Scan jobs that reached a terminal status, by status"
    );
    describe_histogram!("job_duration_seconds", "Wall time of a scan job in seconds");
    describe_counter!("decisions_total", "Applied user decisions, by result");
}

/// Render current metrics in Prometheus text format, or `None` before init.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

pub fn record_job_started() {
    counter!("jobs_started_total").increment(1);
}

pub fn record_job_finished(status: JobStatus, duration: Duration) {
    counter!("jobs_finished_total", "status" => status.as_str()).increment(1);
    histogram!("job_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_decision(result: ActionResult) {
    counter!("decisions_total", "result" => result.as_str()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent_and_renders() {
        init_metrics();
        assert!(!init_metrics());

        record_job_started();
        record_job_finished(JobStatus::Completed, Duration::from_millis(5));
        let rendered = render_metrics().expect("metrics initialized");
        assert!(rendered.contains("jobs_started_total"));
        assert!(rendered.contains("jobs_finished_total"));
    }
}
