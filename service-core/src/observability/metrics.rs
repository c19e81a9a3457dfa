//! Prometheus exposition shared by the services.
//!
//! Two sources end up on `/metrics`: the `metrics` facade (fed by the HTTP
//! middleware and rendered through `metrics-exporter-prometheus`) and the
//! default `prometheus` registry where each service registers its own
//! domain counters.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::TextEncoder;
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the global `metrics` recorder once per process.
pub fn install_recorder() {
    METRICS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    });
}

/// Render every metric in Prometheus text format.
pub fn render_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .and_then(|handle| handle.as_ref())
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&prometheus::gather()) {
        Ok(custom) => output.push_str(&custom),
        Err(e) => tracing::warn!(error = %e, "Failed to encode prometheus registry"),
    }

    output
}
