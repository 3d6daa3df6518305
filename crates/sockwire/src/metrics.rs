//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render the `/metrics` endpoint. Fails if a
/// global recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

// Metric name constants to avoid typos across modules.

/// Inbound text frames processed (counter).
pub const FRAMES_IN_TOTAL: &str = "sockwire_frames_in_total";
/// Outbound frames queued (counter).
pub const FRAMES_OUT_TOTAL: &str = "sockwire_frames_out_total";
/// Outbound frames rejected because a queue was full (counter).
pub const OVERFLOW_TOTAL: &str = "sockwire_overflow_total";
/// Ack requests that timed out (counter).
pub const ACK_TIMEOUTS_TOTAL: &str = "sockwire_ack_timeouts_total";
/// Dispatches rejected because an argument could not be coerced (counter).
pub const COERCION_FAILURES_TOTAL: &str = "sockwire_coercion_failures_total";
/// Live channels (gauge).
pub const CHANNELS_ACTIVE: &str = "sockwire_channels_active";
/// Time from ack request to response (histogram).
pub const ACK_LATENCY_SECONDS: &str = "sockwire_ack_latency_seconds";
