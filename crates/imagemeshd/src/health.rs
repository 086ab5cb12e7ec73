//! Structured health reporting for coordinator lifecycle events.

use imagemesh_config::Config;

use crate::bootstrap::BootstrapError;
use crate::dispatch::DispatchError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked when a link to a worker identity opens.
    fn worker_connected(&self, rank: usize, endpoint: &str);

    /// Invoked when a worker identity cannot be reached or fails a unit.
    fn worker_failed(&self, rank: usize, error: &DispatchError);
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting coordinator bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            listen = %config.listen(),
            workers = config.workers().len(),
            unit_codec = %config.unit_codec(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "coordinator bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "coordinator bootstrap failed"
        );
    }

    fn worker_connected(&self, rank: usize, endpoint: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "worker_connected",
            rank,
            endpoint,
            "worker link ready"
        );
    }

    fn worker_failed(&self, rank: usize, error: &DispatchError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "worker_failed",
            rank,
            error = %error,
            "worker link failed"
        );
    }
}
