//! Failures that end a coordinator or worker launch.

use std::io;
use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use imagemesh_config::SocketPreparationError;

use crate::bootstrap::BootstrapError;
use crate::telemetry::TelemetryError;
use crate::transport::ListenerError;

/// Reasons a process could not start serving or stop cleanly.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration did not load or validate.
    #[error("configuration: {0}")]
    Config(#[from] Arc<OrthoError>),
    /// The socket's parent directory could not be prepared.
    #[error("socket directory: {0}")]
    SocketDirectory(#[from] SocketPreparationError),
    /// The tracing subscriber could not be installed.
    #[error("telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    /// Termination signal handlers could not be installed.
    #[error("signal handling: {0}")]
    Signals(#[from] io::Error),
    /// Workers could not be configured for the coordinator.
    #[error("bootstrap: {0}")]
    Bootstrap(#[from] BootstrapError),
    /// The listening socket failed.
    #[error("listener: {0}")]
    Listener(#[from] ListenerError),
}
