//! Opening the client's connection to the coordinator.

use std::time::Duration;

use socket2::Socket;

use imagemesh_config::SocketEndpoint;

use crate::errors::AppError;

/// How long the client waits for the coordinator to accept.
pub(crate) const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects to `endpoint`, TCP or Unix, within [`CONNECTION_TIMEOUT`].
pub(crate) fn connect(endpoint: &SocketEndpoint) -> Result<Socket, AppError> {
    endpoint
        .connect(CONNECTION_TIMEOUT)
        .map_err(|source| AppError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })
}
