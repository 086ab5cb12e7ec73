//! Listener failures.

use std::io;

use thiserror::Error;

use imagemesh_config::SocketEndpoint;

/// Failures while binding an endpoint or running its accept loop.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The endpoint's host did not resolve to an address.
    #[error("cannot resolve {endpoint}: {source}")]
    Resolve {
        /// Endpoint being bound.
        endpoint: SocketEndpoint,
        /// Resolver failure.
        #[source]
        source: io::Error,
    },

    /// The socket could not be created, bound or put into polling mode.
    #[error("cannot listen on {endpoint}: {source}")]
    Bind {
        /// Endpoint being bound.
        endpoint: SocketEndpoint,
        /// Socket failure.
        #[source]
        source: io::Error,
    },

    /// A live process still answers on the Unix socket path.
    #[error("{endpoint} is already served by another process")]
    InUse {
        /// Endpoint being bound.
        endpoint: SocketEndpoint,
    },

    /// The Unix socket path is occupied by something that is not a socket.
    #[error("{endpoint} names a file that is not a socket")]
    NotASocket {
        /// Endpoint being bound.
        endpoint: SocketEndpoint,
    },

    /// The accept thread panicked.
    #[error("accept loop for {endpoint} panicked")]
    AcceptPanicked {
        /// Endpoint the loop served.
        endpoint: SocketEndpoint,
    },
}
