//! In-process workers listening on loopback sockets.

use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use imagemesh_config::SocketEndpoint;
use imagemesh_wire::WireError;

use crate::cluster::{UnitRequest, decode_payload};
use crate::transport::{
    ConnectionHandler, ConnectionStream, ListenerHandle, ServeMode, SocketListener,
};
use crate::worker::process_unit;

/// What a loopback worker saw for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitObservation {
    pub operation: String,
    pub rows: usize,
    pub cols: usize,
}

/// Serves units like the real worker, recording each one and optionally
/// stalling before it replies.
struct ObservingHandler {
    delay: Duration,
    seen: Arc<Mutex<Vec<UnitObservation>>>,
}

impl ObservingHandler {
    fn serve(&self, stream: &mut ConnectionStream) -> Result<(), WireError> {
        loop {
            let request = match UnitRequest::read_from(stream, u64::MAX) {
                Ok(request) => request,
                Err(WireError::Truncated { received: 0, .. }) => return Ok(()),
                Err(error) => return Err(error),
            };
            if let Ok(image) = decode_payload(&request.payload, request.codec) {
                self.seen
                    .lock()
                    .expect("observation mutex poisoned")
                    .push(UnitObservation {
                        operation: request.operation.as_str().to_owned(),
                        rows: image.rows(),
                        cols: image.cols(),
                    });
            }
            thread::sleep(self.delay);
            process_unit(&request).write_to(stream)?;
        }
    }
}

impl ConnectionHandler for ObservingHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        if self.serve(&mut stream).is_err() {
            stream.close();
        }
    }
}

/// A worker running on `127.0.0.1` with an ephemeral port.
pub struct LoopbackWorker {
    endpoint: SocketEndpoint,
    seen: Arc<Mutex<Vec<UnitObservation>>>,
    handle: Option<ListenerHandle>,
}

impl LoopbackWorker {
    #[must_use]
    pub fn start() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        let listener =
            SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind worker");
        let port = listener.local_addr().expect("worker address").port();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(ObservingHandler {
            delay,
            seen: Arc::clone(&seen),
        });
        let handle = listener.start(handler, ServeMode::Serial);
        Self {
            endpoint: SocketEndpoint::tcp("127.0.0.1", port),
            seen,
            handle: Some(handle),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> SocketEndpoint {
        self.endpoint.clone()
    }

    #[must_use]
    pub fn observations(&self) -> Vec<UnitObservation> {
        self.seen.lock().expect("observation mutex poisoned").clone()
    }
}

impl Drop for LoopbackWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
            handle.join().expect("join worker listener");
        }
    }
}

/// A TCP endpoint with nothing listening on it.
#[must_use]
pub fn closed_endpoint() -> SocketEndpoint {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("reserve port");
    let port = listener.local_addr().expect("reserved address").port();
    drop(listener);
    SocketEndpoint::tcp("127.0.0.1", port)
}
